//! Cutline Render Engine
//!
//! Turns a timeline snapshot into a single output file by driving an
//! external transcoder, and tracks the resulting render job.
//!
//! # Pipeline
//!
//! ```text
//! Timeline ──snapshot──► plan_export ──args──► Transcoder worker
//!                                                  │ TranscoderEvent (mpsc)
//!                                                  ▼
//!                          JobUpdate (broadcast) ◄── JobController
//! ```

pub mod error;
pub mod export;
pub mod job;
pub mod plan;
pub mod progress;
pub mod runner;

pub use error::ExportError;
pub use export::*;
pub use job::*;
pub use plan::{plan_export, ExportPlan, PlanOp, PresetSettings};
pub use runner::{binary_available, FfmpegTranscoder, Transcoder, TranscoderEvent};
