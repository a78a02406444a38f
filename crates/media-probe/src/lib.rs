//! Cutline Media Probe
//!
//! Everything between a file on disk and a usable catalog entry:
//! - **Probe:** ffprobe JSON reduced to a [`ProbeReport`]
//! - **Resolve:** duration fallback chain (probe, frame count, decode pass)
//! - **Import:** add user files to a [`cutline_project_model::MediaCatalog`]
//! - **Recording:** persist a finished capture and inject its duration

pub mod error;
pub mod import;
pub mod probe;
pub mod recording;
pub mod resolve;

pub use error::ProbeError;
pub use import::{ImportOutcome, Importer};
pub use probe::{FfprobeProber, MediaProber, ProbeReport};
pub use recording::{DurationInjector, Recording, RecordingHandoff, RemuxDurationInjector};
pub use resolve::{
    resolve_metadata, DecodeDurationSource, DurationSource, PlaybackDurationSource,
    ResolvedMetadata,
};
