//! Cutline Project Model
//!
//! Defines the core data contracts for Cutline projects:
//! - **Media:** Imported or recorded source files and their probed metadata
//! - **Timeline:** Trimmed segments packed end-to-end on a single time axis
//! - **Project:** Top-level metadata, catalog, timeline, and export defaults
//!
//! Segments refer to assets by [`AssetId`]; the catalog is the only owner of
//! asset metadata.

pub mod media;
pub mod project;
pub mod timeline;

pub use media::*;
pub use project::*;
pub use timeline::*;
