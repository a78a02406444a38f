//! Errors raised before a render job starts.

use std::path::PathBuf;

use cutline_common::CutlineError;
use cutline_project_model::{AssetId, SegmentId};

use crate::job::JobId;

/// Synchronous export failures. Nothing is spawned when one of these is
/// returned; failures of a running job are reported through
/// [`crate::job::JobFailure`] instead.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("The timeline is empty; add at least one clip before exporting")]
    EmptyTimeline,

    #[error("Segment {segment} uses asset {asset}, which is no longer in the media catalog")]
    AssetNotFound { segment: SegmentId, asset: AssetId },

    #[error("Export destination {output} is one of the timeline's source files ({source_path}); choose a different file name")]
    OutputConflict {
        output: PathBuf,
        source_path: PathBuf,
    },

    #[error("An export is already running (job {running}); wait for it to finish or cancel it first")]
    JobAlreadyRunning { running: JobId },

    #[error("Cannot prepare export directory {path}: {source}")]
    OutputDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Export worker stopped unexpectedly: {message}")]
    Worker { message: String },
}

impl From<ExportError> for CutlineError {
    fn from(err: ExportError) -> Self {
        CutlineError::render(err.to_string())
    }
}
