//! Probe and import errors.

use std::path::PathBuf;

use cutline_common::CutlineError;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Cannot run {binary}: {source}")]
    Spawn {
        binary: PathBuf,
        source: std::io::Error,
    },

    #[error("{binary} failed on {path}: {stderr}")]
    ToolFailed {
        binary: PathBuf,
        path: PathBuf,
        stderr: String,
    },

    #[error("Unreadable probe output for {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Recording length must be a positive number of seconds (got {elapsed_secs})")]
    InvalidElapsed { elapsed_secs: f64 },

    #[error("Could not determine a usable duration for {path}; it was not added to the media library")]
    InvalidDuration { path: PathBuf, duration_secs: f64 },
}

impl From<ProbeError> for CutlineError {
    fn from(err: ProbeError) -> Self {
        match err {
            ProbeError::FileNotFound { path } => CutlineError::FileNotFound { path },
            ProbeError::InvalidElapsed { .. } | ProbeError::InvalidDuration { .. } => {
                CutlineError::import(err.to_string())
            }
            other => CutlineError::probe(other.to_string()),
        }
    }
}
