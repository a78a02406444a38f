//! Error types shared across Cutline crates.

use std::path::PathBuf;

/// Top-level error type for Cutline operations.
///
/// Crate-local error enums (`ProbeError`, `PlaybackError`, `ExportError`)
/// carry the precise failure; this type is what crosses crate boundaries
/// and what the CLI reports.
#[derive(Debug, thiserror::Error)]
pub enum CutlineError {
    #[error("Probe error: {message}")]
    Probe { message: String },

    #[error("Import error: {message}")]
    Import { message: String },

    #[error("Playback error: {message}")]
    Playback { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CutlineError {
    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe {
            message: msg.into(),
        }
    }

    pub fn import(msg: impl Into<String>) -> Self {
        Self::Import {
            message: msg.into(),
        }
    }

    pub fn playback(msg: impl Into<String>) -> Self {
        Self::Playback {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_constructors_format_messages() {
        let err = CutlineError::render("ffmpeg missing");
        assert_eq!(err.to_string(), "Render error: ffmpeg missing");

        let err = CutlineError::FileNotFound {
            path: PathBuf::from("/tmp/missing.mp4"),
        };
        assert_eq!(err.to_string(), "File not found: /tmp/missing.mp4");
    }

    #[test]
    fn test_io_error_converts() {
        fn fails() -> Result<(), CutlineError> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"))?;
            Ok(())
        }
        assert!(matches!(fails(), Err(CutlineError::Io(_))));
    }
}
