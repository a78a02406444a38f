//! Hand-off of a finished recording into the media catalog.
//!
//! Recorders stream into containers that usually lack a duration header.
//! The hand-off writes the bytes under the project's `sources/`, remuxes
//! the file with the measured wall-clock length, probes the result and
//! only then adds it to the catalog.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use chrono::Utc;
use cutline_common::TranscoderConfig;
use cutline_project_model::{AssetId, MediaCatalog};

use crate::error::ProbeError;
use crate::probe::MediaProber;
use crate::resolve::{resolve_metadata, DurationSource, PlaybackDurationSource};

/// Rewrites a container so that it carries a duration.
pub trait DurationInjector: Send + Sync {
    fn inject(&self, input: &Path, output: &Path, duration_secs: f64) -> Result<(), ProbeError>;
}

/// Stream-copies the file through the transcoder, bounded to the measured
/// duration.
#[derive(Debug, Clone)]
pub struct RemuxDurationInjector {
    ffmpeg: PathBuf,
}

impl RemuxDurationInjector {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }

    pub fn from_config(config: &TranscoderConfig) -> Self {
        Self::new(config.ffmpeg.clone())
    }
}

impl DurationInjector for RemuxDurationInjector {
    fn inject(&self, input: &Path, output: &Path, duration_secs: f64) -> Result<(), ProbeError> {
        let duration = format!("{duration_secs:.3}");
        let result = Command::new(&self.ffmpeg)
            .args(["-y", "-hide_banner", "-nostdin", "-i"])
            .arg(input)
            .args(["-c", "copy", "-t", duration.as_str()])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .output()
            .map_err(|e| ProbeError::Spawn {
                binary: self.ffmpeg.clone(),
                source: e,
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            return Err(ProbeError::ToolFailed {
                binary: self.ffmpeg.clone(),
                path: input.to_path_buf(),
                stderr: tail.into_iter().rev().collect::<Vec<_>>().join("\n"),
            });
        }
        Ok(())
    }
}

/// A completed capture.
#[derive(Debug, Clone)]
pub struct Recording<'a> {
    pub bytes: &'a [u8],

    /// Wall-clock length measured by the recorder.
    pub elapsed_secs: f64,

    /// Container extension, e.g. `"webm"`.
    pub extension: &'a str,

    /// File stem; a timestamped name is generated when absent.
    pub name: Option<&'a str>,
}

/// Everything the hand-off needs besides the recording itself.
pub struct RecordingHandoff<'a> {
    pub injector: &'a dyn DurationInjector,
    pub prober: &'a dyn MediaProber,
    pub playback: Option<&'a dyn PlaybackDurationSource>,
}

impl RecordingHandoff<'_> {
    /// Persist `recording` under `sources_dir` and add it to `catalog`.
    ///
    /// Rejects a non-positive or non-finite elapsed time before writing
    /// anything. When the duration still cannot be resolved after remuxing
    /// the file stays on disk but is not catalogued.
    pub fn save(
        &self,
        catalog: &mut MediaCatalog,
        sources_dir: &Path,
        recording: &Recording<'_>,
    ) -> Result<AssetId, ProbeError> {
        let elapsed_secs = recording.elapsed_secs;
        if !elapsed_secs.is_finite() || elapsed_secs <= 0.0 {
            return Err(ProbeError::InvalidElapsed { elapsed_secs });
        }

        std::fs::create_dir_all(sources_dir).map_err(|e| ProbeError::Io {
            path: sources_dir.to_path_buf(),
            source: e,
        })?;

        let stem = recording
            .name
            .map(str::to_string)
            .unwrap_or_else(|| format!("recording-{}", Utc::now().format("%Y%m%d-%H%M%S")));
        let extension = recording.extension.trim_start_matches('.');
        let final_path = unique_path(sources_dir, &stem, extension);
        let raw_path = final_path.with_extension(format!("raw.{extension}"));

        std::fs::write(&raw_path, recording.bytes).map_err(|e| ProbeError::Io {
            path: raw_path.clone(),
            source: e,
        })?;

        match self.injector.inject(&raw_path, &final_path, elapsed_secs) {
            Ok(()) => {
                if let Err(e) = std::fs::remove_file(&raw_path) {
                    tracing::debug!(path = %raw_path.display(), error = %e, "Could not remove raw recording");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Duration injection failed; keeping recording as captured");
                std::fs::rename(&raw_path, &final_path).map_err(|e| ProbeError::Io {
                    path: final_path.clone(),
                    source: e,
                })?;
            }
        }

        let resolved = resolve_metadata(&final_path, self.prober, self.playback);
        if resolved.duration_source == DurationSource::Unresolved
            || !resolved.metadata.duration_secs.is_finite()
            || resolved.metadata.duration_secs <= 0.0
        {
            tracing::warn!(path = %final_path.display(), elapsed_secs, "Recording has no usable duration");
            return Err(ProbeError::InvalidDuration {
                path: final_path,
                duration_secs: resolved.metadata.duration_secs,
            });
        }

        let asset = catalog.add(final_path.clone(), resolved.metadata);
        tracing::info!(
            asset = %asset,
            path = %final_path.display(),
            elapsed_secs,
            duration_source = ?resolved.duration_source,
            "Recording saved"
        );
        Ok(asset)
    }
}

/// `<dir>/<stem>.<ext>`, suffixed with `-2`, `-3`, ... when taken.
fn unique_path(dir: &Path, stem: &str, extension: &str) -> PathBuf {
    let candidate = dir.join(format!("{stem}.{extension}"));
    if !candidate.exists() {
        return candidate;
    }
    (2..)
        .map(|n| dir.join(format!("{stem}-{n}.{extension}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}
