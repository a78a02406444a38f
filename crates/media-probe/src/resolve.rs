//! Metadata resolution with duration fallbacks.
//!
//! Browser and screen recorders often write containers without a duration
//! header, so duration is resolved in order:
//!
//! 1. the probe's container or stream duration,
//! 2. frame count divided by frame rate,
//! 3. a playback-based measurement ([`PlaybackDurationSource`]),
//! 4. `0.0`, which leaves the asset in the catalog but off the timeline.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use cutline_common::TranscoderConfig;
use cutline_project_model::MediaMetadata;
use cutline_render_engine::progress::{parse_time_marker, LineSplitter};

use crate::probe::{MediaProber, ProbeReport};

/// Measures a file's duration by playing or decoding it.
pub trait PlaybackDurationSource: Send + Sync {
    fn measure(&self, path: &Path) -> Option<f64>;
}

/// Decodes the whole file through the transcoder into a null sink and
/// reads the last `time=` marker.
#[derive(Debug, Clone)]
pub struct DecodeDurationSource {
    ffmpeg: PathBuf,
}

impl DecodeDurationSource {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }

    pub fn from_config(config: &TranscoderConfig) -> Self {
        Self::new(config.ffmpeg.clone())
    }
}

impl PlaybackDurationSource for DecodeDurationSource {
    fn measure(&self, path: &Path) -> Option<f64> {
        let output = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-nostdin", "-i"])
            .arg(path)
            .args(["-f", "null", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .output();

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot run decoder for duration measurement");
                return None;
            }
        };
        if !output.status.success() {
            tracing::debug!(path = %path.display(), status = %output.status, "Decode pass failed");
            return None;
        }

        last_time_marker(&output.stderr)
    }
}

/// Last parseable `time=` marker in transcoder stderr output.
pub fn last_time_marker(stderr: &[u8]) -> Option<f64> {
    let mut splitter = LineSplitter::default();
    let mut lines = splitter.push(stderr);
    lines.extend(splitter.finish());
    lines
        .iter()
        .rev()
        .find_map(|line| parse_time_marker(line))
        .filter(|secs| secs.is_finite() && *secs > 0.0)
}

/// Which step produced the duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationSource {
    Probe,
    FrameCount,
    Playback,
    Unresolved,
}

/// Catalog metadata plus how the duration was found.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMetadata {
    pub metadata: MediaMetadata,
    pub duration_source: DurationSource,
}

/// Resolve catalog metadata for `path`. Never fails: a failed probe yields
/// unresolved metadata with whatever the filesystem reports.
pub fn resolve_metadata(
    path: &Path,
    prober: &dyn MediaProber,
    playback: Option<&dyn PlaybackDurationSource>,
) -> ResolvedMetadata {
    let report = match prober.probe(path) {
        Ok(report) => report,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Probe failed");
            ProbeReport::default()
        }
    };

    let (duration_secs, duration_source) = if let Some(secs) = report.duration_secs {
        (secs, DurationSource::Probe)
    } else if let Some(secs) = report.frame_duration_secs() {
        tracing::debug!(path = %path.display(), secs, "Duration derived from frame count");
        (secs, DurationSource::FrameCount)
    } else if let Some(secs) = playback
        .and_then(|source| source.measure(path))
        .filter(|secs| secs.is_finite() && *secs > 0.0)
    {
        tracing::debug!(path = %path.display(), secs, "Duration measured by playback");
        (secs, DurationSource::Playback)
    } else {
        tracing::warn!(path = %path.display(), "Duration could not be resolved");
        (0.0, DurationSource::Unresolved)
    };

    let file_size = report
        .file_size
        .or_else(|| std::fs::metadata(path).ok().map(|m| m.len()))
        .unwrap_or(0);

    let container = report.container.clone().unwrap_or_else(|| {
        path.extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    });

    ResolvedMetadata {
        metadata: MediaMetadata {
            duration_secs,
            resolution: report.resolution,
            file_size,
            container,
            frame_rate: report.frame_rate,
            has_audio: (report.has_video || report.has_audio).then_some(report.has_audio),
        },
        duration_source,
    }
}
