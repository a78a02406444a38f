//! ffprobe contract.
//!
//! The probe is invoked as
//! `ffprobe -v error -print_format json -show_format -show_streams <path>`
//! and its JSON is reduced to a [`ProbeReport`]. ffprobe encodes most
//! numbers as strings, and any of them may be missing or `"N/A"`.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use cutline_common::TranscoderConfig;
use cutline_project_model::Resolution;
use serde::Deserialize;

use crate::error::ProbeError;

/// Raw ffprobe output.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FfprobeData {
    #[serde(default)]
    pub streams: Vec<FfprobeStream>,
    #[serde(default)]
    pub format: Option<FfprobeFormat>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FfprobeStream {
    pub codec_type: Option<String>,
    pub codec_name: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub r_frame_rate: Option<String>,
    pub avg_frame_rate: Option<String>,
    pub duration: Option<String>,
    pub nb_frames: Option<String>,
    pub pix_fmt: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FfprobeFormat {
    pub format_name: Option<String>,
    pub duration: Option<String>,
    pub size: Option<String>,
}

/// What the probe learned about a file. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeReport {
    /// Container duration, else the longest stream duration.
    pub duration_secs: Option<f64>,
    pub resolution: Option<Resolution>,
    pub frame_rate: Option<f64>,
    pub frame_count: Option<u64>,
    pub pixel_format: Option<String>,
    pub has_video: bool,
    pub has_audio: bool,
    pub container: Option<String>,
    pub file_size: Option<u64>,
}

impl ProbeReport {
    /// Build a report from ffprobe's JSON.
    pub fn from_json(path: &Path, json: &str) -> Result<Self, ProbeError> {
        let data: FfprobeData = serde_json::from_str(json).map_err(|e| ProbeError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self::from_data(&data))
    }

    pub fn from_data(data: &FfprobeData) -> Self {
        let video = data
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"));
        let has_audio = data
            .streams
            .iter()
            .any(|s| s.codec_type.as_deref() == Some("audio"));

        let format_duration = data
            .format
            .as_ref()
            .and_then(|f| parse_seconds(f.duration.as_deref()));
        let stream_duration = data
            .streams
            .iter()
            .filter_map(|s| parse_seconds(s.duration.as_deref()))
            .reduce(f64::max);

        let resolution = video.and_then(|s| match (s.width, s.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some(Resolution::new(w, h)),
            _ => None,
        });

        let frame_rate = video.and_then(|s| {
            parse_rational(s.avg_frame_rate.as_deref())
                .or_else(|| parse_rational(s.r_frame_rate.as_deref()))
        });

        let frame_count = video
            .and_then(|s| s.nb_frames.as_deref())
            .and_then(|n| n.trim().parse::<u64>().ok())
            .filter(|n| *n > 0);

        Self {
            duration_secs: format_duration.or(stream_duration),
            resolution,
            frame_rate,
            frame_count,
            pixel_format: video.and_then(|s| s.pix_fmt.clone()),
            has_video: video.is_some(),
            has_audio,
            container: data.format.as_ref().and_then(|f| f.format_name.clone()),
            file_size: data
                .format
                .as_ref()
                .and_then(|f| f.size.as_deref())
                .and_then(|s| s.trim().parse().ok()),
        }
    }

    /// Duration derived from `frame_count / frame_rate`.
    pub fn frame_duration_secs(&self) -> Option<f64> {
        match (self.frame_count, self.frame_rate) {
            (Some(frames), Some(fps)) if fps > 0.0 => {
                let secs = frames as f64 / fps;
                (secs.is_finite() && secs > 0.0).then_some(secs)
            }
            _ => None,
        }
    }
}

/// Positive, finite seconds from an ffprobe numeric string.
fn parse_seconds(value: Option<&str>) -> Option<f64> {
    let secs: f64 = value?.trim().parse().ok()?;
    (secs.is_finite() && secs > 0.0).then_some(secs)
}

/// Parse `num/den` (or a bare number) into a positive rate.
pub fn parse_rational(value: Option<&str>) -> Option<f64> {
    let value = value?.trim();
    let rate = match value.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => value.parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

/// Source of [`ProbeReport`]s.
pub trait MediaProber: Send + Sync {
    fn probe(&self, path: &Path) -> Result<ProbeReport, ProbeError>;
}

/// Runs an ffprobe-compatible binary.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    binary: PathBuf,
}

impl FfprobeProber {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn from_config(config: &TranscoderConfig) -> Self {
        Self::new(config.ffprobe.clone())
    }
}

impl Default for FfprobeProber {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl MediaProber for FfprobeProber {
    fn probe(&self, path: &Path) -> Result<ProbeReport, ProbeError> {
        let output = Command::new(&self.binary)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| ProbeError::Spawn {
                binary: self.binary.clone(),
                source: e,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ProbeError::ToolFailed {
                binary: self.binary.clone(),
                path: path.to_path_buf(),
                stderr,
            });
        }

        let json = String::from_utf8_lossy(&output.stdout);
        let report = ProbeReport::from_json(path, &json)?;
        tracing::debug!(
            path = %path.display(),
            duration_secs = ?report.duration_secs,
            resolution = ?report.resolution,
            frame_rate = ?report.frame_rate,
            has_audio = report.has_audio,
            "Probed media"
        );
        Ok(report)
    }
}
