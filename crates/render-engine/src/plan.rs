//! Export planning: timeline snapshot to transcoder arguments.
//!
//! Every segment becomes its own transcoder input and is normalized to the
//! preset's frame size, frame rate, pixel format and audio layout before the
//! pairs are concatenated in timeline order:
//!
//! ```text
//! [0:v:0] trim,setpts,scale,pad,setsar,fps,format ─► [v0] ┐
//! [0:a:0] atrim,asetpts,aresample,aformat ────────► [a0] ├─ concat ─► [outv][outa] ─► H.264/AAC
//! anullsrc,atrim,asetpts,aformat (no audio) ──────► [a1] ┘
//! ```

use std::path::{Component, Path, PathBuf};

use cutline_project_model::{MediaCatalog, QualityPreset, Resolution, TimelineSegment};

use crate::error::ExportError;

/// Output frame rate for every preset.
pub const TARGET_FPS: u32 = 30;

/// Output pixel format for every preset.
pub const PIXEL_FORMAT: &str = "yuv420p";

pub const AUDIO_SAMPLE_RATE: u32 = 48_000;
pub const AUDIO_CHANNEL_LAYOUT: &str = "stereo";
pub const AUDIO_BITRATE_KBPS: u32 = 192;

const FALLBACK_SOURCE_RESOLUTION: Resolution = Resolution {
    width: 1920,
    height: 1080,
};

/// Concrete encode parameters for a [`QualityPreset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresetSettings {
    pub resolution: Resolution,
    pub video_bitrate_kbps: u32,
    pub fps: u32,
    pub audio_bitrate_kbps: u32,
}

impl PresetSettings {
    /// Resolve a preset. `Source` takes the largest of `sources` (rounded
    /// down to even dimensions) and falls back to 1080p when none is known.
    pub fn resolve(preset: QualityPreset, sources: impl IntoIterator<Item = Resolution>) -> Self {
        let (resolution, video_bitrate_kbps) = match preset {
            QualityPreset::Low => (Resolution::new(1280, 720), 2500),
            QualityPreset::High => (Resolution::new(1920, 1080), 5000),
            QualityPreset::Source => {
                let largest = sources
                    .into_iter()
                    .filter(|r| r.width >= 2 && r.height >= 2)
                    .max_by_key(Resolution::area)
                    .map(|r| Resolution::new(r.width & !1, r.height & !1))
                    .unwrap_or(FALLBACK_SOURCE_RESOLUTION);
                (largest, 8000)
            }
        };

        Self {
            resolution,
            video_bitrate_kbps,
            fps: TARGET_FPS,
            audio_bitrate_kbps: AUDIO_BITRATE_KBPS,
        }
    }
}

/// One step of the filter graph.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanOp {
    /// Trim, rescale, pad and retime the video of input `input`.
    NormalizeVideo {
        input: usize,
        trim_start: f64,
        trim_end: f64,
    },

    /// Trim and resample the audio of input `input`.
    NormalizeAudio {
        input: usize,
        trim_start: f64,
        trim_end: f64,
    },

    /// Generate silence for an input that has no audio stream.
    SilentAudio { input: usize, duration_secs: f64 },

    /// Join `count` video/audio pairs in order.
    Concat { count: usize },
}

/// A fully resolved export, ready to hand to a transcoder.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPlan {
    /// One input file per segment, in timeline order.
    pub inputs: Vec<PathBuf>,

    pub ops: Vec<PlanOp>,

    pub settings: PresetSettings,

    pub output: PathBuf,

    /// Sum of segment durations; denominator for progress.
    pub total_duration_secs: f64,
}

impl ExportPlan {
    /// Render `ops` as a `-filter_complex` graph.
    pub fn filter_graph(&self) -> String {
        let Resolution { width, height } = self.settings.resolution;
        let fps = self.settings.fps;
        let audio_tail = format!(
            "aresample={AUDIO_SAMPLE_RATE},aformat=sample_fmts=fltp:sample_rates={AUDIO_SAMPLE_RATE}:channel_layouts={AUDIO_CHANNEL_LAYOUT}"
        );

        self.ops
            .iter()
            .map(|op| match op {
                PlanOp::NormalizeVideo {
                    input,
                    trim_start,
                    trim_end,
                } => format!(
                    "[{input}:v:0]trim=start={trim_start:.6}:end={trim_end:.6},setpts=PTS-STARTPTS,\
                     scale={width}:{height}:force_original_aspect_ratio=decrease,\
                     pad={width}:{height}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps},format={PIXEL_FORMAT}[v{input}]"
                ),
                PlanOp::NormalizeAudio {
                    input,
                    trim_start,
                    trim_end,
                } => format!(
                    "[{input}:a:0]atrim=start={trim_start:.6}:end={trim_end:.6},asetpts=PTS-STARTPTS,{audio_tail}[a{input}]"
                ),
                PlanOp::SilentAudio {
                    input,
                    duration_secs,
                } => format!(
                    "anullsrc=r={AUDIO_SAMPLE_RATE}:cl={AUDIO_CHANNEL_LAYOUT},atrim=duration={duration_secs:.6},asetpts=PTS-STARTPTS,{audio_tail}[a{input}]"
                ),
                PlanOp::Concat { count } => {
                    let pads: String = (0..*count).map(|i| format!("[v{i}][a{i}]")).collect();
                    format!("{pads}concat=n={count}:v=1:a=1[outv][outa]")
                }
            })
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Full transcoder argument vector (without the binary).
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
        ];

        for input in &self.inputs {
            args.push("-i".to_string());
            args.push(input.display().to_string());
        }

        args.push("-filter_complex".to_string());
        args.push(self.filter_graph());
        args.push("-map".to_string());
        args.push("[outv]".to_string());
        args.push("-map".to_string());
        args.push("[outa]".to_string());

        args.append(&mut codec_args(&self.settings));
        args.push(self.output.display().to_string());
        args
    }
}

fn codec_args(settings: &PresetSettings) -> Vec<String> {
    vec![
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "medium".to_string(),
        "-profile:v".to_string(),
        "high".to_string(),
        "-pix_fmt".to_string(),
        PIXEL_FORMAT.to_string(),
        "-b:v".to_string(),
        format!("{}k", settings.video_bitrate_kbps),
        "-r".to_string(),
        settings.fps.to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        format!("{}k", settings.audio_bitrate_kbps),
        "-ar".to_string(),
        AUDIO_SAMPLE_RATE.to_string(),
        "-ac".to_string(),
        "2".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
    ]
}

/// Build an export plan from a timeline snapshot.
///
/// Fails without side effects when the snapshot is empty, references an
/// asset missing from `catalog`, or when `output` resolves to one of the
/// referenced source files.
pub fn plan_export(
    segments: &[TimelineSegment],
    catalog: &MediaCatalog,
    preset: QualityPreset,
    output: &Path,
) -> Result<ExportPlan, ExportError> {
    if segments.is_empty() {
        return Err(ExportError::EmptyTimeline);
    }

    let assets = segments
        .iter()
        .map(|segment| {
            catalog
                .get(segment.asset_id)
                .ok_or(ExportError::AssetNotFound {
                    segment: segment.id,
                    asset: segment.asset_id,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    check_output_conflict(output, assets.iter().map(|a| a.path.as_path()))?;

    let settings = PresetSettings::resolve(preset, assets.iter().filter_map(|a| a.resolution));

    let mut ops = Vec::with_capacity(segments.len() * 2 + 1);
    for (input, (segment, asset)) in segments.iter().zip(&assets).enumerate() {
        ops.push(PlanOp::NormalizeVideo {
            input,
            trim_start: segment.trim_start(),
            trim_end: segment.trim_end(),
        });
        if asset.has_audio == Some(true) {
            ops.push(PlanOp::NormalizeAudio {
                input,
                trim_start: segment.trim_start(),
                trim_end: segment.trim_end(),
            });
        } else {
            ops.push(PlanOp::SilentAudio {
                input,
                duration_secs: segment.duration(),
            });
        }
    }
    ops.push(PlanOp::Concat {
        count: segments.len(),
    });

    let total_duration_secs = segments.iter().map(TimelineSegment::duration).sum();

    tracing::info!(
        segments = segments.len(),
        preset = %preset,
        resolution = %settings.resolution,
        video_bitrate_kbps = settings.video_bitrate_kbps,
        total_duration_secs,
        "Export plan built"
    );

    Ok(ExportPlan {
        inputs: assets.iter().map(|a| a.path.clone()).collect(),
        ops,
        settings,
        output: output.to_path_buf(),
        total_duration_secs,
    })
}

/// Reject an output path that names one of `sources`. Paths are compared
/// after normalization and case folding.
pub fn check_output_conflict<'a>(
    output: &Path,
    sources: impl IntoIterator<Item = &'a Path>,
) -> Result<(), ExportError> {
    let output_key = comparison_key(output);
    for source in sources {
        if comparison_key(source) == output_key {
            tracing::warn!(
                output = %output.display(),
                source = %source.display(),
                "Export output would overwrite a source file"
            );
            return Err(ExportError::OutputConflict {
                output: output.to_path_buf(),
                source_path: source.to_path_buf(),
            });
        }
    }
    Ok(())
}

fn comparison_key(path: &Path) -> String {
    normalize_path(path).to_string_lossy().to_lowercase()
}

/// Canonicalize when the file (or its parent) exists, otherwise resolve
/// `.` and `..` lexically against the working directory.
fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }

    if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };
        if let Ok(canonical_parent) = std::fs::canonicalize(parent) {
            return canonical_parent.join(name);
        }
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
