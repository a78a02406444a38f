//! Project file and on-disk layout.
//!
//! A project directory ties together the media catalog, the editing
//! timeline, and export defaults:
//!
//! ```text
//! <root>/
//!   meta/project.json    name, timestamps, catalog, export settings
//!   meta/timeline.json   timeline
//!   sources/             recordings written by the hand-off
//!   exports/             default export destination
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::media::{AssetId, MediaAsset, MediaCatalog};
use crate::timeline::{SegmentId, Timeline, TimelineError};

/// Export quality preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityPreset {
    Low,
    #[default]
    High,
    Source,
}

impl QualityPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::High => "high",
            Self::Source => "source",
        }
    }
}

impl fmt::Display for QualityPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityPreset {
    type Err = ProjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "high" => Ok(Self::High),
            "source" => Ok(Self::Source),
            other => Err(ProjectError::ValidationError {
                message: format!("unknown quality preset '{other}' (expected low, high or source)"),
            }),
        }
    }
}

/// Per-project export defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSettings {
    #[serde(default)]
    pub quality: QualityPreset,

    /// File name inside `exports/` used when no output path is given.
    #[serde(default = "default_export_file_name")]
    pub file_name: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            quality: QualityPreset::default(),
            file_name: default_export_file_name(),
        }
    }
}

impl ExportSettings {
    /// Settings from configured defaults (`quality` by preset name). A blank
    /// file name falls back to `output.mp4`.
    pub fn from_defaults(quality: &str, file_name: &str) -> Result<Self, ProjectError> {
        let file_name = file_name.trim();
        Ok(Self {
            quality: quality.parse()?,
            file_name: if file_name.is_empty() {
                default_export_file_name()
            } else {
                file_name.to_string()
            },
        })
    }
}

fn default_export_file_name() -> String {
    "output.mp4".to_string()
}

/// Top-level project file (`project.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Schema version.
    pub version: String,

    /// Human-readable project name.
    pub name: String,

    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,

    /// Imported and recorded media.
    #[serde(default)]
    pub catalog: MediaCatalog,

    #[serde(default)]
    pub export: ExportSettings,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            version: "1.0".to_string(),
            name: name.into(),
            created_at: now,
            modified_at: now,
            catalog: MediaCatalog::new(),
            export: ExportSettings::default(),
        }
    }
}

/// The complete in-memory representation of a loaded project.
#[derive(Debug, Clone)]
pub struct LoadedProject {
    /// Filesystem path to the project directory.
    pub root: PathBuf,

    pub project: Project,

    pub timeline: Timeline,
}

impl LoadedProject {
    /// Load a project from a directory. A missing `timeline.json` loads as
    /// an empty timeline.
    pub fn load(root: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let root = root.as_ref().to_path_buf();

        let project: Project = read_json(&root.join("meta").join("project.json"))?;

        let timeline_path = root.join("meta").join("timeline.json");
        let timeline = if timeline_path.exists() {
            read_json(&timeline_path)?
        } else {
            Timeline::new()
        };

        tracing::debug!(
            root = %root.display(),
            assets = project.catalog.len(),
            segments = timeline.len(),
            "Project loaded"
        );

        Ok(Self {
            root,
            project,
            timeline,
        })
    }

    /// Save project and timeline to disk.
    pub fn save(&self) -> Result<(), ProjectError> {
        let meta_dir = self.root.join("meta");
        std::fs::create_dir_all(&meta_dir).map_err(|e| ProjectError::IoError {
            path: meta_dir.clone(),
            source: e,
        })?;

        write_json(&meta_dir.join("project.json"), &self.project)?;
        write_json(&meta_dir.join("timeline.json"), &self.timeline)?;
        Ok(())
    }

    /// Create a new project on disk with the standard directory structure.
    pub fn create(root: impl AsRef<Path>, name: impl Into<String>) -> Result<Self, ProjectError> {
        Self::create_with_export(root, name, ExportSettings::default())
    }

    /// Create a project whose export settings start from `export`.
    pub fn create_with_export(
        root: impl AsRef<Path>,
        name: impl Into<String>,
        export: ExportSettings,
    ) -> Result<Self, ProjectError> {
        let root = root.as_ref().to_path_buf();

        for subdir in ["sources", "meta", "exports"] {
            let dir = root.join(subdir);
            std::fs::create_dir_all(&dir).map_err(|e| ProjectError::IoError {
                path: dir,
                source: e,
            })?;
        }

        let mut project = Project::new(name);
        project.export = export;
        let loaded = Self {
            root,
            project,
            timeline: Timeline::new(),
        };
        loaded.save()?;
        tracing::info!(root = %loaded.root.display(), name = %loaded.project.name, "Project created");
        Ok(loaded)
    }

    pub fn sources_dir(&self) -> PathBuf {
        self.root.join("sources")
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.root.join("exports")
    }

    /// Where an export goes when the caller gives no path.
    pub fn default_export_path(&self) -> PathBuf {
        self.exports_dir().join(&self.project.export.file_name)
    }

    pub fn catalog(&self) -> &MediaCatalog {
        &self.project.catalog
    }

    /// Append a catalog asset to the end of the timeline.
    pub fn add_to_timeline(&mut self, asset: AssetId) -> Result<SegmentId, TimelineError> {
        let asset = self
            .project
            .catalog
            .get(asset)
            .ok_or(TimelineError::AssetNotFound { asset })?;
        let id = self.timeline.insert(asset)?;
        self.touch();
        Ok(id)
    }

    /// Refit the segments of `asset` to its current catalog duration, after
    /// a re-import or re-probe. Returns how many segments changed.
    pub fn sync_asset(&mut self, asset: AssetId) -> usize {
        let Some(asset) = self.project.catalog.get(asset) else {
            return 0;
        };
        let adjusted = self.timeline.reconcile_asset(asset);
        if adjusted > 0 {
            tracing::info!(asset = %asset.id, segments = adjusted, "Segments refitted to asset duration");
            self.touch();
        }
        adjusted
    }

    /// Remove an asset and every segment that references it.
    pub fn remove_asset(&mut self, asset: AssetId) -> Option<(MediaAsset, usize)> {
        let removed = self.project.catalog.remove(asset)?;
        let segments = self.timeline.remove_segments_for_asset(asset);
        self.touch();
        tracing::info!(asset = %asset, segments, "Asset removed");
        Some((removed, segments))
    }

    /// Bump the modification timestamp.
    pub fn touch(&mut self) {
        self.project.modified_at = Utc::now();
    }

    /// Report referenced files that are missing on disk and segments whose
    /// asset is gone from the catalog.
    pub fn validate_sources(&self) -> Vec<String> {
        let mut errors = vec![];

        for asset in self.project.catalog.iter() {
            if !asset.path.exists() {
                errors.push(format!(
                    "Source missing for asset {} ({}): {}",
                    asset.id,
                    asset.name,
                    asset.path.display()
                ));
            }
        }

        for segment in self.timeline.segments() {
            if self.project.catalog.get(segment.asset_id).is_none() {
                errors.push(format!(
                    "Segment {} references unknown asset {}",
                    segment.id, segment.asset_id
                ));
            }
        }

        errors
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ProjectError> {
    let json = std::fs::read_to_string(path).map_err(|e| ProjectError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&json).map_err(|e| ProjectError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ProjectError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| ProjectError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;
    std::fs::write(path, json).map_err(|e| ProjectError::IoError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Errors that can occur when working with projects.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid project: {message}")]
    ValidationError { message: String },
}
