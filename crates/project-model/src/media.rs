//! Media catalog: imported and recorded source files.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Identifier of an asset inside a [`MediaCatalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub u64);

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Probed metadata for a source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    /// Duration in seconds; `0.0` while unresolved.
    pub duration_secs: f64,

    /// Primary video stream dimensions.
    pub resolution: Option<Resolution>,

    /// File size in bytes.
    pub file_size: u64,

    /// Container/type label (e.g. "mov,mp4,m4a" or "webm").
    pub container: String,

    /// Primary video stream frame rate.
    pub frame_rate: Option<f64>,

    /// Whether the file carries an audio stream, if known.
    pub has_audio: Option<bool>,
}

impl MediaMetadata {
    /// Metadata for a file whose probe has not run or failed.
    pub fn unresolved(file_size: u64, container: impl Into<String>) -> Self {
        Self {
            duration_secs: 0.0,
            resolution: None,
            file_size,
            container: container.into(),
            frame_rate: None,
            has_audio: None,
        }
    }
}

/// One imported or recorded source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: AssetId,

    /// Absolute path to the source file.
    pub path: PathBuf,

    /// Display name (file name by default).
    pub name: String,

    /// Duration in seconds; `0.0` while unresolved.
    pub duration_secs: f64,

    pub resolution: Option<Resolution>,
    pub file_size: u64,
    pub container: String,
    pub frame_rate: Option<f64>,
    pub has_audio: Option<bool>,
}

impl MediaAsset {
    /// Whether the duration is usable for timeline placement.
    pub fn has_usable_duration(&self) -> bool {
        self.duration_secs.is_finite() && self.duration_secs > 0.0
    }

    /// Overwrite probed fields. A known duration is never replaced by an
    /// unresolved one, so a failed refresh cannot strand segments that
    /// already reference the asset.
    fn apply_metadata(&mut self, metadata: MediaMetadata) {
        let duration_secs = sanitize_duration(metadata.duration_secs);
        if duration_secs > 0.0 || !self.has_usable_duration() {
            self.duration_secs = duration_secs;
        } else {
            tracing::warn!(
                asset = %self.id,
                path = %self.path.display(),
                kept_duration_secs = self.duration_secs,
                reported_duration_secs = metadata.duration_secs,
                "Ignoring unresolved duration for asset with a known duration"
            );
        }
        self.resolution = metadata.resolution;
        self.file_size = metadata.file_size;
        self.container = metadata.container;
        self.frame_rate = metadata.frame_rate.filter(|fps| fps.is_finite() && *fps > 0.0);
        self.has_audio = metadata.has_audio;
    }
}

/// All source files known to a project.
///
/// Ids are allocated monotonically and never reused, so a stale id held by
/// a segment simply fails to resolve after its asset is removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaCatalog {
    assets: Vec<MediaAsset>,
    #[serde(default)]
    next_id: u64,
}

impl MediaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file to the catalog. A path that is already present returns the
    /// existing id and refreshes its metadata; a usable duration is kept if
    /// the new metadata has none.
    pub fn add(&mut self, path: impl Into<PathBuf>, metadata: MediaMetadata) -> AssetId {
        let path = path.into();
        if let Some(existing) = self.assets.iter_mut().find(|a| a.path == path) {
            existing.apply_metadata(metadata);
            return existing.id;
        }

        let id = self.allocate_id();
        let name = display_name(&path);
        let mut asset = MediaAsset {
            id,
            path,
            name,
            duration_secs: 0.0,
            resolution: None,
            file_size: 0,
            container: String::new(),
            frame_rate: None,
            has_audio: None,
        };
        asset.apply_metadata(metadata);

        tracing::debug!(
            asset = %id,
            path = %asset.path.display(),
            duration_secs = asset.duration_secs,
            "Asset added to catalog"
        );
        self.assets.push(asset);
        id
    }

    /// Replace the metadata of an existing asset (re-probe). Segments that
    /// reference it should be passed through `Timeline::reconcile_asset`.
    pub fn update_metadata(&mut self, id: AssetId, metadata: MediaMetadata) -> bool {
        match self.get_mut(id) {
            Some(asset) => {
                asset.apply_metadata(metadata);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: AssetId) -> Option<&MediaAsset> {
        self.assets.iter().find(|a| a.id == id)
    }

    pub fn get_mut(&mut self, id: AssetId) -> Option<&mut MediaAsset> {
        self.assets.iter_mut().find(|a| a.id == id)
    }

    pub fn find_by_path(&self, path: &Path) -> Option<&MediaAsset> {
        self.assets.iter().find(|a| a.path == path)
    }

    /// Remove an asset. Callers owning a timeline must also drop the
    /// segments that reference it (see `LoadedProject::remove_asset`).
    pub fn remove(&mut self, id: AssetId) -> Option<MediaAsset> {
        let index = self.assets.iter().position(|a| a.id == id)?;
        Some(self.assets.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &MediaAsset> {
        self.assets.iter()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    fn allocate_id(&mut self) -> AssetId {
        let floor = self.assets.iter().map(|a| a.id.0 + 1).max().unwrap_or(0);
        let id = self.next_id.max(floor);
        self.next_id = id + 1;
        AssetId(id)
    }
}

/// Non-finite or negative durations are stored as unresolved (`0.0`).
fn sanitize_duration(duration_secs: f64) -> f64 {
    if duration_secs.is_finite() && duration_secs > 0.0 {
        duration_secs
    } else {
        0.0
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
