//! Import files into a media catalog.

use std::path::Path;

use cutline_project_model::{AssetId, MediaCatalog};

use crate::error::ProbeError;
use crate::probe::MediaProber;
use crate::resolve::{resolve_metadata, DurationSource, PlaybackDurationSource};

/// Result of importing one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOutcome {
    pub asset: AssetId,
    pub duration_source: DurationSource,
}

impl ImportOutcome {
    /// Whether the asset can be placed on the timeline.
    pub fn is_usable(&self) -> bool {
        self.duration_source != DurationSource::Unresolved
    }
}

/// Probes media files and records them in a catalog.
pub struct Importer<'a> {
    prober: &'a dyn MediaProber,
    playback: Option<&'a dyn PlaybackDurationSource>,
}

impl<'a> Importer<'a> {
    pub fn new(
        prober: &'a dyn MediaProber,
        playback: Option<&'a dyn PlaybackDurationSource>,
    ) -> Self {
        Self { prober, playback }
    }

    /// Import `path`. The file must exist; the asset is stored under its
    /// absolute path. Files whose duration cannot be resolved are still
    /// catalogued (duration 0) so they can be re-probed later.
    pub fn import(&self, catalog: &mut MediaCatalog, path: &Path) -> Result<ImportOutcome, ProbeError> {
        if !path.is_file() {
            return Err(ProbeError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let path = std::fs::canonicalize(path).map_err(|e| ProbeError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let resolved = resolve_metadata(&path, self.prober, self.playback);
        let asset = catalog.add(path.clone(), resolved.metadata);

        tracing::info!(
            asset = %asset,
            path = %path.display(),
            duration_source = ?resolved.duration_source,
            "Media imported"
        );

        Ok(ImportOutcome {
            asset,
            duration_source: resolved.duration_source,
        })
    }

    /// Probe an existing asset again and replace its metadata.
    pub fn reprobe(&self, catalog: &mut MediaCatalog, asset: AssetId) -> Option<ImportOutcome> {
        let path = catalog.get(asset)?.path.clone();
        let resolved = resolve_metadata(&path, self.prober, self.playback);
        catalog.update_metadata(asset, resolved.metadata);
        Some(ImportOutcome {
            asset,
            duration_source: resolved.duration_source,
        })
    }
}
