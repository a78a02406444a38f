//! Single-track timeline of trimmed segments.
//!
//! Segments are kept sorted by `start_time` and packed end-to-end: after any
//! structural edit, `segments[i + 1].start_time == segments[i].end_time()`.
//! Times are seconds. `start_time` lives on the shared timeline axis while
//! `trim_start`/`trim_end` are offsets into the source asset's own timebase.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::media::{AssetId, MediaAsset, MediaCatalog};

/// Splits closer than this to either edge of a segment are rejected.
pub const MIN_SPLIT_DISTANCE: f64 = 0.1;

/// Shortest trim window a clamped trim request can produce.
pub const MIN_TRIM_DURATION: f64 = 0.1;

/// Identifier of a segment on a [`Timeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(pub u64);

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One placed, trimmed instance of an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineSegment {
    pub id: SegmentId,

    /// Source asset in the project's catalog.
    pub asset_id: AssetId,

    /// Display name; starts as the asset name and diverges after a split.
    pub name: String,

    start_time: f64,
    duration: f64,
    trim_start: f64,
    trim_end: f64,

    /// Reserved for multi-track layouts; always 0 today.
    #[serde(default)]
    pub track: u32,

    /// Cosmetic thumbnail strip, left to right.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filmstrip: Vec<PathBuf>,
}

impl TimelineSegment {
    /// Position on the timeline axis.
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// Always `trim_end - trim_start`.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn trim_start(&self) -> f64 {
        self.trim_start
    }

    pub fn trim_end(&self) -> f64 {
        self.trim_end
    }

    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    /// Half-open containment: `start <= t < end`.
    pub fn contains(&self, timeline_secs: f64) -> bool {
        timeline_secs >= self.start_time && timeline_secs < self.end_time()
    }

    /// Map a timeline-absolute time into the source file's timebase.
    pub fn source_time_at(&self, timeline_secs: f64) -> f64 {
        self.trim_start + (timeline_secs - self.start_time)
    }

    /// Map a source-file time back onto the timeline axis.
    pub fn timeline_time_at(&self, source_secs: f64) -> f64 {
        self.start_time + (source_secs - self.trim_start)
    }

    fn set_trim(&mut self, trim_start: f64, trim_end: f64) {
        self.trim_start = trim_start;
        self.trim_end = trim_end;
        self.duration = trim_end - trim_start;
    }
}

/// Where a timeline time lands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentPosition {
    /// Index into [`Timeline::segments`].
    pub index: usize,

    /// Offset inside the source file: `trim_start + (t - start_time)`.
    pub source_secs: f64,
}

/// Result of a trim request after clamping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimAdjustment {
    pub trim_start: f64,
    pub trim_end: f64,

    /// Whether the requested bounds were outside the legal window.
    pub clamped: bool,
}

/// Why a split was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitRejection {
    /// The split point is within [`MIN_SPLIT_DISTANCE`] of an edge.
    TooCloseToEdge,
    /// The split point is not inside the segment.
    OutsideSegment,
}

/// Result of [`Timeline::split`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SplitOutcome {
    Split { left: SegmentId, right: SegmentId },
    Rejected(SplitRejection),
}

/// Errors raised at the timeline boundary. Nothing is mutated when one is
/// returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimelineError {
    #[error("'{name}' has no usable duration yet ({duration_secs}s); re-probe it before adding it to the timeline")]
    InvalidDuration {
        asset: AssetId,
        name: String,
        duration_secs: f64,
    },

    #[error("Asset {asset} is not in the media catalog")]
    AssetNotFound { asset: AssetId },

    #[error("Segment {segment} is not on the timeline")]
    SegmentNotFound { segment: SegmentId },
}

/// The editing timeline (`timeline.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    /// Schema version.
    pub version: String,

    segments: Vec<TimelineSegment>,

    /// Cursor position in timeline seconds.
    #[serde(default)]
    playhead_secs: f64,

    #[serde(default)]
    next_segment_id: u64,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Timeline {
    pub fn new() -> Self {
        Self {
            version: "1.0".to_string(),
            segments: Vec::new(),
            playhead_secs: 0.0,
            next_segment_id: 0,
        }
    }

    /// Segments in timeline order.
    pub fn segments(&self) -> &[TimelineSegment] {
        &self.segments
    }

    pub fn segment(&self, id: SegmentId) -> Option<&TimelineSegment> {
        self.segments.iter().find(|s| s.id == id)
    }

    pub fn index_of(&self, id: SegmentId) -> Option<usize> {
        self.segments.iter().position(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Deep copy of the segment list, detached from later edits.
    pub fn snapshot(&self) -> Vec<TimelineSegment> {
        self.segments.clone()
    }

    /// End of the last segment; segments with a non-finite end are ignored.
    pub fn total_duration(&self) -> f64 {
        self.segments
            .iter()
            .map(TimelineSegment::end_time)
            .filter(|end| end.is_finite())
            .fold(0.0, f64::max)
    }

    pub fn playhead(&self) -> f64 {
        self.playhead_secs
    }

    /// Move the cursor, clamped to `[0, total_duration]`.
    pub fn set_playhead(&mut self, secs: f64) {
        let total = self.total_duration();
        self.playhead_secs = if secs.is_nan() {
            0.0
        } else {
            secs.clamp(0.0, total)
        };
    }

    /// Append a full-length segment for `asset`.
    pub fn insert(&mut self, asset: &MediaAsset) -> Result<SegmentId, TimelineError> {
        if !asset.has_usable_duration() {
            tracing::warn!(
                asset = %asset.id,
                duration_secs = asset.duration_secs,
                "Refusing to place asset with unresolved duration"
            );
            return Err(TimelineError::InvalidDuration {
                asset: asset.id,
                name: asset.name.clone(),
                duration_secs: asset.duration_secs,
            });
        }

        let id = self.allocate_id();
        let mut segment = TimelineSegment {
            id,
            asset_id: asset.id,
            name: asset.name.clone(),
            start_time: self.total_duration(),
            duration: 0.0,
            trim_start: 0.0,
            trim_end: 0.0,
            track: 0,
            filmstrip: Vec::new(),
        };
        segment.set_trim(0.0, asset.duration_secs);
        self.segments.push(segment);
        self.repack();

        tracing::debug!(segment = %id, asset = %asset.id, "Segment inserted");
        Ok(id)
    }

    /// Remove a segment. Unknown ids are ignored.
    pub fn remove(&mut self, id: SegmentId) -> bool {
        let before = self.segments.len();
        self.segments.retain(|s| s.id != id);
        let removed = self.segments.len() != before;
        self.repack();
        removed
    }

    /// Remove every segment that references `asset`. Returns how many went.
    pub fn remove_segments_for_asset(&mut self, asset: AssetId) -> usize {
        let before = self.segments.len();
        self.segments.retain(|s| s.asset_id != asset);
        self.repack();
        before - self.segments.len()
    }

    /// Re-clamp every segment that references `asset` after its duration
    /// changed. Returns how many segments had their trim window adjusted.
    pub fn reconcile_asset(&mut self, asset: &MediaAsset) -> usize {
        if !asset.has_usable_duration() {
            return 0;
        }

        let mut adjusted = 0;
        for segment in self.segments.iter_mut().filter(|s| s.asset_id == asset.id) {
            let fit = clamp_trim(
                segment.trim_start,
                segment.trim_end,
                segment.trim_start,
                segment.trim_end,
                asset.duration_secs,
            );
            if fit.clamped {
                tracing::debug!(
                    segment = %segment.id,
                    asset = %asset.id,
                    trim_start = fit.trim_start,
                    trim_end = fit.trim_end,
                    "Segment trim refitted to new asset duration"
                );
                segment.set_trim(fit.trim_start, fit.trim_end);
                adjusted += 1;
            }
        }
        if adjusted > 0 {
            self.repack();
        }
        adjusted
    }

    /// Set a segment's trim window, clamping into
    /// `0 <= trim_start < trim_end <= asset.duration`.
    pub fn update_trim(
        &mut self,
        catalog: &MediaCatalog,
        id: SegmentId,
        trim_start: f64,
        trim_end: f64,
    ) -> Result<TrimAdjustment, TimelineError> {
        let index = self
            .index_of(id)
            .ok_or(TimelineError::SegmentNotFound { segment: id })?;
        let segment = &self.segments[index];
        let asset = catalog
            .get(segment.asset_id)
            .ok_or(TimelineError::AssetNotFound {
                asset: segment.asset_id,
            })?;
        if !asset.has_usable_duration() {
            return Err(TimelineError::InvalidDuration {
                asset: asset.id,
                name: asset.name.clone(),
                duration_secs: asset.duration_secs,
            });
        }

        let adjustment = clamp_trim(
            trim_start,
            trim_end,
            segment.trim_start,
            segment.trim_end,
            asset.duration_secs,
        );
        if adjustment.clamped {
            tracing::debug!(
                segment = %id,
                requested_start = trim_start,
                requested_end = trim_end,
                trim_start = adjustment.trim_start,
                trim_end = adjustment.trim_end,
                "Trim request clamped to asset bounds"
            );
        }

        self.segments[index].set_trim(adjustment.trim_start, adjustment.trim_end);
        self.repack();
        Ok(adjustment)
    }

    /// Cut a segment in two at a timeline-absolute time.
    pub fn split(&mut self, id: SegmentId, at_secs: f64) -> Result<SplitOutcome, TimelineError> {
        let index = self
            .index_of(id)
            .ok_or(TimelineError::SegmentNotFound { segment: id })?;
        let original = &self.segments[index];

        if !original.contains(at_secs) {
            return Ok(SplitOutcome::Rejected(SplitRejection::OutsideSegment));
        }
        if at_secs - original.start_time < MIN_SPLIT_DISTANCE
            || original.end_time() - at_secs < MIN_SPLIT_DISTANCE
        {
            tracing::debug!(segment = %id, at_secs, "Split too close to segment edge");
            return Ok(SplitOutcome::Rejected(SplitRejection::TooCloseToEdge));
        }

        let original = self.segments.remove(index);
        let offset = at_secs - original.start_time;
        let split_point = original.trim_start + offset;

        let cut = ((original.filmstrip.len() as f64) * offset / original.duration).round() as usize;
        let cut = cut.min(original.filmstrip.len());

        let left_id = self.allocate_id();
        let right_id = self.allocate_id();

        let mut left = TimelineSegment {
            id: left_id,
            asset_id: original.asset_id,
            name: original.name.clone(),
            start_time: original.start_time,
            duration: 0.0,
            trim_start: 0.0,
            trim_end: 0.0,
            track: original.track,
            filmstrip: original.filmstrip[..cut].to_vec(),
        };
        left.set_trim(original.trim_start, split_point);

        let mut right = TimelineSegment {
            id: right_id,
            asset_id: original.asset_id,
            name: format!("{} (2)", original.name),
            start_time: at_secs,
            duration: 0.0,
            trim_start: 0.0,
            trim_end: 0.0,
            track: original.track,
            filmstrip: original.filmstrip[cut..].to_vec(),
        };
        right.set_trim(split_point, original.trim_end);

        self.segments.insert(index, right);
        self.segments.insert(index, left);
        self.repack();

        tracing::debug!(segment = %id, left = %left_id, right = %right_id, at_secs, "Segment split");
        Ok(SplitOutcome::Split {
            left: left_id,
            right: right_id,
        })
    }

    /// Drag a segment to `requested_start`.
    ///
    /// Landing inside another segment swaps the two segments' start times;
    /// landing elsewhere moves the dragged segment to that position. The
    /// result is then re-packed.
    pub fn move_segment(
        &mut self,
        id: SegmentId,
        requested_start: f64,
    ) -> Result<(), TimelineError> {
        let index = self
            .index_of(id)
            .ok_or(TimelineError::SegmentNotFound { segment: id })?;
        if requested_start.is_nan() {
            return Ok(());
        }
        let requested_start = requested_start.max(0.0);

        let target = self
            .segments
            .iter()
            .position(|s| s.id != id && s.contains(requested_start));

        match target {
            Some(other) => {
                let dragged_start = self.segments[index].start_time;
                self.segments[index].start_time = self.segments[other].start_time;
                self.segments[other].start_time = dragged_start;
            }
            None => {
                self.segments[index].start_time = requested_start;
            }
        }

        self.repack();
        Ok(())
    }

    /// Sort by start time (stable) and lay segments end-to-end from zero.
    pub fn repack(&mut self) {
        self.segments
            .sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

        let mut cursor = 0.0;
        for segment in &mut self.segments {
            segment.start_time = cursor;
            cursor += segment.duration;
        }

        let total = self.total_duration();
        if self.playhead_secs.is_nan() || self.playhead_secs > total {
            self.playhead_secs = total;
        }
    }

    /// Segment covering `timeline_secs`, with the matching source offset.
    pub fn segment_at(&self, timeline_secs: f64) -> Option<SegmentPosition> {
        if timeline_secs.is_nan() || timeline_secs < 0.0 || timeline_secs >= self.total_duration() {
            return None;
        }

        let index = self
            .segments
            .partition_point(|s| s.end_time() <= timeline_secs);
        let segment = self.segments.get(index)?;
        if !segment.contains(timeline_secs) {
            return None;
        }

        Some(SegmentPosition {
            index,
            source_secs: segment.source_time_at(timeline_secs),
        })
    }

    fn allocate_id(&mut self) -> SegmentId {
        let floor = self.segments.iter().map(|s| s.id.0 + 1).max().unwrap_or(0);
        let id = self.next_segment_id.max(floor);
        self.next_segment_id = id + 1;
        SegmentId(id)
    }
}

/// Clamp a requested trim window into `[0, asset_duration]`, keeping at
/// least `MIN_TRIM_DURATION` (or the whole asset when it is shorter).
fn clamp_trim(
    requested_start: f64,
    requested_end: f64,
    current_start: f64,
    current_end: f64,
    asset_duration: f64,
) -> TrimAdjustment {
    let pick = |requested: f64, current: f64| {
        if requested.is_nan() {
            current
        } else {
            requested
        }
    };

    let mut start = pick(requested_start, current_start).clamp(0.0, asset_duration);
    let mut end = pick(requested_end, current_end).clamp(0.0, asset_duration);

    let min_len = MIN_TRIM_DURATION.min(asset_duration);
    if end - start < min_len {
        if start + min_len <= asset_duration {
            end = start + min_len;
        } else {
            end = asset_duration;
            start = asset_duration - min_len;
        }
    }

    TrimAdjustment {
        trim_start: start,
        trim_end: end,
        clamped: start != requested_start || end != requested_end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MediaMetadata, Resolution};
    use proptest::prelude::*;

    const EPS: f64 = 1e-9;

    fn metadata(duration_secs: f64) -> MediaMetadata {
        MediaMetadata {
            duration_secs,
            resolution: Some(Resolution::new(1280, 720)),
            file_size: 4096,
            container: "mp4".to_string(),
            frame_rate: Some(30.0),
            has_audio: Some(true),
        }
    }

    fn catalog_with(durations: &[f64]) -> (MediaCatalog, Vec<AssetId>) {
        let mut catalog = MediaCatalog::new();
        let ids = durations
            .iter()
            .enumerate()
            .map(|(i, d)| catalog.add(format!("/media/clip{i}.mp4"), metadata(*d)))
            .collect();
        (catalog, ids)
    }

    fn insert(timeline: &mut Timeline, catalog: &MediaCatalog, asset: AssetId) -> SegmentId {
        timeline.insert(catalog.get(asset).unwrap()).unwrap()
    }

    fn assert_packed(timeline: &Timeline) {
        let segments = timeline.segments();
        if let Some(first) = segments.first() {
            assert!(first.start_time().abs() < EPS);
        }
        for pair in segments.windows(2) {
            assert!(
                (pair[1].start_time() - pair[0].end_time()).abs() < EPS,
                "gap or overlap between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_total_duration_empty_is_zero() {
        assert_eq!(Timeline::new().total_duration(), 0.0);
    }

    #[test]
    fn test_total_duration_sums_inserted_segments() {
        let (catalog, ids) = catalog_with(&[3.0, 5.0, 2.0]);
        let mut timeline = Timeline::new();
        for id in &ids {
            insert(&mut timeline, &catalog, *id);
        }
        assert!((timeline.total_duration() - 10.0).abs() < EPS);
        assert_packed(&timeline);
    }

    #[test]
    fn test_total_duration_ignores_non_finite_segments() {
        let (catalog, ids) = catalog_with(&[4.0]);
        let mut timeline = Timeline::new();
        insert(&mut timeline, &catalog, ids[0]);
        let mut poisoned = timeline.segments[0].clone();
        poisoned.id = SegmentId(42);
        poisoned.start_time = f64::NAN;
        timeline.segments.push(poisoned);

        assert!((timeline.total_duration() - 4.0).abs() < EPS);
    }

    #[test]
    fn test_insert_then_remove_shifts_remaining_segment() {
        let mut catalog = MediaCatalog::new();
        let a = catalog.add("/media/a.mp4", metadata(10.0));
        let b = catalog.add("/media/b.mp4", metadata(8.0));
        let mut timeline = Timeline::new();

        let seg_a = insert(&mut timeline, &catalog, a);
        insert(&mut timeline, &catalog, b);
        assert!((timeline.total_duration() - 18.0).abs() < EPS);

        assert!(timeline.remove(seg_a));
        assert!((timeline.total_duration() - 8.0).abs() < EPS);
        assert_eq!(timeline.segments()[0].start_time(), 0.0);
        assert_eq!(timeline.segments()[0].asset_id, b);
    }

    #[test]
    fn test_remove_unknown_segment_is_noop() {
        let (catalog, ids) = catalog_with(&[5.0]);
        let mut timeline = Timeline::new();
        insert(&mut timeline, &catalog, ids[0]);
        assert!(!timeline.remove(SegmentId(999)));
        assert_eq!(timeline.len(), 1);
    }

    #[test]
    fn test_insert_unresolved_duration_is_refused() {
        let mut catalog = MediaCatalog::new();
        let id = catalog.add("/media/rec.webm", MediaMetadata::unresolved(100, "webm"));
        let mut timeline = Timeline::new();

        let err = timeline.insert(catalog.get(id).unwrap()).unwrap_err();
        assert!(matches!(err, TimelineError::InvalidDuration { asset, .. } if asset == id));
        assert!(timeline.is_empty());
        assert!(err.to_string().contains("rec.webm"));
    }

    #[test]
    fn test_split_produces_expected_halves() {
        let (catalog, ids) = catalog_with(&[10.0]);
        let mut timeline = Timeline::new();
        let seg = insert(&mut timeline, &catalog, ids[0]);

        let outcome = timeline.split(seg, 4.0).unwrap();
        let (left, right) = match outcome {
            SplitOutcome::Split { left, right } => (left, right),
            other => panic!("unexpected outcome {other:?}"),
        };

        let left = timeline.segment(left).unwrap();
        let right = timeline.segment(right).unwrap();
        assert_eq!((left.trim_start(), left.trim_end()), (0.0, 4.0));
        assert_eq!((right.trim_start(), right.trim_end()), (4.0, 10.0));
        assert_eq!(left.start_time(), 0.0);
        assert_eq!(right.start_time(), 4.0);
        assert_eq!(left.duration(), 4.0);
        assert_eq!(right.duration(), 6.0);
        assert!(timeline.segment(seg).is_none());
        assert_eq!(left.asset_id, right.asset_id);
    }

    #[test]
    fn test_split_near_edge_is_rejected() {
        let (catalog, ids) = catalog_with(&[10.0]);
        let mut timeline = Timeline::new();
        let seg = insert(&mut timeline, &catalog, ids[0]);

        assert_eq!(
            timeline.split(seg, 0.05).unwrap(),
            SplitOutcome::Rejected(SplitRejection::TooCloseToEdge)
        );
        assert_eq!(
            timeline.split(seg, 9.95).unwrap(),
            SplitOutcome::Rejected(SplitRejection::TooCloseToEdge)
        );
        assert_eq!(
            timeline.split(seg, 12.0).unwrap(),
            SplitOutcome::Rejected(SplitRejection::OutsideSegment)
        );
        assert_eq!(timeline.len(), 1);
        assert!(timeline.segment(seg).is_some());
    }

    #[test]
    fn test_split_of_trimmed_segment_uses_source_offsets() {
        let (catalog, ids) = catalog_with(&[5.0, 20.0]);
        let mut timeline = Timeline::new();
        insert(&mut timeline, &catalog, ids[0]);
        let seg = insert(&mut timeline, &catalog, ids[1]);
        timeline.update_trim(&catalog, seg, 2.0, 12.0).unwrap();

        // Segment occupies timeline [5, 15) and source [2, 12).
        let outcome = timeline.split(seg, 8.0).unwrap();
        let SplitOutcome::Split { left, right } = outcome else {
            panic!("split rejected");
        };
        let left = timeline.segment(left).unwrap();
        let right = timeline.segment(right).unwrap();
        assert!((left.trim_end() - 5.0).abs() < EPS);
        assert!((right.trim_start() - 5.0).abs() < EPS);
        assert!((right.trim_end() - 12.0).abs() < EPS);
        assert_packed(&timeline);
    }

    #[test]
    fn test_split_partitions_filmstrip_proportionally() {
        let (catalog, ids) = catalog_with(&[10.0]);
        let mut timeline = Timeline::new();
        let seg = insert(&mut timeline, &catalog, ids[0]);
        timeline.segments[0].filmstrip = (0..10)
            .map(|i| PathBuf::from(format!("/cache/thumb{i}.png")))
            .collect();

        let SplitOutcome::Split { left, right } = timeline.split(seg, 3.0).unwrap() else {
            panic!("split rejected");
        };
        assert_eq!(timeline.segment(left).unwrap().filmstrip.len(), 3);
        assert_eq!(timeline.segment(right).unwrap().filmstrip.len(), 7);
    }

    #[test]
    fn test_update_trim_clamps_out_of_range_request() {
        let (catalog, ids) = catalog_with(&[20.0]);
        let mut timeline = Timeline::new();
        let seg = insert(&mut timeline, &catalog, ids[0]);

        let adjustment = timeline.update_trim(&catalog, seg, -5.0, 1000.0).unwrap();
        assert!(adjustment.clamped);
        let segment = timeline.segment(seg).unwrap();
        assert_eq!((segment.trim_start(), segment.trim_end()), (0.0, 20.0));
        assert_eq!(segment.duration(), 20.0);
    }

    #[test]
    fn test_update_trim_inverted_request_keeps_minimum_window() {
        let (catalog, ids) = catalog_with(&[20.0]);
        let mut timeline = Timeline::new();
        let seg = insert(&mut timeline, &catalog, ids[0]);

        timeline.update_trim(&catalog, seg, 8.0, 3.0).unwrap();
        let segment = timeline.segment(seg).unwrap();
        assert!(segment.trim_start() < segment.trim_end());
        assert!((segment.duration() - MIN_TRIM_DURATION).abs() < EPS);

        timeline.update_trim(&catalog, seg, 25.0, 30.0).unwrap();
        let segment = timeline.segment(seg).unwrap();
        assert!((segment.trim_end() - 20.0).abs() < EPS);
        assert!(segment.trim_start() < segment.trim_end());
    }

    #[test]
    fn test_update_trim_repacks_following_segments() {
        let (catalog, ids) = catalog_with(&[10.0, 5.0]);
        let mut timeline = Timeline::new();
        let first = insert(&mut timeline, &catalog, ids[0]);
        let second = insert(&mut timeline, &catalog, ids[1]);

        let adjustment = timeline.update_trim(&catalog, first, 2.0, 6.0).unwrap();
        assert!(!adjustment.clamped);
        assert_eq!(timeline.segment(second).unwrap().start_time(), 4.0);
        assert_eq!(timeline.total_duration(), 9.0);
    }

    #[test]
    fn test_update_trim_unknown_segment_errors() {
        let (catalog, _) = catalog_with(&[10.0]);
        let mut timeline = Timeline::new();
        let err = timeline
            .update_trim(&catalog, SegmentId(7), 0.0, 1.0)
            .unwrap_err();
        assert_eq!(err, TimelineError::SegmentNotFound { segment: SegmentId(7) });
    }

    #[test]
    fn test_move_onto_neighbor_swaps_order() {
        let (catalog, ids) = catalog_with(&[5.0, 3.0, 2.0]);
        let mut timeline = Timeline::new();
        let a = insert(&mut timeline, &catalog, ids[0]);
        let b = insert(&mut timeline, &catalog, ids[1]);
        let c = insert(&mut timeline, &catalog, ids[2]);

        timeline.move_segment(a, 6.0).unwrap();
        let order: Vec<_> = timeline.segments().iter().map(|s| s.id).collect();
        assert_eq!(order, vec![b, a, c]);
        assert_packed(&timeline);
        assert_eq!(timeline.segment(a).unwrap().start_time(), 3.0);
    }

    #[test]
    fn test_move_past_end_sends_segment_last() {
        let (catalog, ids) = catalog_with(&[5.0, 3.0, 2.0]);
        let mut timeline = Timeline::new();
        let a = insert(&mut timeline, &catalog, ids[0]);
        let b = insert(&mut timeline, &catalog, ids[1]);
        let c = insert(&mut timeline, &catalog, ids[2]);

        timeline.move_segment(a, 100.0).unwrap();
        let order: Vec<_> = timeline.segments().iter().map(|s| s.id).collect();
        assert_eq!(order, vec![b, c, a]);
        assert_packed(&timeline);
    }

    #[test]
    fn test_move_within_own_span_keeps_order() {
        let (catalog, ids) = catalog_with(&[5.0, 3.0]);
        let mut timeline = Timeline::new();
        let a = insert(&mut timeline, &catalog, ids[0]);
        let b = insert(&mut timeline, &catalog, ids[1]);

        timeline.move_segment(a, 2.5).unwrap();
        let order: Vec<_> = timeline.segments().iter().map(|s| s.id).collect();
        assert_eq!(order, vec![a, b]);
        assert_eq!(timeline.segment(a).unwrap().start_time(), 0.0);
    }

    #[test]
    fn test_remove_segments_for_asset_cascades() {
        let (catalog, ids) = catalog_with(&[4.0, 6.0]);
        let mut timeline = Timeline::new();
        insert(&mut timeline, &catalog, ids[0]);
        insert(&mut timeline, &catalog, ids[1]);
        insert(&mut timeline, &catalog, ids[0]);

        assert_eq!(timeline.remove_segments_for_asset(ids[0]), 2);
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.segments()[0].start_time(), 0.0);
    }

    #[test]
    fn test_reconcile_asset_refits_trims_to_shorter_duration() {
        let (mut catalog, ids) = catalog_with(&[10.0, 5.0]);
        let mut timeline = Timeline::new();
        let long = insert(&mut timeline, &catalog, ids[0]);
        let other = insert(&mut timeline, &catalog, ids[1]);
        timeline.update_trim(&catalog, long, 2.0, 9.0).unwrap();

        assert!(catalog.update_metadata(ids[0], metadata(6.0)));
        let asset = catalog.get(ids[0]).unwrap();
        assert_eq!(timeline.reconcile_asset(asset), 1);

        let segment = timeline.segment(long).unwrap();
        assert_eq!(segment.trim_start(), 2.0);
        assert_eq!(segment.trim_end(), 6.0);
        assert_eq!(segment.duration(), 4.0);
        assert_eq!(timeline.segment(other).unwrap().start_time(), 4.0);
        assert_eq!(timeline.total_duration(), 9.0);
        assert_packed(&timeline);

        // Already within bounds: nothing to do.
        assert_eq!(timeline.reconcile_asset(catalog.get(ids[0]).unwrap()), 0);
        assert_eq!(timeline.reconcile_asset(catalog.get(ids[1]).unwrap()), 0);
    }

    #[test]
    fn test_reconcile_asset_moves_window_that_starts_past_the_end() {
        let (mut catalog, ids) = catalog_with(&[10.0]);
        let mut timeline = Timeline::new();
        let id = insert(&mut timeline, &catalog, ids[0]);
        timeline.update_trim(&catalog, id, 8.0, 10.0).unwrap();

        catalog.update_metadata(ids[0], metadata(3.0));
        assert_eq!(timeline.reconcile_asset(catalog.get(ids[0]).unwrap()), 1);

        let segment = timeline.segment(id).unwrap();
        assert!(segment.trim_start() < segment.trim_end());
        assert!((segment.trim_end() - 3.0).abs() < EPS);
        assert!((segment.trim_start() - (3.0 - MIN_TRIM_DURATION)).abs() < EPS);
    }

    #[test]
    fn test_segment_at_resolves_source_offset() {
        let (catalog, ids) = catalog_with(&[10.0, 8.0]);
        let mut timeline = Timeline::new();
        insert(&mut timeline, &catalog, ids[0]);
        let second = insert(&mut timeline, &catalog, ids[1]);
        timeline.update_trim(&catalog, second, 1.0, 8.0).unwrap();

        let hit = timeline.segment_at(12.0).unwrap();
        assert_eq!(hit.index, 1);
        assert!((hit.source_secs - 3.0).abs() < EPS);

        assert_eq!(timeline.segment_at(0.0).unwrap().index, 0);
        assert_eq!(timeline.segment_at(10.0).unwrap().index, 1);
        assert!(timeline.segment_at(-0.1).is_none());
        assert!(timeline.segment_at(17.0).is_none());
        assert!(timeline.segment_at(f64::NAN).is_none());
    }

    #[test]
    fn test_playhead_is_clamped_after_edits() {
        let (catalog, ids) = catalog_with(&[10.0, 5.0]);
        let mut timeline = Timeline::new();
        insert(&mut timeline, &catalog, ids[0]);
        let tail = insert(&mut timeline, &catalog, ids[1]);

        timeline.set_playhead(14.0);
        assert_eq!(timeline.playhead(), 14.0);
        timeline.remove(tail);
        assert_eq!(timeline.playhead(), 10.0);
        timeline.set_playhead(-3.0);
        assert_eq!(timeline.playhead(), 0.0);
    }

    #[test]
    fn test_timeline_serialization_roundtrip_keeps_ids_unique() {
        let (catalog, ids) = catalog_with(&[10.0]);
        let mut timeline = Timeline::new();
        let seg = insert(&mut timeline, &catalog, ids[0]);

        let json = serde_json::to_string_pretty(&timeline).unwrap();
        let mut parsed: Timeline = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, timeline);

        let next = parsed.insert(catalog.get(ids[0]).unwrap()).unwrap();
        assert_ne!(next, seg);
    }

    #[derive(Debug, Clone)]
    enum Edit {
        Insert(usize),
        Remove(usize),
        Split(usize, f64),
        Move(usize, f64),
        Trim(usize, f64, f64),
    }

    fn edit_strategy() -> impl Strategy<Value = Edit> {
        prop_oneof![
            (0usize..4).prop_map(Edit::Insert),
            (0usize..8).prop_map(Edit::Remove),
            (0usize..8, 0.0f64..1.0).prop_map(|(i, f)| Edit::Split(i, f)),
            (0usize..8, -5.0f64..80.0).prop_map(|(i, t)| Edit::Move(i, t)),
            (0usize..8, -5.0f64..40.0, -5.0f64..40.0).prop_map(|(i, s, e)| Edit::Trim(i, s, e)),
        ]
    }

    fn pick(timeline: &Timeline, i: usize) -> Option<SegmentId> {
        (!timeline.is_empty()).then(|| timeline.segments()[i % timeline.len()].id)
    }

    fn apply(timeline: &mut Timeline, catalog: &MediaCatalog, ids: &[AssetId], edit: &Edit) {
        match *edit {
            Edit::Insert(a) => {
                timeline.insert(catalog.get(ids[a % ids.len()]).unwrap()).unwrap();
            }
            Edit::Remove(i) => {
                if let Some(id) = pick(timeline, i) {
                    timeline.remove(id);
                }
            }
            Edit::Split(i, fraction) => {
                if let Some(id) = pick(timeline, i) {
                    let seg = timeline.segment(id).unwrap();
                    let at = seg.start_time() + seg.duration() * fraction;
                    timeline.split(id, at).unwrap();
                }
            }
            Edit::Move(i, t) => {
                if let Some(id) = pick(timeline, i) {
                    timeline.move_segment(id, t).unwrap();
                }
            }
            Edit::Trim(i, s, e) => {
                if let Some(id) = pick(timeline, i) {
                    timeline.update_trim(catalog, id, s, e).unwrap();
                }
            }
        }
    }

    proptest! {
        #[test]
        fn prop_edits_keep_timeline_packed_and_trims_consistent(
            edits in prop::collection::vec(edit_strategy(), 1..40)
        ) {
            let (catalog, ids) = catalog_with(&[3.0, 7.5, 12.0, 0.5]);
            let mut timeline = Timeline::new();
            for edit in &edits {
                apply(&mut timeline, &catalog, &ids, edit);

                let segments = timeline.segments();
                if let Some(first) = segments.first() {
                    prop_assert!(first.start_time().abs() < EPS);
                }
                for pair in segments.windows(2) {
                    prop_assert!((pair[1].start_time() - pair[0].end_time()).abs() < 1e-6);
                }
                for segment in segments {
                    let asset = catalog.get(segment.asset_id).unwrap();
                    prop_assert!((segment.duration() - (segment.trim_end() - segment.trim_start())).abs() < EPS);
                    prop_assert!(segment.trim_start() >= 0.0);
                    prop_assert!(segment.trim_start() < segment.trim_end());
                    prop_assert!(segment.trim_end() <= asset.duration_secs + EPS);
                }

                let summed: f64 = segments.iter().map(TimelineSegment::duration).sum();
                prop_assert!((timeline.total_duration() - summed).abs() < 1e-6);
            }
        }

        #[test]
        fn prop_repack_is_idempotent(
            edits in prop::collection::vec(edit_strategy(), 0..30)
        ) {
            let (catalog, ids) = catalog_with(&[2.0, 9.0, 4.25]);
            let mut timeline = Timeline::new();
            for edit in &edits {
                apply(&mut timeline, &catalog, &ids, edit);
            }

            timeline.repack();
            let first: Vec<f64> = timeline.segments().iter().map(|s| s.start_time()).collect();
            timeline.repack();
            let second: Vec<f64> = timeline.segments().iter().map(|s| s.start_time()).collect();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_split_reconstructs_trim_window(
            trim_start in 0.0f64..10.0,
            length in 0.5f64..20.0,
            fraction in 0.0f64..1.0,
        ) {
            let (catalog, ids) = catalog_with(&[40.0]);
            let mut timeline = Timeline::new();
            let seg = insert(&mut timeline, &catalog, ids[0]);
            timeline.update_trim(&catalog, seg, trim_start, trim_start + length).unwrap();
            let original = timeline.segment(seg).unwrap().clone();

            let offset = MIN_SPLIT_DISTANCE
                + (original.duration() - 2.0 * MIN_SPLIT_DISTANCE) * fraction;
            prop_assume!(offset > MIN_SPLIT_DISTANCE && offset < original.duration() - MIN_SPLIT_DISTANCE);

            let outcome = timeline.split(seg, original.start_time() + offset).unwrap();
            let SplitOutcome::Split { left, right } = outcome else {
                return Err(TestCaseError::fail("split rejected"));
            };
            let left = timeline.segment(left).unwrap();
            let right = timeline.segment(right).unwrap();

            prop_assert!((left.duration() + right.duration() - original.duration()).abs() < 1e-9);
            prop_assert_eq!(left.trim_start(), original.trim_start());
            prop_assert_eq!(left.trim_end(), right.trim_start());
            prop_assert_eq!(right.trim_end(), original.trim_end());
        }
    }
}
