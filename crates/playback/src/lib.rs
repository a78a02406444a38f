//! Cutline Playback
//!
//! Simulates playback of the trimmed, concatenated timeline by driving one
//! external [`Player`]. The player only knows about source files and
//! source-relative times; the coordinator maps those onto the timeline and
//! cuts to the next segment when the current trim window runs out.
//!
//! Every `load`/`seek` the coordinator issues puts it into a loading state
//! until the player calls back with [`PlaybackCoordinator::source_ready`].
//! Time updates received while loading are stale and ignored.
//!
//! The segment under the cursor is tracked by id, not by index, so edits
//! made while playing are picked up: a segment that moved is followed, one
//! that was removed or re-pointed causes a re-cue at the cursor. Callers
//! that edit the timeline should also call
//! [`PlaybackCoordinator::timeline_changed`].

use std::path::Path;

use cutline_common::CutlineError;
use cutline_project_model::{
    AssetId, MediaCatalog, SegmentId, SegmentPosition, Timeline, TimelineSegment,
};

/// How close to `trim_end` a source time must get before cutting away.
pub const CUT_EPSILON: f64 = 0.05;

/// The external media player.
pub trait Player {
    /// Open a source file. Completion is reported via `source_ready`.
    fn load(&mut self, path: &Path);

    /// Seek within the loaded file, in source seconds.
    fn seek(&mut self, source_secs: f64);

    fn play(&mut self);

    fn pause(&mut self);
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlaybackError {
    #[error("Segment at index {index} uses asset {asset}, which is not in the media catalog")]
    AssetNotFound { index: usize, asset: AssetId },
}

impl From<PlaybackError> for CutlineError {
    fn from(err: PlaybackError) -> Self {
        CutlineError::playback(err.to_string())
    }
}

/// Observable coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlaybackState {
    pub is_playing: bool,

    /// Cursor in timeline seconds.
    pub current_time: f64,

    /// Index of the segment under the cursor; `None` when stopped past the
    /// end or on an empty timeline.
    pub current_segment: Option<usize>,

    /// A load or seek is in flight.
    pub loading: bool,
}

pub struct PlaybackCoordinator<P: Player> {
    player: P,
    state: PlaybackState,
    loaded_asset: Option<AssetId>,
    cued_segment: Option<SegmentId>,
    /// Last source position sent to or reported by the player.
    source_secs: f64,
}

impl<P: Player> PlaybackCoordinator<P> {
    pub fn new(player: P) -> Self {
        Self {
            player,
            state: PlaybackState::default(),
            loaded_asset: None,
            cued_segment: None,
            source_secs: 0.0,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut P {
        &mut self.player
    }

    /// Segment under `timeline_secs` and the matching source offset.
    pub fn resolve(&self, timeline: &Timeline, timeline_secs: f64) -> Option<SegmentPosition> {
        timeline.segment_at(timeline_secs)
    }

    /// Start playing from the cursor. A cursor at the end restarts from 0.
    pub fn play(&mut self, timeline: &Timeline, catalog: &MediaCatalog) -> Result<(), PlaybackError> {
        if timeline.is_empty() {
            return Ok(());
        }

        if self.state.current_segment.is_none() {
            let start = if self.resolve(timeline, self.state.current_time).is_some() {
                self.state.current_time
            } else {
                0.0
            };
            self.seek(timeline, catalog, start)?;
        }

        self.state.is_playing = true;
        if !self.state.loading {
            self.player.play();
        }
        Ok(())
    }

    pub fn pause(&mut self) {
        self.state.is_playing = false;
        self.player.pause();
    }

    /// The player finished the last load or seek.
    pub fn source_ready(&mut self) {
        if !self.state.loading {
            return;
        }
        self.state.loading = false;
        if self.state.is_playing {
            self.player.play();
        }
    }

    /// Move the cursor to `target_secs` (clamped to the timeline).
    pub fn seek(
        &mut self,
        timeline: &Timeline,
        catalog: &MediaCatalog,
        target_secs: f64,
    ) -> Result<(), PlaybackError> {
        let total = timeline.total_duration();
        let target = if target_secs.is_nan() {
            0.0
        } else {
            target_secs.clamp(0.0, total)
        };
        self.state.current_time = target;

        let Some(position) = self.resolve(timeline, target) else {
            self.stop();
            return Ok(());
        };

        let segment = &timeline.segments()[position.index];
        if self.is_cued(segment) && !self.state.loading {
            self.state.current_segment = Some(position.index);
            self.source_secs = position.source_secs;
            self.player.seek(position.source_secs);
            return Ok(());
        }

        self.cue(catalog, position.index, segment, position.source_secs)
    }

    /// Re-anchor the cursor after the timeline was edited.
    ///
    /// If the cued segment still exists, still points at the loaded file and
    /// still covers the player's source position, playback continues
    /// untouched and only the timeline cursor moves with the segment.
    /// Otherwise the player is re-cued at the current timeline time.
    pub fn timeline_changed(
        &mut self,
        timeline: &Timeline,
        catalog: &MediaCatalog,
    ) -> Result<(), PlaybackError> {
        let Some(id) = self.cued_segment else {
            self.state.current_time = self.state.current_time.min(timeline.total_duration());
            return Ok(());
        };

        if !self.state.loading {
            if let Some(index) = timeline.index_of(id) {
                let segment = &timeline.segments()[index];
                let source = self.source_secs;
                if self.is_cued(segment)
                    && source >= segment.trim_start()
                    && source < segment.trim_end()
                {
                    self.state.current_segment = Some(index);
                    self.state.current_time = segment.timeline_time_at(source);
                    return Ok(());
                }
            }
        }

        tracing::debug!(segment = %id, at = self.state.current_time, "Re-cueing after timeline edit");
        self.cued_segment = None;
        self.seek(timeline, catalog, self.state.current_time)
    }

    /// Player time update, in source seconds of the loaded file.
    pub fn advance(
        &mut self,
        timeline: &Timeline,
        catalog: &MediaCatalog,
        source_secs: f64,
    ) -> Result<(), PlaybackError> {
        if self.state.loading || !source_secs.is_finite() {
            return Ok(());
        }
        let Some(id) = self.cued_segment else {
            return Ok(());
        };
        let index = match timeline.index_of(id) {
            Some(index) if self.is_cued(&timeline.segments()[index]) => index,
            _ => {
                tracing::debug!(segment = %id, "Cued segment changed under playback");
                self.cued_segment = None;
                return self.seek(timeline, catalog, self.state.current_time);
            }
        };
        let segment = &timeline.segments()[index];
        self.state.current_segment = Some(index);
        self.source_secs = source_secs;

        self.state.current_time = segment
            .timeline_time_at(source_secs)
            .clamp(segment.start_time(), segment.end_time());

        if source_secs < segment.trim_end() - CUT_EPSILON {
            return Ok(());
        }

        match timeline.segments().get(index + 1) {
            Some(next) => {
                tracing::debug!(from = index, to = index + 1, "Cutting to next segment");
                self.state.current_time = next.start_time();
                self.cue(catalog, index + 1, next, next.trim_start())
            }
            None => {
                tracing::debug!("Reached end of timeline");
                self.state.current_time = timeline.total_duration();
                self.stop();
                Ok(())
            }
        }
    }

    /// Load (if needed) and seek the player for `segment`.
    fn cue(
        &mut self,
        catalog: &MediaCatalog,
        index: usize,
        segment: &TimelineSegment,
        source_secs: f64,
    ) -> Result<(), PlaybackError> {
        let asset = catalog
            .get(segment.asset_id)
            .ok_or(PlaybackError::AssetNotFound {
                index,
                asset: segment.asset_id,
            })?;

        self.state.current_segment = Some(index);
        self.cued_segment = Some(segment.id);
        self.source_secs = source_secs;
        self.state.loading = true;
        if self.loaded_asset != Some(asset.id) {
            self.player.load(&asset.path);
            self.loaded_asset = Some(asset.id);
        }
        self.player.seek(source_secs);
        Ok(())
    }

    /// `segment` is the one last cued and its file is the one loaded.
    fn is_cued(&self, segment: &TimelineSegment) -> bool {
        self.cued_segment == Some(segment.id) && self.loaded_asset == Some(segment.asset_id)
    }

    fn stop(&mut self) {
        if self.state.is_playing {
            self.player.pause();
        }
        self.state.is_playing = false;
        self.state.current_segment = None;
        self.cued_segment = None;
        self.state.loading = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutline_project_model::MediaMetadata;
    use proptest::prelude::*;
    use std::path::PathBuf;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Load(PathBuf),
        Seek(f64),
        Play,
        Pause,
    }

    #[derive(Debug, Default)]
    struct RecordingPlayer {
        calls: Vec<Call>,
    }

    impl Player for RecordingPlayer {
        fn load(&mut self, path: &Path) {
            self.calls.push(Call::Load(path.to_path_buf()));
        }

        fn seek(&mut self, source_secs: f64) {
            self.calls.push(Call::Seek(source_secs));
        }

        fn play(&mut self) {
            self.calls.push(Call::Play);
        }

        fn pause(&mut self) {
            self.calls.push(Call::Pause);
        }
    }

    fn metadata(duration_secs: f64) -> MediaMetadata {
        MediaMetadata {
            duration_secs,
            resolution: None,
            file_size: 1,
            container: "mp4".to_string(),
            frame_rate: None,
            has_audio: Some(true),
        }
    }

    /// a.mp4 trimmed to [2, 6) at [0, 4); b.mp4 full at [4, 9).
    fn fixture() -> (MediaCatalog, Timeline, SegmentId) {
        let mut catalog = MediaCatalog::new();
        let a = catalog.add("/media/a.mp4", metadata(10.0));
        let b = catalog.add("/media/b.mp4", metadata(5.0));
        let mut timeline = Timeline::new();
        let first = timeline.insert(catalog.get(a).unwrap()).unwrap();
        timeline.insert(catalog.get(b).unwrap()).unwrap();
        timeline.update_trim(&catalog, first, 2.0, 6.0).unwrap();
        (catalog, timeline, first)
    }

    fn coordinator() -> PlaybackCoordinator<RecordingPlayer> {
        PlaybackCoordinator::new(RecordingPlayer::default())
    }

    #[test]
    fn test_resolve_maps_into_source_time() {
        let (_, timeline, _) = fixture();
        let playback = coordinator();

        let hit = playback.resolve(&timeline, 1.5).unwrap();
        assert_eq!(hit.index, 0);
        assert_eq!(hit.source_secs, 3.5);

        let hit = playback.resolve(&timeline, 4.0).unwrap();
        assert_eq!(hit.index, 1);
        assert_eq!(hit.source_secs, 0.0);

        assert!(playback.resolve(&timeline, 9.0).is_none());
        assert!(playback.resolve(&timeline, -1.0).is_none());
    }

    #[test]
    fn test_play_loads_first_segment_and_waits_for_ready() {
        let (catalog, timeline, _) = fixture();
        let mut playback = coordinator();

        playback.play(&timeline, &catalog).unwrap();
        assert_eq!(
            playback.player().calls,
            vec![Call::Load(PathBuf::from("/media/a.mp4")), Call::Seek(2.0)]
        );
        assert!(playback.state().loading);
        assert!(playback.state().is_playing);

        playback.source_ready();
        assert_eq!(playback.player().calls.last(), Some(&Call::Play));
        assert!(!playback.state().loading);
    }

    #[test]
    fn test_advance_tracks_timeline_time() {
        let (catalog, timeline, _) = fixture();
        let mut playback = coordinator();
        playback.play(&timeline, &catalog).unwrap();
        playback.source_ready();

        playback.advance(&timeline, &catalog, 3.25).unwrap();
        assert_eq!(playback.state().current_time, 1.25);
        assert_eq!(playback.state().current_segment, Some(0));
    }

    #[test]
    fn test_advance_near_trim_end_cuts_to_next_segment() {
        let (catalog, timeline, _) = fixture();
        let mut playback = coordinator();
        playback.play(&timeline, &catalog).unwrap();
        playback.source_ready();
        playback.player_mut().calls.clear();

        playback.advance(&timeline, &catalog, 5.97).unwrap();
        assert_eq!(
            playback.player().calls,
            vec![Call::Load(PathBuf::from("/media/b.mp4")), Call::Seek(0.0)]
        );
        let state = playback.state();
        assert_eq!(state.current_segment, Some(1));
        assert_eq!(state.current_time, 4.0);
        assert!(state.loading);
    }

    #[test]
    fn test_updates_while_loading_are_ignored() {
        let (catalog, timeline, _) = fixture();
        let mut playback = coordinator();
        playback.play(&timeline, &catalog).unwrap();
        playback.source_ready();
        playback.advance(&timeline, &catalog, 5.99).unwrap();
        playback.player_mut().calls.clear();

        // Stale time from the previous file.
        playback.advance(&timeline, &catalog, 6.0).unwrap();
        assert!(playback.player().calls.is_empty());
        assert_eq!(playback.state().current_segment, Some(1));
        assert_eq!(playback.state().current_time, 4.0);
    }

    #[test]
    fn test_end_of_last_segment_stops() {
        let (catalog, timeline, _) = fixture();
        let mut playback = coordinator();
        playback.seek(&timeline, &catalog, 8.0).unwrap();
        playback.source_ready();
        playback.play(&timeline, &catalog).unwrap();
        playback.player_mut().calls.clear();

        playback.advance(&timeline, &catalog, 4.96).unwrap();
        let state = playback.state();
        assert!(!state.is_playing);
        assert_eq!(state.current_segment, None);
        assert_eq!(state.current_time, 9.0);
        assert_eq!(playback.player().calls, vec![Call::Pause]);
    }

    #[test]
    fn test_seek_within_loaded_segment_does_not_reload() {
        let (catalog, timeline, _) = fixture();
        let mut playback = coordinator();
        playback.seek(&timeline, &catalog, 1.0).unwrap();
        playback.source_ready();
        playback.player_mut().calls.clear();

        playback.seek(&timeline, &catalog, 3.0).unwrap();
        assert_eq!(playback.player().calls, vec![Call::Seek(5.0)]);
        assert!(!playback.state().loading);
    }

    #[test]
    fn test_seek_to_other_segment_loads_it() {
        let (catalog, timeline, _) = fixture();
        let mut playback = coordinator();
        playback.seek(&timeline, &catalog, 1.0).unwrap();
        playback.source_ready();
        playback.player_mut().calls.clear();

        playback.seek(&timeline, &catalog, 6.5).unwrap();
        assert_eq!(
            playback.player().calls,
            vec![Call::Load(PathBuf::from("/media/b.mp4")), Call::Seek(2.5)]
        );
        assert!(playback.state().loading);
    }

    #[test]
    fn test_seek_past_end_clamps_and_stops() {
        let (catalog, timeline, _) = fixture();
        let mut playback = coordinator();
        playback.seek(&timeline, &catalog, 100.0).unwrap();

        let state = playback.state();
        assert_eq!(state.current_time, 9.0);
        assert_eq!(state.current_segment, None);
        assert!(!state.loading);
    }

    #[test]
    fn test_play_at_end_restarts_from_zero() {
        let (catalog, timeline, _) = fixture();
        let mut playback = coordinator();
        playback.seek(&timeline, &catalog, 9.0).unwrap();
        playback.play(&timeline, &catalog).unwrap();

        assert_eq!(playback.state().current_time, 0.0);
        assert_eq!(playback.state().current_segment, Some(0));
    }

    #[test]
    fn test_empty_timeline_play_is_noop() {
        let catalog = MediaCatalog::new();
        let timeline = Timeline::new();
        let mut playback = coordinator();
        playback.play(&timeline, &catalog).unwrap();
        assert!(!playback.state().is_playing);
        assert!(playback.player().calls.is_empty());
    }

    #[test]
    fn test_missing_asset_reports_error() {
        let (mut catalog, timeline, first) = fixture();
        let asset = timeline.segment(first).unwrap().asset_id;
        catalog.remove(asset);
        let mut playback = coordinator();

        let err = playback.seek(&timeline, &catalog, 1.0).unwrap_err();
        assert_eq!(err, PlaybackError::AssetNotFound { index: 0, asset });
    }

    #[test]
    fn test_seek_after_removing_cued_segment_loads_new_source() {
        let (catalog, mut timeline, first) = fixture();
        let mut playback = coordinator();
        playback.seek(&timeline, &catalog, 1.0).unwrap();
        playback.source_ready();
        timeline.remove(first);
        playback.player_mut().calls.clear();

        // Index 0 is now b.mp4; the player still has a.mp4 open.
        playback.seek(&timeline, &catalog, 1.0).unwrap();
        assert_eq!(
            playback.player().calls,
            vec![Call::Load(PathBuf::from("/media/b.mp4")), Call::Seek(1.0)]
        );
        assert_eq!(playback.state().current_segment, Some(0));
        assert!(playback.state().loading);
    }

    #[test]
    fn test_advance_after_removing_cued_segment_recues_at_cursor() {
        let (catalog, mut timeline, first) = fixture();
        let mut playback = coordinator();
        playback.seek(&timeline, &catalog, 1.0).unwrap();
        playback.source_ready();
        timeline.remove(first);
        playback.player_mut().calls.clear();

        // A time report from a.mp4 must not be read against b.mp4's trims.
        playback.advance(&timeline, &catalog, 3.0).unwrap();
        assert_eq!(
            playback.player().calls,
            vec![Call::Load(PathBuf::from("/media/b.mp4")), Call::Seek(1.0)]
        );
        assert_eq!(playback.state().current_time, 1.0);
        assert!(playback.state().loading);
    }

    #[test]
    fn test_timeline_changed_follows_moved_segment() {
        let (catalog, mut timeline, _) = fixture();
        let second = timeline.segments()[1].id;
        let mut playback = coordinator();
        playback.seek(&timeline, &catalog, 6.0).unwrap();
        playback.source_ready();
        timeline.move_segment(second, 0.0).unwrap();
        playback.player_mut().calls.clear();

        playback.timeline_changed(&timeline, &catalog).unwrap();
        assert!(playback.player().calls.is_empty());
        assert_eq!(playback.state().current_segment, Some(0));
        assert_eq!(playback.state().current_time, 2.0);

        playback.advance(&timeline, &catalog, 2.5).unwrap();
        assert_eq!(playback.state().current_time, 2.5);

        // b.mp4 now ends at 5.0 and a.mp4 [2, 6) follows it.
        playback.advance(&timeline, &catalog, 4.97).unwrap();
        assert_eq!(
            playback.player().calls,
            vec![Call::Load(PathBuf::from("/media/a.mp4")), Call::Seek(2.0)]
        );
        assert_eq!(playback.state().current_segment, Some(1));
        assert_eq!(playback.state().current_time, 5.0);
    }

    #[test]
    fn test_timeline_changed_reseeks_when_trim_excludes_position() {
        let (catalog, mut timeline, first) = fixture();
        let mut playback = coordinator();
        playback.seek(&timeline, &catalog, 1.0).unwrap();
        playback.source_ready();
        timeline.update_trim(&catalog, first, 4.0, 6.0).unwrap();
        playback.player_mut().calls.clear();

        playback.timeline_changed(&timeline, &catalog).unwrap();
        assert_eq!(playback.player().calls, vec![Call::Seek(5.0)]);
        assert_eq!(playback.state().current_segment, Some(0));
        assert_eq!(playback.state().current_time, 1.0);
    }

    #[test]
    fn test_timeline_changed_when_stopped_clamps_cursor() {
        let (catalog, mut timeline, first) = fixture();
        let mut playback = coordinator();
        playback.seek(&timeline, &catalog, 9.0).unwrap();
        timeline.remove(first);

        playback.timeline_changed(&timeline, &catalog).unwrap();
        assert_eq!(playback.state().current_time, 5.0);
        assert_eq!(playback.state().current_segment, None);
        assert!(playback.player().calls.is_empty());
    }

    proptest! {
        #[test]
        fn prop_resolve_returns_containing_segment(
            durations in prop::collection::vec(0.2f64..30.0, 1..8),
            fraction in 0.0f64..1.0,
        ) {
            let mut catalog = MediaCatalog::new();
            let mut timeline = Timeline::new();
            for (i, d) in durations.iter().enumerate() {
                let id = catalog.add(format!("/media/{i}.mp4"), metadata(*d));
                timeline.insert(catalog.get(id).unwrap()).unwrap();
            }
            let t = timeline.total_duration() * fraction;
            let playback = coordinator();

            let hit = playback.resolve(&timeline, t).unwrap();
            let segment = &timeline.segments()[hit.index];
            prop_assert!(segment.start_time() <= t && t < segment.end_time());
            prop_assert!((hit.source_secs - (segment.trim_start() + t - segment.start_time())).abs() < 1e-9);
        }
    }
}
