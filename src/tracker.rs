//! Per-source tracker state and the frame assignment step.

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::bbox::validate_boxes;
use crate::matching::{get_unmatched, iou_matrix, match_detections_and_tracks};
use crate::track::{Track, TrackId, TrackIdAllocator};
use crate::utils::warn_once;
use crate::{BoundingBox, Error, Result};

/// Default minimum IoU for a detection/track pairing.
pub const DEFAULT_IOU_THRESHOLD: f64 = 0.3;

/// Default number of consecutive unmatched frames a track survives.
pub const DEFAULT_MAX_MISSED_FRAMES: u32 = 30;

/// Configuration for the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Minimum IoU for a valid match (inclusive).
    pub iou_threshold: f64,

    /// Tracks unmatched for more than this many frame advances are evicted.
    pub max_missed_frames: u32,
}

impl TrackerConfig {
    /// Create a new tracker configuration.
    ///
    /// # Arguments
    /// * `iou_threshold` - Minimum IoU to accept a match
    /// * `max_missed_frames` - Eviction window in frame advances
    pub fn new(iou_threshold: f64, max_missed_frames: u32) -> Self {
        Self {
            iou_threshold,
            max_missed_frames,
        }
    }

    /// Check the configuration values.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.iou_threshold;
        if !threshold.is_finite() || threshold <= 0.0 || threshold > 1.0 {
            return Err(Error::InvalidConfig(format!(
                "iou_threshold must be in (0, 1], got {}",
                self.iou_threshold
            )));
        }
        Ok(())
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_IOU_THRESHOLD, DEFAULT_MAX_MISSED_FRAMES)
    }
}

/// Tracking state of one video source.
///
/// Holds the active tracks, the frame counter and the identity allocator.
/// States of different sources share nothing.
#[derive(Debug, Clone)]
pub struct TrackerState {
    config: TrackerConfig,
    tracks: Vec<Track>,
    frame: u64,
    ids: TrackIdAllocator,
}

impl TrackerState {
    /// Create an empty state with the given configuration.
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_validated_config(config))
    }

    pub(crate) fn with_validated_config(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: Vec::new(),
            frame: 0,
            ids: TrackIdAllocator::new(),
        }
    }

    /// Assign an identity to every box of the current frame.
    ///
    /// Advances the frame counter by one, matches boxes to tracks greedily by
    /// IoU, creates tracks for unmatched boxes, ages unmatched tracks and
    /// evicts stale ones.
    ///
    /// # Returns
    /// One identity per input box, in input order.
    pub fn assign(&mut self, boxes: &[BoundingBox]) -> Vec<TrackId> {
        self.frame += 1;
        let frame = self.frame;

        if boxes.iter().any(|b| !b.is_finite()) {
            warn_once("non-finite box coordinates passed to tracker; such boxes never match");
        }

        let track_boxes: Vec<BoundingBox> = self.tracks.iter().map(|t| t.bbox).collect();
        let scores = iou_matrix(boxes, &track_boxes);
        let (matched_dets, matched_tracks) =
            match_detections_and_tracks(&scores, self.config.iou_threshold);

        // 0 is never allocated; every slot is written below
        let mut ids: Vec<TrackId> = vec![0; boxes.len()];

        for (&det_idx, &track_idx) in matched_dets.iter().zip(matched_tracks.iter()) {
            let track = &mut self.tracks[track_idx];
            track.hit(boxes[det_idx], frame);
            ids[det_idx] = track.id;
            trace!(
                "frame {}: detection {} matched track {} (iou {:.3})",
                frame,
                det_idx,
                track.id,
                scores[(det_idx, track_idx)]
            );
        }

        for det_idx in get_unmatched(boxes.len(), &matched_dets) {
            let id = self.ids.allocate();
            self.tracks.push(Track::new(id, boxes[det_idx], frame));
            ids[det_idx] = id;
            trace!("frame {}: detection {} created track {}", frame, det_idx, id);
        }

        for track in &mut self.tracks {
            if !track.seen_in(frame) {
                track.mark_missed();
            }
        }

        let max_missed = self.config.max_missed_frames;
        self.tracks.retain(|track| {
            let stale = track.is_stale(max_missed);
            if stale {
                debug!(
                    "frame {}: evicting track {} after {} missed frames",
                    frame, track.id, track.missed_frames
                );
            }
            !stale
        });

        ids
    }

    /// Like [`assign`](Self::assign), but rejects non-finite coordinates.
    ///
    /// On error the state is left untouched (the frame counter does not advance).
    pub fn try_assign(&mut self, boxes: &[BoundingBox]) -> Result<Vec<TrackId>> {
        validate_boxes(boxes)?;
        Ok(self.assign(boxes))
    }

    /// The configuration this state was created with.
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Active tracks in creation order.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Identities of the active tracks in creation order.
    pub fn active_ids(&self) -> Vec<TrackId> {
        self.tracks.iter().map(|t| t.id).collect()
    }

    /// Number of frames processed so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// The identity the next new track will receive.
    pub fn next_id(&self) -> TrackId {
        self.ids.peek()
    }

    /// Largest identity ever assigned by this state.
    pub fn max_assigned_id(&self) -> Option<TrackId> {
        self.ids.last_issued()
    }

    /// Total number of tracks ever created.
    pub fn total_track_count(&self) -> u64 {
        self.ids.issued_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bb(x: f64, y: f64, w: f64, h: f64) -> BoundingBox {
        BoundingBox::new(x, y, w, h)
    }

    fn new_state() -> TrackerState {
        TrackerState::new(TrackerConfig::default()).unwrap()
    }

    // ===== Config Tests =====

    #[test]
    fn test_config_defaults() {
        let config = TrackerConfig::default();
        assert_eq!(config.iou_threshold, 0.3);
        assert_eq!(config.max_missed_frames, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_invalid_threshold() {
        for threshold in [0.0, -0.1, 1.5, f64::NAN, f64::INFINITY] {
            let config = TrackerConfig::new(threshold, 30);
            assert!(
                matches!(TrackerState::new(config), Err(Error::InvalidConfig(_))),
                "threshold {} should be rejected",
                threshold
            );
        }
    }

    #[test]
    fn test_config_threshold_one_is_valid() {
        assert!(TrackerState::new(TrackerConfig::new(1.0, 0)).is_ok());
    }

    #[test]
    fn test_config_partial_json_uses_defaults() {
        let config: TrackerConfig = serde_json::from_str(r#"{"max_missed_frames": 5}"#).unwrap();
        assert_eq!(config.iou_threshold, 0.3);
        assert_eq!(config.max_missed_frames, 5);
    }

    // ===== Basic Assignment Tests =====

    #[test]
    fn test_state_new() {
        let state = new_state();
        assert_eq!(state.frame(), 0);
        assert_eq!(state.next_id(), 1);
        assert_eq!(state.max_assigned_id(), None);
        assert!(state.tracks().is_empty());
    }

    #[test]
    fn test_first_frame_creates_tracks_in_order() {
        let mut state = new_state();
        let ids = state.assign(&[bb(0.0, 0.0, 10.0, 10.0), bb(100.0, 0.0, 10.0, 10.0)]);

        assert_eq!(ids, vec![1, 2]);
        assert_eq!(state.frame(), 1);
        assert_eq!(state.active_ids(), vec![1, 2]);
        assert_eq!(state.next_id(), 3);
    }

    #[test]
    fn test_empty_frame_advances_and_ages() {
        let mut state = new_state();
        state.assign(&[bb(0.0, 0.0, 10.0, 10.0)]);

        let ids = state.assign(&[]);
        assert!(ids.is_empty());
        assert_eq!(state.frame(), 2);
        assert_eq!(state.tracks()[0].missed_frames, 1);
        assert_eq!(state.tracks()[0].last_seen_frame, 1);
    }

    #[test]
    fn test_match_updates_track() {
        let mut state = new_state();
        state.assign(&[bb(10.0, 10.0, 50.0, 50.0)]);
        state.assign(&[]);

        let moved = bb(12.0, 11.0, 50.0, 50.0);
        let ids = state.assign(&[moved]);

        assert_eq!(ids, vec![1]);
        let track = &state.tracks()[0];
        assert_eq!(track.bbox, moved);
        assert_eq!(track.last_seen_frame, 3);
        assert_eq!(track.missed_frames, 0);
    }

    #[test]
    fn test_output_follows_input_order() {
        let mut state = new_state();
        let a = bb(0.0, 0.0, 10.0, 10.0);
        let b = bb(100.0, 100.0, 10.0, 10.0);
        assert_eq!(state.assign(&[a, b]), vec![1, 2]);

        // Reversed input order yields reversed identities
        assert_eq!(state.assign(&[b, a]), vec![2, 1]);
    }

    #[test]
    fn test_new_box_gets_greater_id() {
        let mut state = new_state();
        state.assign(&[bb(10.0, 10.0, 50.0, 50.0)]);
        let ids = state.assign(&[bb(10.0, 10.0, 50.0, 50.0), bb(500.0, 500.0, 50.0, 50.0)]);
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_each_track_matches_once_per_frame() {
        let mut state = new_state();
        state.assign(&[bb(0.0, 0.0, 10.0, 10.0)]);

        // Two boxes overlapping the single track: best one keeps the id
        let ids = state.assign(&[bb(1.0, 0.0, 10.0, 10.0), bb(0.0, 0.0, 10.0, 10.0)]);
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn test_below_threshold_creates_new_track() {
        let mut state = new_state();
        state.assign(&[bb(0.0, 0.0, 10.0, 10.0)]);

        // Shift by 6: intersection 4x10 = 40, union 160, iou 0.25
        let ids = state.assign(&[bb(6.0, 0.0, 10.0, 10.0)]);
        assert_eq!(ids, vec![2]);
    }

    // ===== Eviction Tests =====

    #[test]
    fn test_eviction_after_window() {
        let mut state = new_state();
        state.assign(&[bb(0.0, 0.0, 10.0, 10.0)]);

        for _ in 0..30 {
            state.assign(&[]);
        }
        assert_eq!(state.tracks().len(), 1);
        assert_eq!(state.tracks()[0].missed_frames, 30);

        state.assign(&[]);
        assert!(state.tracks().is_empty());

        // Same location later gets a fresh identity
        assert_eq!(state.assign(&[bb(0.0, 0.0, 10.0, 10.0)]), vec![2]);
    }

    #[test]
    fn test_match_at_edge_of_window_keeps_id() {
        let mut state = new_state();
        state.assign(&[bb(0.0, 0.0, 10.0, 10.0)]);
        for _ in 0..30 {
            state.assign(&[]);
        }
        assert_eq!(state.assign(&[bb(0.0, 0.0, 10.0, 10.0)]), vec![1]);
    }

    #[test]
    fn test_zero_window_evicts_on_first_miss() {
        let mut state = TrackerState::new(TrackerConfig::new(0.3, 0)).unwrap();
        state.assign(&[bb(0.0, 0.0, 10.0, 10.0)]);
        state.assign(&[]);
        assert!(state.tracks().is_empty());
    }

    // ===== Degenerate Input Tests =====

    #[test]
    fn test_zero_area_never_matches() {
        let mut state = new_state();
        let point = bb(5.0, 5.0, 0.0, 0.0);
        assert_eq!(state.assign(&[point]), vec![1]);
        assert_eq!(state.assign(&[point]), vec![2]);
    }

    #[test]
    fn test_negative_dimensions_never_match() {
        let mut state = new_state();
        let bad = bb(5.0, 5.0, -10.0, 10.0);
        assert_eq!(state.assign(&[bad]), vec![1]);
        assert_eq!(state.assign(&[bad]), vec![2]);
    }

    #[test]
    fn test_nan_box_is_tolerated() {
        let mut state = new_state();
        let ids = state.assign(&[bb(f64::NAN, 0.0, 10.0, 10.0)]);
        assert_eq!(ids, vec![1]);
        assert_eq!(state.frame(), 1);
    }

    #[test]
    fn test_try_assign_rejects_nan_without_mutation() {
        let mut state = new_state();
        state.assign(&[bb(0.0, 0.0, 10.0, 10.0)]);

        let result = state.try_assign(&[bb(0.0, f64::NAN, 10.0, 10.0)]);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(state.frame(), 1);
        assert_eq!(state.tracks()[0].missed_frames, 0);

        assert_eq!(state.try_assign(&[bb(0.0, 0.0, 10.0, 10.0)]).unwrap(), vec![1]);
    }
}
