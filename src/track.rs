//! Track records and per-source identity allocation.

use std::fmt;

use crate::BoundingBox;

/// Identity assigned to a track. Always positive.
pub type TrackId = u64;

/// Allocates track identities for one source.
///
/// Identities start at 1, strictly increase in order of allocation and are
/// never reused, even after the track holding them is evicted.
#[derive(Debug, Clone)]
pub struct TrackIdAllocator {
    next_id: TrackId,
}

impl TrackIdAllocator {
    /// Create a new allocator whose first identity is 1.
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    /// Allocate the next identity (post-increment).
    #[inline]
    pub fn allocate(&mut self) -> TrackId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// The identity the next call to [`allocate`](Self::allocate) will return.
    #[inline]
    pub fn peek(&self) -> TrackId {
        self.next_id
    }

    /// Number of identities handed out so far.
    pub fn issued_count(&self) -> u64 {
        self.next_id - 1
    }

    /// Largest identity handed out so far, if any.
    pub fn last_issued(&self) -> Option<TrackId> {
        (self.next_id > 1).then(|| self.next_id - 1)
    }
}

impl Default for TrackIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// One continuously identified subject within a source.
#[derive(Clone, PartialEq)]
pub struct Track {
    /// Stable identity, unique within the owning source.
    pub id: TrackId,

    /// Last accepted box (creation box if never matched).
    pub bbox: BoundingBox,

    /// Frame counter value of the last match.
    pub last_seen_frame: u64,

    /// Consecutive frame advances since the last match.
    pub missed_frames: u32,
}

impl Track {
    pub(crate) fn new(id: TrackId, bbox: BoundingBox, frame: u64) -> Self {
        Self {
            id,
            bbox,
            last_seen_frame: frame,
            missed_frames: 0,
        }
    }

    /// Record a match against `bbox` on `frame`.
    pub(crate) fn hit(&mut self, bbox: BoundingBox, frame: u64) {
        self.bbox = bbox;
        self.last_seen_frame = frame;
        self.missed_frames = 0;
    }

    pub(crate) fn mark_missed(&mut self) {
        self.missed_frames = self.missed_frames.saturating_add(1);
    }

    /// Whether this track was matched or created on `frame`.
    #[inline]
    pub fn seen_in(&self, frame: u64) -> bool {
        self.last_seen_frame == frame
    }

    /// Whether this track has been unmatched for more than `max_missed_frames`.
    #[inline]
    pub fn is_stale(&self, max_missed_frames: u32) -> bool {
        self.missed_frames > max_missed_frames
    }
}

impl fmt::Debug for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Track")
            .field("id", &self.id)
            .field("bbox", &[self.bbox.x, self.bbox.y, self.bbox.width, self.bbox.height])
            .field("last_seen_frame", &self.last_seen_frame)
            .field("missed_frames", &self.missed_frames)
            .finish()
    }
}
