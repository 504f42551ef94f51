use core::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use crossbeam_utils::CachePadded;

use crate::{Error, Result};

/// A contiguous inclusive range of ids allocated in one call from a shared
/// counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Segment {
    min_id: i64,
    max_id: i64,
}

impl Segment {
    /// Builds a segment covering `min_id..=max_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an empty or inverted range; an
    /// allocator must never produce one.
    pub fn new(min_id: i64, max_id: i64) -> Result<Self> {
        if min_id > max_id {
            return Err(Error::configuration(format!(
                "segment {min_id}..={max_id} is inverted"
            )));
        }
        Ok(Self { min_id, max_id })
    }

    pub const fn min_id(&self) -> i64 {
        self.min_id
    }

    pub const fn max_id(&self) -> i64 {
        self.max_id
    }

    /// Number of ids the segment holds.
    pub const fn step(&self) -> i64 {
        self.max_id - self.min_id + 1
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}..={}]", self.min_id, self.max_id)
    }
}

/// One segment plus its atomic consumption pointer.
///
/// The pointer starts at `min_id - 1`; [`next`](Self::next) is a single
/// `fetch_add`, so the hot path is lock-free. A cursor is immutable once
/// exhausted and is never reused.
pub struct SegmentCursor {
    segment: Segment,
    current: CachePadded<AtomicI64>,
}

impl SegmentCursor {
    pub fn new(segment: Segment) -> Self {
        Self {
            segment,
            current: CachePadded::new(AtomicI64::new(segment.min_id() - 1)),
        }
    }

    /// Claims the next id, or `None` once the segment is exhausted.
    ///
    /// Values past `max_id` are over-increments from racing callers; they are
    /// discarded, so every id in `min_id..=max_id` is returned exactly once.
    pub fn next(&self) -> Option<i64> {
        let claimed = self.current.fetch_add(1, Ordering::Relaxed) + 1;
        (claimed <= self.segment.max_id()).then_some(claimed)
    }

    /// Ids left in the segment. Best effort: the value may be stale by the
    /// time the caller looks at it, which is fine for its only use as a
    /// refill trigger heuristic.
    pub fn remaining(&self) -> i64 {
        (self.segment.max_id() - self.current.load(Ordering::Relaxed)).max(0)
    }

    pub fn is_exhausted(&self) -> bool {
        self.current.load(Ordering::Relaxed) >= self.segment.max_id()
    }

    /// Whether consumption has crossed the safe distance: fewer than
    /// `safe_distance_percent`% of the segment's ids remain.
    pub(crate) fn past_safe_distance(&self, safe_distance_percent: u8) -> bool {
        let threshold = self.segment.step() * i64::from(safe_distance_percent) / 100;
        self.remaining() < threshold
    }

    pub fn segment(&self) -> &Segment {
        &self.segment
    }
}

impl fmt::Debug for SegmentCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentCursor")
            .field("segment", &self.segment)
            .field("current", &self.current.load(Ordering::Relaxed))
            .finish()
    }
}
