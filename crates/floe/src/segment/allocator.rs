use std::collections::HashMap;

use parking_lot::Mutex;

use crate::{Error, Result, Segment};

/// Supplies the next disjoint, strictly-increasing id range for a name.
///
/// Production implementations are external collaborators (typically an
/// atomic-increment-backed counter in shared storage). The contract:
///
/// - every call for a name returns a range strictly greater than any range
///   previously returned for that name, with no reuse;
/// - calls may fail transiently; pools swallow background failures and retry;
/// - implementations must be thread-safe across *different* names. Pools
///   guarantee at most one in-flight call per name, so per-name reentrancy is
///   not required.
pub trait SegmentAllocator: Send + Sync {
    /// Allocates the next segment for `name`.
    fn next_segment(&self, name: &str) -> Result<Segment>;
}

/// A process-local allocator backed by one in-memory counter per name.
///
/// The same shape a shared-storage allocator takes, minus the network; meant
/// for tests, benches and single-process deployments.
pub struct InMemorySegmentAllocator {
    step: i64,
    offsets: Mutex<HashMap<String, i64>>,
}

impl InMemorySegmentAllocator {
    /// Creates an allocator that hands out `step`-wide ranges starting at 1.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `step` is not positive.
    pub fn new(step: i64) -> Result<Self> {
        if step < 1 {
            return Err(Error::configuration(format!(
                "segment step must be positive, got {step}"
            )));
        }
        Ok(Self {
            step,
            offsets: Mutex::new(HashMap::new()),
        })
    }
}

impl SegmentAllocator for InMemorySegmentAllocator {
    fn next_segment(&self, name: &str) -> Result<Segment> {
        let mut offsets = self.offsets.lock();
        let offset = offsets.entry(name.to_owned()).or_insert(0);
        let min_id = *offset + 1;
        let max_id = *offset + self.step;
        *offset = max_id;
        Segment::new(min_id, max_id)
    }
}
