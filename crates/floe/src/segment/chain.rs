use core::time::Duration;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::{
    Error, GeneratorKind, IdGenerator, Result, Segment,
    segment::{MAX_SEGMENT_SWITCHES, PrefetchScheduler, SegmentAllocator, SegmentCursor},
};

/// Tuning for a [`ChainIdGenerator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChainConfig {
    /// Prefetch once fewer than this percentage of the head segment's ids
    /// remain.
    pub safe_distance_percent: u8,
    /// Upper bound on unconsumed segments held in the chain.
    pub max_chain_length: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            safe_distance_percent: 20,
            max_chain_length: 3,
        }
    }
}

impl ChainConfig {
    fn validate(&self) -> Result<()> {
        if self.safe_distance_percent == 0 || self.safe_distance_percent > 100 {
            return Err(Error::configuration(
                "safe_distance_percent must be in 1..=100",
            ));
        }
        if self.max_chain_length == 0 {
            return Err(Error::configuration("max_chain_length must be at least 1"));
        }
        Ok(())
    }
}

/// One segment in the chain. The forward link is set exactly once, at append
/// time, and never mutated afterwards; readers traverse it without locking.
pub(crate) struct ChainNode {
    cursor: SegmentCursor,
    next: OnceLock<Arc<ChainNode>>,
}

impl ChainNode {
    fn new(segment: Segment) -> Self {
        Self {
            cursor: SegmentCursor::new(segment),
            next: OnceLock::new(),
        }
    }
}

/// Chain bookkeeping: append (tail) and advance (head) both run under this
/// mutex; `length` counts the nodes from head to tail inclusive.
struct ChainLinks {
    tail: Arc<ChainNode>,
    length: usize,
}

pub(crate) struct ChainShared {
    name: String,
    allocator: Arc<dyn SegmentAllocator>,
    safe_distance_percent: u8,
    max_chain_length: usize,
    /// Read on the hot path, written only when the head advances.
    head: RwLock<Arc<ChainNode>>,
    links: Mutex<ChainLinks>,
    /// Claimed by whichever path (scheduler prefetch or drain fallback) is
    /// about to call the allocator, so the allocator never sees two
    /// concurrent calls for this name.
    prefetching: AtomicBool,
}

/// How long a drained caller sleeps between re-checks while a prefetch for
/// the same name is still in flight.
const IN_FLIGHT_RECHECK: Duration = Duration::from_millis(1);

/// A per-name pool holding a bounded forward-only chain of segments,
/// refilled by a shared [`PrefetchScheduler`].
///
/// The hot path is a lock-free cursor increment on the head node. When the
/// head drains, a short critical section advances it to the next node. If
/// the whole chain is drained (the scheduler fell behind), the caller
/// allocates synchronously while holding the chain mutex: correctness-
/// preserving but latency-costly, and the only path on which allocator
/// errors reach callers. The fallback and the scheduler share one in-flight
/// slot, so the allocator never sees two concurrent calls for this name.
///
/// The chain absorbs bursty consumption and decouples prefetch cadence from
/// per-call checks, at the cost of a small staleness window versus the
/// double buffer's immediate trigger.
///
/// # Example
///
/// ```
/// use core::time::Duration;
/// use std::sync::Arc;
/// use floe::{ChainConfig, ChainIdGenerator, InMemorySegmentAllocator, PrefetchScheduler};
///
/// let allocator = Arc::new(InMemorySegmentAllocator::new(100).unwrap());
/// let scheduler = PrefetchScheduler::new(Duration::from_millis(100));
/// let generator =
///     ChainIdGenerator::new("orders", allocator, &scheduler, ChainConfig::default()).unwrap();
/// assert_eq!(generator.generate().unwrap(), 1);
/// ```
pub struct ChainIdGenerator {
    shared: Arc<ChainShared>,
}

impl ChainIdGenerator {
    /// Eagerly loads the first segment and registers the pool with the
    /// scheduler that will keep its chain topped up.
    pub fn new(
        name: impl Into<String>,
        allocator: Arc<dyn SegmentAllocator>,
        scheduler: &PrefetchScheduler,
        config: ChainConfig,
    ) -> Result<Self> {
        config.validate()?;
        let name = name.into();
        let first = allocator.next_segment(&name)?;
        info!(
            %name,
            segment = %first,
            max_chain_length = config.max_chain_length,
            "initialized segment-chain id generator"
        );
        let head = Arc::new(ChainNode::new(first));
        let shared = Arc::new(ChainShared {
            name,
            allocator,
            safe_distance_percent: config.safe_distance_percent,
            max_chain_length: config.max_chain_length,
            head: RwLock::new(Arc::clone(&head)),
            links: Mutex::new(ChainLinks {
                tail: head,
                length: 1,
            }),
            prefetching: AtomicBool::new(false),
        });
        scheduler.register(&shared);
        Ok(Self { shared })
    }

    /// Generates the next id.
    ///
    /// # Errors
    ///
    /// - [`Error::Allocator`] if the chain fully drained and the synchronous
    ///   fallback allocation failed.
    /// - [`Error::SegmentRetriesExhausted`] if the allocator keeps returning
    ///   already-exhausted segments.
    pub fn generate(&self) -> Result<i64> {
        for _ in 0..MAX_SEGMENT_SWITCHES {
            let node = Arc::clone(&*self.shared.head.read());
            if let Some(id) = node.cursor.next() {
                return Ok(id);
            }
            self.shared.advance_or_refill()?;
        }
        Err(Error::SegmentRetriesExhausted {
            name: self.shared.name.clone(),
            attempts: MAX_SEGMENT_SWITCHES,
        })
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Unconsumed segments currently held, the drained-but-not-yet-advanced
    /// head included. Never exceeds `max_chain_length`.
    pub fn segments_held(&self) -> usize {
        self.shared.links.lock().length
    }
}

impl IdGenerator for ChainIdGenerator {
    fn generate(&self) -> Result<i64> {
        self.generate()
    }

    fn name(&self) -> &str {
        self.name()
    }

    fn kind(&self) -> GeneratorKind {
        GeneratorKind::SegmentChain
    }
}

impl ChainShared {
    /// Called at head exhaustion: advances to the next node, or — with the
    /// chain fully drained — allocates inline while callers queue on the
    /// chain mutex.
    ///
    /// The fallback claims the in-flight slot first. A prefetch that is
    /// mid-call for the same name is waited out with the links mutex
    /// released (its append needs that mutex), then its segment is consumed
    /// through the normal advance path.
    fn advance_or_refill(&self) -> Result<()> {
        loop {
            {
                let mut links = self.links.lock();

                // Re-check under the lock: another caller may have advanced
                // already.
                let node = Arc::clone(&*self.head.read());
                if !node.cursor.is_exhausted() {
                    return Ok(());
                }

                if let Some(next) = node.next.get() {
                    debug!(
                        name = %self.name,
                        segment = %next.cursor.segment(),
                        "advancing to next segment"
                    );
                    *self.head.write() = Arc::clone(next);
                    links.length -= 1;
                    return Ok(());
                }

                // Chain fully drained; the scheduler fell behind. Allocate
                // inline, but only with the in-flight slot claimed.
                if self
                    .prefetching
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    warn!(name = %self.name, "segment chain drained; allocating synchronously");
                    let segment = match self.allocator.next_segment(&self.name) {
                        Ok(segment) => segment,
                        Err(error) => {
                            self.prefetching.store(false, Ordering::Release);
                            return Err(error);
                        }
                    };
                    let fresh = Arc::new(ChainNode::new(segment));
                    // `node` is the tail (its link is unset) and appends only
                    // happen under the links mutex, so this set cannot lose a
                    // race.
                    let _ = node.next.set(Arc::clone(&fresh));
                    links.tail = Arc::clone(&fresh);
                    *self.head.write() = fresh;
                    // One node appended, one retired: length is unchanged.
                    self.prefetching.store(false, Ordering::Release);
                    return Ok(());
                }
            }
            // A prefetch is in flight for this name; it will either append a
            // segment or clear the flag after failing. Either way the next
            // pass resolves it.
            thread::sleep(IN_FLIGHT_RECHECK);
        }
    }

    /// Scheduler-side check; cheap enough to run every tick for every pool.
    pub(crate) fn wants_prefetch(&self) -> bool {
        if self.prefetching.load(Ordering::Acquire) {
            return false;
        }
        if self.links.lock().length >= self.max_chain_length {
            return false;
        }
        self.head
            .read()
            .cursor
            .past_safe_distance(self.safe_distance_percent)
    }

    /// Runs on the scheduler thread: fetches one segment and appends it,
    /// clearing the in-flight flag regardless of outcome.
    pub(crate) fn prefetch(&self) {
        if self.prefetching.swap(true, Ordering::AcqRel) {
            return;
        }
        match self.allocator.next_segment(&self.name) {
            Ok(segment) => {
                if self.append(segment) {
                    debug!(name = %self.name, segment = %segment, "prefetched segment");
                } else {
                    debug!(
                        name = %self.name,
                        segment = %segment,
                        "chain full or segment stale; dropping prefetched segment"
                    );
                }
            }
            Err(error) => {
                warn!(
                    name = %self.name,
                    %error,
                    "segment prefetch failed; will retry on the next tick"
                );
            }
        }
        self.prefetching.store(false, Ordering::Release);
    }

    /// Appends a segment at the tail, re-checking the bound under the lock.
    ///
    /// A segment that arrives out of order (the drain fallback allocated past
    /// it while this prefetch was in flight) is dropped: its range is skipped,
    /// never reused, preserving both uniqueness and allocation-order
    /// consumption.
    fn append(&self, segment: Segment) -> bool {
        let mut links = self.links.lock();
        if links.length >= self.max_chain_length {
            return false;
        }
        if segment.min_id() <= links.tail.cursor.segment().max_id() {
            return false;
        }
        let fresh = Arc::new(ChainNode::new(segment));
        let _ = links.tail.next.set(Arc::clone(&fresh));
        links.tail = fresh;
        links.length += 1;
        true
    }
}
