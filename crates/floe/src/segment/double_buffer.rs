use core::time::Duration;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::{
    Error, GeneratorKind, IdGenerator, Result,
    segment::{
        MAX_SEGMENT_SWITCHES, RefillExecutor, SegmentAllocator, SegmentCursor,
    },
};

/// Tuning for a [`SegmentIdGenerator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SegmentConfig {
    /// Refill the next segment once fewer than this percentage of the
    /// current segment's ids remain.
    pub safe_distance_percent: u8,
    /// How long an exhausted caller waits for the next segment before the
    /// call fails with [`Error::HandoffTimeout`].
    pub handoff_timeout: Duration,
    /// Workers in the background refill pool (only used when the generator
    /// spawns its own [`RefillExecutor`]).
    pub refill_threads: usize,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            safe_distance_percent: 50,
            handoff_timeout: Duration::from_secs(10),
            refill_threads: 2,
        }
    }
}

impl SegmentConfig {
    fn validate(&self) -> Result<()> {
        if self.safe_distance_percent == 0 || self.safe_distance_percent > 100 {
            return Err(Error::configuration(
                "safe_distance_percent must be in 1..=100",
            ));
        }
        if self.handoff_timeout.is_zero() {
            return Err(Error::configuration("handoff_timeout must be positive"));
        }
        if self.refill_threads == 0 {
            return Err(Error::configuration("refill_threads must be at least 1"));
        }
        Ok(())
    }
}

/// Handoff state, authoritative and guarded by one mutex.
struct Handoff {
    /// The prefetched cursor, set only by a completed refill and consumed
    /// only by the swap.
    next: Option<SegmentCursor>,
    /// True while a refill is in flight; at most one at a time.
    refilling: bool,
}

struct PoolShared {
    name: String,
    allocator: Arc<dyn SegmentAllocator>,
    safe_distance_percent: u8,
    handoff_timeout: Duration,
    /// Read on the hot path, written only by the swap.
    current: RwLock<Arc<SegmentCursor>>,
    handoff: Mutex<Handoff>,
    ready: Condvar,
    /// Hot-path hint that a refill is in flight or a next cursor is already
    /// staged; suppresses redundant trigger attempts. `Handoff` stays
    /// authoritative.
    refill_armed: AtomicBool,
}

/// Waiters re-check at this cadence so a failed refill gets retried without
/// waiting out the whole handoff deadline.
const HANDOFF_RECHECK: Duration = Duration::from_millis(500);

/// A per-name pool holding the current segment and at most one prefetched
/// next segment (double buffering).
///
/// The hot path is a lock-free cursor increment. Crossing the safe distance
/// arms an asynchronous refill on a [`RefillExecutor`]; at true exhaustion
/// the caller enters a short critical section, swaps in the prefetched
/// cursor, or blocks (bounded by `handoff_timeout`) until a refill delivers
/// one. Background refill failures are logged and retried on the next
/// trigger; only the timeout surfaces to callers, and the pool stays usable
/// afterwards.
///
/// The first segment is loaded eagerly, so construction is fallible and a
/// live pool is never uninitialized.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use floe::{InMemorySegmentAllocator, SegmentConfig, SegmentIdGenerator};
///
/// let allocator = Arc::new(InMemorySegmentAllocator::new(100).unwrap());
/// let generator =
///     SegmentIdGenerator::new("orders", allocator, SegmentConfig::default()).unwrap();
/// assert_eq!(generator.generate().unwrap(), 1);
/// assert_eq!(generator.generate().unwrap(), 2);
/// ```
pub struct SegmentIdGenerator {
    shared: Arc<PoolShared>,
    executor: RefillExecutor,
    owns_executor: bool,
}

impl SegmentIdGenerator {
    /// Creates a pool with its own refill executor (`config.refill_threads`
    /// workers) and eagerly loads the first segment.
    pub fn new(
        name: impl Into<String>,
        allocator: Arc<dyn SegmentAllocator>,
        config: SegmentConfig,
    ) -> Result<Self> {
        config.validate()?;
        let executor = RefillExecutor::new(config.refill_threads);
        Self::build(name, allocator, config, executor, true)
    }

    /// Creates a pool sharing an existing refill executor, so many names can
    /// refill on the same small thread pool. The caller keeps ownership of
    /// the executor; [`shutdown`](Self::shutdown) on this pool leaves it
    /// running.
    pub fn with_executor(
        name: impl Into<String>,
        allocator: Arc<dyn SegmentAllocator>,
        config: SegmentConfig,
        executor: RefillExecutor,
    ) -> Result<Self> {
        Self::build(name, allocator, config, executor, false)
    }

    fn build(
        name: impl Into<String>,
        allocator: Arc<dyn SegmentAllocator>,
        config: SegmentConfig,
        executor: RefillExecutor,
        owns_executor: bool,
    ) -> Result<Self> {
        config.validate()?;
        let name = name.into();
        let first = allocator.next_segment(&name)?;
        info!(%name, segment = %first, "initialized segment id generator");
        let shared = Arc::new(PoolShared {
            name,
            allocator,
            safe_distance_percent: config.safe_distance_percent,
            handoff_timeout: config.handoff_timeout,
            current: RwLock::new(Arc::new(SegmentCursor::new(first))),
            handoff: Mutex::new(Handoff {
                next: None,
                refilling: false,
            }),
            ready: Condvar::new(),
            refill_armed: AtomicBool::new(false),
        });
        Ok(Self {
            shared,
            executor,
            owns_executor,
        })
    }

    /// Generates the next id.
    ///
    /// # Errors
    ///
    /// - [`Error::HandoffTimeout`] if the pool exhausted its segment and no
    ///   refill arrived within the configured timeout.
    /// - [`Error::SegmentRetriesExhausted`] if the allocator keeps returning
    ///   already-exhausted segments.
    pub fn generate(&self) -> Result<i64> {
        for _ in 0..MAX_SEGMENT_SWITCHES {
            let cursor = Arc::clone(&*self.shared.current.read());
            if let Some(id) = cursor.next() {
                if cursor.past_safe_distance(self.shared.safe_distance_percent)
                    && !self.shared.refill_armed.load(Ordering::Relaxed)
                {
                    self.shared.trigger_refill(&self.executor);
                }
                return Ok(id);
            }
            self.shared.switch_or_wait(&self.executor)?;
        }
        Err(Error::SegmentRetriesExhausted {
            name: self.shared.name.clone(),
            attempts: MAX_SEGMENT_SWITCHES,
        })
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Stops the refill executor if this generator owns one (constructed via
    /// [`new`](Self::new)). Pending refills finish first; the pool itself
    /// stays usable until its current segments drain.
    ///
    /// An executor passed in through [`with_executor`](Self::with_executor)
    /// is shared with other pools and is left running; stop it with
    /// [`RefillExecutor::shutdown`].
    pub fn shutdown(&self) {
        if self.owns_executor {
            self.executor.shutdown();
        }
    }
}

impl IdGenerator for SegmentIdGenerator {
    fn generate(&self) -> Result<i64> {
        self.generate()
    }

    fn name(&self) -> &str {
        self.name()
    }

    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Segment
    }
}

impl PoolShared {
    fn trigger_refill(self: &Arc<Self>, executor: &RefillExecutor) {
        let mut handoff = self.handoff.lock();
        self.start_refill_locked(&mut handoff, executor);
    }

    /// Arms a refill unless one is in flight or a next cursor is already
    /// staged. Caller holds the handoff mutex.
    fn start_refill_locked(self: &Arc<Self>, handoff: &mut Handoff, executor: &RefillExecutor) {
        if handoff.refilling || handoff.next.is_some() {
            return;
        }
        handoff.refilling = true;
        self.refill_armed.store(true, Ordering::Relaxed);

        let weak = Arc::downgrade(self);
        let submitted = executor.submit(Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.complete_refill();
            }
        }));
        if !submitted {
            handoff.refilling = false;
            self.refill_armed.store(false, Ordering::Relaxed);
        }
    }

    /// Runs on a refill worker: fetches the next segment and stages it.
    fn complete_refill(&self) {
        match self.allocator.next_segment(&self.name) {
            Ok(segment) => {
                debug!(name = %self.name, segment = %segment, "staged next segment");
                let mut handoff = self.handoff.lock();
                handoff.next = Some(SegmentCursor::new(segment));
                handoff.refilling = false;
                drop(handoff);
                self.ready.notify_all();
            }
            Err(error) => {
                warn!(
                    name = %self.name,
                    %error,
                    "segment refill failed; will retry on the next trigger"
                );
                let mut handoff = self.handoff.lock();
                handoff.refilling = false;
                self.refill_armed.store(false, Ordering::Relaxed);
            }
        }
    }

    /// Called at exhaustion: swaps in the prefetched cursor, or waits for a
    /// refill to deliver one, bounded by the handoff timeout.
    fn switch_or_wait(self: &Arc<Self>, executor: &RefillExecutor) -> Result<()> {
        let deadline = Instant::now() + self.handoff_timeout;
        let mut handoff = self.handoff.lock();
        loop {
            if let Some(cursor) = handoff.next.take() {
                self.refill_armed.store(false, Ordering::Relaxed);
                *self.current.write() = Arc::new(cursor);
                return Ok(());
            }
            // Another caller may have swapped while we queued on the mutex.
            if !self.current.read().is_exhausted() {
                return Ok(());
            }
            self.start_refill_locked(&mut handoff, executor);

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::HandoffTimeout {
                    name: self.name.clone(),
                    waited: self.handoff_timeout,
                });
            }
            let wait = HANDOFF_RECHECK.min(deadline - now);
            debug!(name = %self.name, "waiting for next segment");
            self.ready.wait_for(&mut handoff, wait);
        }
    }
}
