use core::time::Duration;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info};

use crate::segment::chain::ChainShared;

struct SchedulerShared {
    /// Registered pools, weakly held so a dropped generator simply falls out
    /// of the scan.
    pools: Mutex<Vec<Weak<ChainShared>>>,
    stop: Mutex<bool>,
    wake: Condvar,
}

/// One periodic thread that tops up every registered [`ChainIdGenerator`] —
/// a single scheduler is shared by all pools, never one thread per name.
///
/// Each tick (fixed delay) it scans the registry and, for every pool that is
/// below its chain bound and past its safe distance with no prefetch in
/// flight, fetches one segment and appends it. Allocator failures on a tick
/// are logged and retried on the next tick, invisible to callers unless a
/// chain fully drains.
///
/// The thread stops on [`shutdown`](Self::shutdown) or when the scheduler is
/// dropped.
///
/// [`ChainIdGenerator`]: crate::ChainIdGenerator
pub struct PrefetchScheduler {
    shared: Arc<SchedulerShared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PrefetchScheduler {
    /// Spawns the scheduler thread with the given tick period (floored at
    /// one millisecond).
    pub fn new(period: Duration) -> Self {
        let period = period.max(Duration::from_millis(1));
        let shared = Arc::new(SchedulerShared {
            pools: Mutex::new(Vec::new()),
            stop: Mutex::new(false),
            wake: Condvar::new(),
        });
        info!(period_ms = period.as_millis() as u64, "starting prefetch scheduler");

        let weak = Arc::downgrade(&shared);
        let handle = thread::spawn(move || run(&weak, period));
        Self {
            shared,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub(crate) fn register(&self, pool: &Arc<ChainShared>) {
        self.shared.pools.lock().push(Arc::downgrade(pool));
    }

    /// Stops the scheduler thread and joins it. Idempotent.
    pub fn shutdown(&self) {
        {
            let mut stop = self.shared.stop.lock();
            *stop = true;
        }
        self.wake_thread();
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }

    fn wake_thread(&self) {
        self.shared.wake.notify_all();
    }
}

impl Drop for PrefetchScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(weak: &Weak<SchedulerShared>, period: Duration) {
    loop {
        let Some(shared) = weak.upgrade() else {
            break;
        };

        {
            let mut stop = shared.stop.lock();
            if *stop {
                break;
            }
            shared.wake.wait_for(&mut stop, period);
            if *stop {
                break;
            }
        }

        // Snapshot under the lock, prefetch outside it: allocator calls must
        // not block registration.
        let pools: Vec<Arc<ChainShared>> = {
            let mut pools = shared.pools.lock();
            pools.retain(|pool| pool.strong_count() > 0);
            pools.iter().filter_map(Weak::upgrade).collect()
        };
        drop(shared);

        if pools.is_empty() {
            continue;
        }
        debug!(pools = pools.len(), "prefetch scheduler tick");
        for pool in pools {
            if pool.wants_prefetch() {
                pool.prefetch();
            }
        }
    }
}
