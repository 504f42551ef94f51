use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

struct ExecutorInner {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

/// A small fixed-size background pool that runs segment refills, decoupled
/// from caller threads.
///
/// Cloning is cheap and shares the pool, so many [`SegmentIdGenerator`]s can
/// run their refills on the same two threads. The pool drains and joins on
/// [`shutdown`](Self::shutdown) or when the last clone is dropped; jobs
/// submitted afterwards are rejected rather than queued forever.
///
/// [`SegmentIdGenerator`]: crate::SegmentIdGenerator
#[derive(Clone)]
pub struct RefillExecutor {
    inner: Arc<ExecutorInner>,
}

impl Default for RefillExecutor {
    /// Two refill threads, matching the default [`SegmentConfig`].
    ///
    /// [`SegmentConfig`]: crate::SegmentConfig
    fn default() -> Self {
        Self::new(2)
    }
}

impl RefillExecutor {
    /// Spawns a pool of `threads` workers (at least one).
    pub fn new(threads: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..threads.max(1))
            .map(|_| {
                let receiver = Arc::clone(&receiver);
                thread::spawn(move || {
                    loop {
                        // The guard must drop before the job runs so other
                        // workers can pick up the next one.
                        let job = { receiver.lock().recv() };
                        match job {
                            Ok(job) => job(),
                            Err(_) => break,
                        }
                    }
                })
            })
            .collect();

        Self {
            inner: Arc::new(ExecutorInner {
                sender: Mutex::new(Some(sender)),
                workers: Mutex::new(workers),
            }),
        }
    }

    /// Queues a job; returns `false` if the pool has been shut down.
    pub(crate) fn submit(&self, job: Job) -> bool {
        match self.inner.sender.lock().as_ref() {
            Some(sender) => sender.send(job).is_ok(),
            None => false,
        }
    }

    /// Stops accepting work, drains queued jobs and joins the workers.
    pub fn shutdown(&self) {
        drop(self.inner.sender.lock().take());
        let workers: Vec<_> = self.inner.workers.lock().drain(..).collect();
        for worker in workers {
            let _ = worker.join();
        }
    }
}

impl Drop for ExecutorInner {
    fn drop(&mut self) {
        drop(self.sender.get_mut().take());
        for worker in self.workers.get_mut().drain(..) {
            let _ = worker.join();
        }
    }
}
