use crate::Result;

/// Assigns the worker id a snowflake generator embeds in every id.
///
/// In a cluster this is typically backed by a leasing service that hands out
/// small integers and renews them via heartbeat; that service is an external
/// collaborator. Assignment failure is fatal to generator construction: a
/// snowflake generator without a unique worker id cannot guarantee
/// cluster-wide uniqueness.
pub trait WorkerIdAssigner {
    /// Assigns a worker id in `[0, 2^worker_id_bits)`.
    fn assign_worker_id(&self) -> Result<i64>;

    /// Releases a previously assigned worker id, e.g. on shutdown.
    fn release_worker_id(&self, _worker_id: i64) -> Result<()> {
        Ok(())
    }
}

/// A fixed, manually managed worker id.
///
/// Suitable for deployments where worker ids are assigned by configuration
/// management rather than a coordination service.
#[derive(Clone, Copy, Debug)]
pub struct StaticWorkerIdAssigner {
    worker_id: i64,
}

impl StaticWorkerIdAssigner {
    pub const fn new(worker_id: i64) -> Self {
        Self { worker_id }
    }
}

impl WorkerIdAssigner for StaticWorkerIdAssigner {
    fn assign_worker_id(&self) -> Result<i64> {
        Ok(self.worker_id)
    }
}
