use parking_lot::Mutex;
use tracing::info;

use crate::{
    Clock, Error, GeneratorKind, IdGenerator, Result, SystemClock,
    snowflake::{
        ClockBackwardsPolicy, SnowflakeLayout, WorkerIdAssigner, backwards::spin_until_after,
    },
};

/// Mutable generator state, guarded by one mutex per instance.
struct SnowflakeState {
    last_timestamp: i64,
    sequence: i64,
}

/// A snowflake-style id generator: time-ordered ids packed from
/// `(timestamp, worker id, sequence)` under a configurable [`SnowflakeLayout`].
///
/// Generation is fully serialized under one mutex per instance. That is
/// deliberate: uniqueness depends on a total order over the
/// `(last_timestamp, sequence)` mutation, so all callers contend on a single
/// lock and completions are strictly increasing in the packed integer. Two
/// callers that arrive concurrently may acquire the lock in either order.
///
/// Wall-clock regressions are delegated to a [`ClockBackwardsPolicy`]; a
/// regression beyond the broken threshold fails the call but leaves the
/// generator state untouched, so a later correct clock resumes normally.
///
/// # Example
///
/// ```
/// use floe::{IdGenerator, SnowflakeIdGenerator};
///
/// let generator = SnowflakeIdGenerator::new("orders", 7).unwrap();
/// let a = generator.generate().unwrap();
/// let b = generator.generate().unwrap();
/// assert!(b > a);
/// ```
pub struct SnowflakeIdGenerator<C = SystemClock>
where
    C: Clock,
{
    name: String,
    layout: SnowflakeLayout,
    policy: ClockBackwardsPolicy,
    worker_id: i64,
    clock: C,
    state: Mutex<SnowflakeState>,
}

impl SnowflakeIdGenerator<SystemClock> {
    /// Creates a generator with the default layout (10 worker bits, 12
    /// sequence bits), default clock-backwards policy and the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `worker_id` does not fit the
    /// layout.
    pub fn new(name: impl Into<String>, worker_id: i64) -> Result<Self> {
        Self::with_layout(
            name,
            worker_id,
            SnowflakeLayout::default(),
            ClockBackwardsPolicy::default(),
        )
    }

    /// Creates a generator with an explicit layout and policy, backed by the
    /// system clock.
    pub fn with_layout(
        name: impl Into<String>,
        worker_id: i64,
        layout: SnowflakeLayout,
        policy: ClockBackwardsPolicy,
    ) -> Result<Self> {
        Self::with_clock(name, worker_id, layout, policy, SystemClock)
    }

    /// Creates a generator whose worker id comes from an assigner.
    ///
    /// Assignment failure is fatal: the error propagates and no generator is
    /// constructed.
    pub fn with_assigner<A: WorkerIdAssigner>(
        name: impl Into<String>,
        assigner: &A,
        layout: SnowflakeLayout,
        policy: ClockBackwardsPolicy,
    ) -> Result<Self> {
        let worker_id = assigner.assign_worker_id()?;
        Self::with_layout(name, worker_id, layout, policy)
    }
}

impl<C> SnowflakeIdGenerator<C>
where
    C: Clock,
{
    /// Creates a generator with an explicit clock, mainly for tests and for
    /// callers that already maintain a shared time source.
    pub fn with_clock(
        name: impl Into<String>,
        worker_id: i64,
        layout: SnowflakeLayout,
        policy: ClockBackwardsPolicy,
        clock: C,
    ) -> Result<Self> {
        if worker_id < 0 || worker_id > layout.max_worker_id() {
            return Err(Error::configuration(format!(
                "worker id {worker_id} out of range 0..={}",
                layout.max_worker_id()
            )));
        }
        if clock.now_millis() < layout.epoch_millis() {
            return Err(Error::configuration("layout epoch lies in the future"));
        }
        let name = name.into();
        info!(
            %name,
            worker_id,
            worker_id_bits = layout.worker_id_bits(),
            sequence_bits = layout.sequence_bits(),
            "initialized snowflake id generator"
        );
        Ok(Self {
            name,
            layout,
            policy,
            worker_id,
            clock,
            state: Mutex::new(SnowflakeState {
                last_timestamp: -1,
                sequence: 0,
            }),
        })
    }

    /// Generates the next id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClockMovedBackwards`] if the wall clock regressed
    /// beyond the policy's broken threshold.
    pub fn generate(&self) -> Result<i64> {
        let mut state = self.state.lock();

        let mut now = self.clock.now_millis();
        if now < state.last_timestamp {
            now = self.policy.resolve(&self.clock, state.last_timestamp, now)?;
        }

        if now == state.last_timestamp {
            state.sequence = (state.sequence + 1) & self.layout.sequence_mask();
            if state.sequence == 0 {
                // Sequence exhausted for this tick; the wait is at most one
                // millisecond, so spinning beats sleeping.
                now = spin_until_after(&self.clock, state.last_timestamp);
            }
        } else {
            state.sequence = 0;
        }

        state.last_timestamp = now;
        Ok(self.layout.compose(now, self.worker_id, state.sequence))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> SnowflakeLayout {
        self.layout
    }

    pub fn worker_id(&self) -> i64 {
        self.worker_id
    }
}

impl<C> IdGenerator for SnowflakeIdGenerator<C>
where
    C: Clock,
{
    fn generate(&self) -> Result<i64> {
        self.generate()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Snowflake
    }
}
