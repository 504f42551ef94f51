use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Default epoch: Monday, January 1, 2024 00:00:00 UTC+8, in milliseconds
/// since the Unix epoch.
///
/// Snowflake timestamps are stored relative to this origin, which buys about
/// 69 years of range out of 41 timestamp bits.
pub const DEFAULT_EPOCH_MILLIS: i64 = 1_704_038_400_000;

/// A source of wall-clock time in milliseconds since the Unix epoch.
///
/// This abstraction exists so that tests can substitute a deterministic or
/// misbehaving clock. Unlike a monotonic timer, implementations are allowed
/// to go backwards (NTP corrections, VM migrations); the snowflake engine
/// detects and handles that via [`ClockBackwardsPolicy`].
///
/// # Example
///
/// ```
/// use floe::Clock;
///
/// struct FixedClock;
/// impl Clock for FixedClock {
///     fn now_millis(&self) -> i64 {
///         1234
///     }
/// }
///
/// assert_eq!(FixedClock.now_millis(), 1234);
/// ```
///
/// [`ClockBackwardsPolicy`]: crate::ClockBackwardsPolicy
pub trait Clock: Send + Sync {
    /// Returns the current time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now_millis(&self) -> i64 {
        (**self).now_millis()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_millis(&self) -> i64 {
        (**self).now_millis()
    }
}

/// The system wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before UNIX_EPOCH")
            .as_millis() as i64
    }
}
