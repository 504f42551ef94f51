use core::time::Duration;
use std::thread;

use tracing::{error, warn};

use crate::{Clock, Error, Result};

/// How a snowflake generator reacts to an observed wall-clock regression.
///
/// Small regressions are waited out; large ones are treated as a broken
/// clock and fail the call:
///
/// - `delta <= spin_threshold_ms`: busy-spin re-reading the clock until it
///   strictly exceeds the last seen timestamp. Spinning is intentional here:
///   the wait is sub-threshold (a few milliseconds at most) and a sleep would
///   cost more than it saves.
/// - `spin_threshold_ms < delta <= broken_threshold_ms`: sleep in small
///   increments, re-reading between naps.
/// - `delta > broken_threshold_ms`: return [`Error::ClockMovedBackwards`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClockBackwardsPolicy {
    /// Regressions up to this many milliseconds are spun out.
    pub spin_threshold_ms: i64,
    /// Regressions beyond this many milliseconds fail the call.
    pub broken_threshold_ms: i64,
}

impl Default for ClockBackwardsPolicy {
    fn default() -> Self {
        Self {
            spin_threshold_ms: 10,
            broken_threshold_ms: 2_000,
        }
    }
}

impl ClockBackwardsPolicy {
    pub fn new(spin_threshold_ms: i64, broken_threshold_ms: i64) -> Result<Self> {
        if spin_threshold_ms < 0 || broken_threshold_ms < spin_threshold_ms {
            return Err(Error::configuration(
                "clock backwards thresholds must satisfy 0 <= spin <= broken",
            ));
        }
        Ok(Self {
            spin_threshold_ms,
            broken_threshold_ms,
        })
    }

    /// Resolves a regression: `last_millis` is the timestamp of the most
    /// recently issued id, `observed_millis` the (earlier) reading just
    /// taken. Returns a timestamp strictly greater than `last_millis`, or
    /// fails if the regression exceeds the broken threshold.
    pub fn resolve<C: Clock>(
        &self,
        clock: &C,
        last_millis: i64,
        observed_millis: i64,
    ) -> Result<i64> {
        let delta = last_millis - observed_millis;
        if delta <= 0 {
            return Ok(observed_millis);
        }
        if delta > self.broken_threshold_ms {
            error!(
                delta_ms = delta,
                threshold_ms = self.broken_threshold_ms,
                "clock moved backwards beyond the broken threshold"
            );
            return Err(Error::ClockMovedBackwards {
                last_millis,
                observed_millis,
            });
        }

        warn!(delta_ms = delta, "clock moved backwards; waiting for it to catch up");
        let caught_up = if delta <= self.spin_threshold_ms {
            spin_until_after(clock, last_millis)
        } else {
            sleep_until_after(clock, last_millis)
        };
        Ok(caught_up)
    }
}

/// Busy-spins until the clock strictly exceeds `last_millis`.
pub(crate) fn spin_until_after<C: Clock>(clock: &C, last_millis: i64) -> i64 {
    loop {
        let now = clock.now_millis();
        if now > last_millis {
            return now;
        }
        core::hint::spin_loop();
    }
}

fn sleep_until_after<C: Clock>(clock: &C, last_millis: i64) -> i64 {
    loop {
        let now = clock.now_millis();
        if now > last_millis {
            return now;
        }
        // Sleep the remaining gap; re-check afterwards in case the clock was
        // adjusted again while we slept.
        thread::sleep(Duration::from_millis((last_millis - now).max(1) as u64));
    }
}
