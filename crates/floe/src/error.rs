use core::time::Duration;

/// A result type defaulting to the crate-wide [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All error variants that `floe` can emit.
///
/// Every detected failure condition raises an error rather than silently
/// returning a possibly-duplicate or possibly-decreasing id.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A generator or pool was constructed with invalid parameters.
    ///
    /// Fatal: raised before any id is issued.
    #[error("invalid configuration: {reason}")]
    Configuration { reason: String },

    /// The wall clock regressed beyond the broken threshold.
    ///
    /// Fatal for the failing call only. Generator state is left unchanged, so
    /// a later correct clock reading resumes generation normally.
    #[error(
        "clock moved backwards by {}ms (last {last_millis}, observed {observed_millis})",
        last_millis - observed_millis
    )]
    ClockMovedBackwards {
        last_millis: i64,
        observed_millis: i64,
    },

    /// A double-buffered pool waited longer than its handoff timeout for the
    /// next segment to arrive.
    ///
    /// The pool remains usable and will retry the refill on the next trigger.
    #[error("timed out after {waited:?} waiting for the next segment of `{name}`")]
    HandoffTimeout { name: String, waited: Duration },

    /// The segment allocator failed.
    ///
    /// Background refill and prefetch paths swallow this and retry on the
    /// next trigger or tick; it reaches callers only through the chain pool's
    /// synchronous drain fallback and through pool construction.
    #[error("segment allocator failed: {message}")]
    Allocator {
        message: String,
        #[source]
        source: Option<Box<dyn core::error::Error + Send + Sync>>,
    },

    /// A generator was requested by name before it was registered.
    #[error("no generator registered under `{name}`")]
    Uninitialized { name: String },

    /// A pool switched segments `attempts` times without obtaining a usable
    /// cursor, which means the allocator keeps returning exhausted ranges.
    #[error("gave up after {attempts} segment switches for `{name}`")]
    SegmentRetriesExhausted { name: String, attempts: u32 },
}

impl Error {
    /// Builds a [`Error::Configuration`] from a reason string.
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Builds a [`Error::Allocator`] from a bare message.
    pub fn allocator(message: impl Into<String>) -> Self {
        Self::Allocator {
            message: message.into(),
            source: None,
        }
    }

    /// Builds a [`Error::Allocator`] wrapping an underlying failure, e.g. a
    /// storage or transport error from an external allocator implementation.
    pub fn allocator_with(
        message: impl Into<String>,
        source: impl core::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Allocator {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
