//! Process-local, collision-free 64-bit id generation at high throughput.
//!
//! Three interchangeable engines sit behind the [`IdGenerator`] contract:
//!
//! - [`SnowflakeIdGenerator`]: time-ordered ids bit-packed from
//!   `(timestamp, worker id, sequence)`, safe against clock regressions via a
//!   [`ClockBackwardsPolicy`].
//! - [`SegmentIdGenerator`]: consumes contiguous ranges ("segments") from a
//!   [`SegmentAllocator`], double-buffered with a background refill and a
//!   blocking bounded handoff at exhaustion.
//! - [`ChainIdGenerator`]: holds a bounded chain of segments topped up by a
//!   shared periodic [`PrefetchScheduler`], with a synchronous fallback when
//!   the chain drains.
//!
//! The segment engines need no coordination on the hot path; only segment
//! refills touch the (external, shared) allocator. All engines guarantee
//! uniqueness and, per segment chain, allocation-order consumption; none
//! guarantees FIFO mapping from caller arrival order to returned values.
//!
//! # Quick start
//!
//! ```
//! use std::sync::Arc;
//! use floe::{
//!     IdGenerator, InMemorySegmentAllocator, SegmentConfig, SegmentIdGenerator,
//!     SnowflakeIdGenerator,
//! };
//!
//! // Snowflake: needs only a cluster-unique worker id.
//! let snowflake = SnowflakeIdGenerator::new("orders", 7).unwrap();
//! let id = snowflake.generate().unwrap();
//! assert_eq!(snowflake.layout().decompose(id).worker_id, 7);
//!
//! // Segment: draws ranges from an allocator.
//! let allocator = Arc::new(InMemorySegmentAllocator::new(1_000).unwrap());
//! let segment = SegmentIdGenerator::new("orders", allocator, SegmentConfig::default()).unwrap();
//! assert_eq!(segment.batch_generate(3).unwrap(), vec![1, 2, 3]);
//! ```

mod clock;
mod error;
mod generator;
mod provider;
mod segment;
mod snowflake;

pub use crate::clock::*;
pub use crate::error::*;
pub use crate::generator::*;
pub use crate::provider::*;
pub use crate::segment::*;
pub use crate::snowflake::*;
