mod allocator;
mod chain;
mod cursor;
mod double_buffer;
mod executor;
mod scheduler;

pub use allocator::{InMemorySegmentAllocator, SegmentAllocator};
pub use chain::{ChainConfig, ChainIdGenerator};
pub use cursor::{Segment, SegmentCursor};
pub use double_buffer::{SegmentConfig, SegmentIdGenerator};
pub use executor::RefillExecutor;
pub use scheduler::PrefetchScheduler;

/// Cap on segment switches within one `generate` call. A healthy allocator
/// needs exactly one switch; hitting the cap means it keeps returning
/// already-exhausted ranges.
pub(crate) const MAX_SEGMENT_SWITCHES: u32 = 8;
