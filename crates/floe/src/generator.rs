use core::fmt;

use crate::{
    Result,
    segment::{ChainIdGenerator, SegmentIdGenerator},
    snowflake::SnowflakeIdGenerator,
};

/// The engine behind an [`IdGenerator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum GeneratorKind {
    /// Time-ordered bit-packed ids ([`SnowflakeIdGenerator`]).
    Snowflake,
    /// Double-buffered segment consumption ([`SegmentIdGenerator`]).
    Segment,
    /// Bounded prefetch-chain segment consumption ([`ChainIdGenerator`]).
    SegmentChain,
}

impl GeneratorKind {
    /// The stable string form of the kind.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Snowflake => "snowflake",
            Self::Segment => "segment",
            Self::SegmentChain => "segment-chain",
        }
    }
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The common contract implemented by all three id generation engines.
///
/// Implementations guarantee that every id returned by [`generate`] is unique
/// within the generator's scope (process-local for the segment engines given
/// a well-behaved allocator, cluster-wide for snowflake given a unique worker
/// id). No FIFO mapping from caller arrival order to returned values is
/// guaranteed under concurrency.
///
/// [`generate`]: IdGenerator::generate
pub trait IdGenerator: Send + Sync {
    /// Generates the next unique id.
    fn generate(&self) -> Result<i64>;

    /// Generates `count` ids by repeated [`generate`] calls.
    ///
    /// The returned sequence reflects call order, nothing stronger.
    ///
    /// [`generate`]: IdGenerator::generate
    fn batch_generate(&self, count: usize) -> Result<Vec<i64>> {
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            ids.push(self.generate()?);
        }
        Ok(ids)
    }

    /// The name this generator draws ids for.
    fn name(&self) -> &str;

    /// The engine backing this generator.
    fn kind(&self) -> GeneratorKind;
}

/// Tagged dispatch over the three engines.
///
/// Useful when the engine is chosen from configuration at runtime but a
/// concrete (non-boxed) type is still wanted.
pub enum AnyIdGenerator {
    Snowflake(SnowflakeIdGenerator),
    Segment(SegmentIdGenerator),
    SegmentChain(ChainIdGenerator),
}

impl IdGenerator for AnyIdGenerator {
    fn generate(&self) -> Result<i64> {
        match self {
            Self::Snowflake(generator) => generator.generate(),
            Self::Segment(generator) => generator.generate(),
            Self::SegmentChain(generator) => generator.generate(),
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Snowflake(generator) => generator.name(),
            Self::Segment(generator) => generator.name(),
            Self::SegmentChain(generator) => generator.name(),
        }
    }

    fn kind(&self) -> GeneratorKind {
        match self {
            Self::Snowflake(_) => GeneratorKind::Snowflake,
            Self::Segment(_) => GeneratorKind::Segment,
            Self::SegmentChain(_) => GeneratorKind::SegmentChain,
        }
    }
}
