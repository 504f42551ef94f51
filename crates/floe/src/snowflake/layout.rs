use crate::{DEFAULT_EPOCH_MILLIS, Error, Result};

/// The bit layout of a snowflake id.
///
/// Ids are packed into a 64-bit signed integer as
/// `[sign(1, always 0)][timestamp][worker id][sequence]`, where the timestamp
/// field receives whatever of the 63 value bits the worker id and sequence
/// leave over. The default layout (10 worker bits, 12 sequence bits) matches
/// the classic Twitter arrangement: 41 timestamp bits, 1024 workers, 4096 ids
/// per worker per millisecond.
///
/// A layout is immutable once built and doubles as the stateless parsing
/// companion: [`decompose`](Self::decompose) recovers the fields of any id
/// generated under the same layout, with no access to the generator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SnowflakeLayout {
    epoch_millis: i64,
    worker_id_bits: u32,
    sequence_bits: u32,
}

/// The decoded fields of a snowflake id.
///
/// Produced by [`SnowflakeLayout::decompose`]; `timestamp_millis` has the
/// layout's epoch added back, so it is milliseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SnowflakeIdParts {
    pub timestamp_millis: i64,
    pub worker_id: i64,
    pub sequence: i64,
}

impl Default for SnowflakeLayout {
    fn default() -> Self {
        Self {
            epoch_millis: DEFAULT_EPOCH_MILLIS,
            worker_id_bits: 10,
            sequence_bits: 12,
        }
    }
}

impl SnowflakeLayout {
    /// Builds a layout with custom field widths.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if either width is zero, if the
    /// epoch is negative, or if the widths leave no room for a timestamp
    /// (`worker_id_bits + sequence_bits` must be at most 62).
    ///
    /// # Example
    ///
    /// ```
    /// use floe::SnowflakeLayout;
    ///
    /// let layout = SnowflakeLayout::new(1_704_038_400_000, 10, 12).unwrap();
    /// assert_eq!(layout.timestamp_bits(), 41);
    /// assert_eq!(layout.max_worker_id(), 1023);
    /// assert_eq!(layout.max_sequence(), 4095);
    /// ```
    pub fn new(epoch_millis: i64, worker_id_bits: u32, sequence_bits: u32) -> Result<Self> {
        if worker_id_bits == 0 || sequence_bits == 0 {
            return Err(Error::configuration(
                "worker id and sequence widths must be at least one bit",
            ));
        }
        if worker_id_bits + sequence_bits > 62 {
            return Err(Error::configuration(format!(
                "worker id ({worker_id_bits}) + sequence ({sequence_bits}) bits leave no room \
                 for a timestamp"
            )));
        }
        if epoch_millis < 0 {
            return Err(Error::configuration("epoch must not precede the Unix epoch"));
        }
        Ok(Self {
            epoch_millis,
            worker_id_bits,
            sequence_bits,
        })
    }

    /// The layout's epoch, in milliseconds since the Unix epoch.
    pub const fn epoch_millis(&self) -> i64 {
        self.epoch_millis
    }

    pub const fn worker_id_bits(&self) -> u32 {
        self.worker_id_bits
    }

    pub const fn sequence_bits(&self) -> u32 {
        self.sequence_bits
    }

    /// Bits left for the timestamp after the sign, worker id and sequence.
    pub const fn timestamp_bits(&self) -> u32 {
        63 - self.worker_id_bits - self.sequence_bits
    }

    /// Largest worker id the layout can encode.
    pub const fn max_worker_id(&self) -> i64 {
        (1 << self.worker_id_bits) - 1
    }

    /// Largest per-millisecond sequence value; also the sequence mask.
    pub const fn max_sequence(&self) -> i64 {
        (1 << self.sequence_bits) - 1
    }

    pub(crate) const fn sequence_mask(&self) -> i64 {
        self.max_sequence()
    }

    const fn worker_id_shift(&self) -> u32 {
        self.sequence_bits
    }

    const fn timestamp_shift(&self) -> u32 {
        self.worker_id_bits + self.sequence_bits
    }

    /// Packs the three fields into an id. `timestamp_millis` is absolute
    /// (since the Unix epoch); the layout's epoch is subtracted here.
    pub(crate) fn compose(&self, timestamp_millis: i64, worker_id: i64, sequence: i64) -> i64 {
        ((timestamp_millis - self.epoch_millis) << self.timestamp_shift())
            | (worker_id << self.worker_id_shift())
            | sequence
    }

    /// Decodes an id generated under this layout via pure shift/mask.
    ///
    /// Always available, even while the generator that produced the id is
    /// live: parsing touches no mutable state.
    ///
    /// # Example
    ///
    /// ```
    /// use floe::{SnowflakeIdGenerator, SnowflakeLayout};
    ///
    /// let layout = SnowflakeLayout::default();
    /// let generator = SnowflakeIdGenerator::new("orders", 42).unwrap();
    /// let id = generator.generate().unwrap();
    ///
    /// let parts = layout.decompose(id);
    /// assert_eq!(parts.worker_id, 42);
    /// assert!(parts.sequence <= layout.max_sequence());
    /// ```
    pub fn decompose(&self, id: i64) -> SnowflakeIdParts {
        SnowflakeIdParts {
            timestamp_millis: (id >> self.timestamp_shift()) + self.epoch_millis,
            worker_id: (id >> self.worker_id_shift()) & self.max_worker_id(),
            sequence: id & self.sequence_mask(),
        }
    }
}
