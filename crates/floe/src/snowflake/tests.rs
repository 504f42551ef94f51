use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::thread::scope;

use crate::{
    Clock, ClockBackwardsPolicy, Error, IdGenerator, Result, SnowflakeIdGenerator,
    SnowflakeLayout, StaticWorkerIdAssigner, WorkerIdAssigner,
};

/// A clock frozen at a fixed instant.
struct FixedClock {
    millis: i64,
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.millis
    }
}

/// A clock that can be set from the test while the generator holds it.
struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    fn new(millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(millis),
        }
    }

    fn set(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// Reports `base` for the first `threshold` reads, then `base + 1`. Lets a
/// sequence-rollover spin terminate deterministically.
struct SteppingClock {
    base: i64,
    threshold: u64,
    reads: AtomicU64,
}

impl SteppingClock {
    fn new(base: i64, threshold: u64) -> Self {
        Self {
            base,
            threshold,
            reads: AtomicU64::new(0),
        }
    }
}

impl Clock for SteppingClock {
    fn now_millis(&self) -> i64 {
        if self.reads.fetch_add(1, Ordering::SeqCst) < self.threshold {
            self.base
        } else {
            self.base + 1
        }
    }
}

/// Advances one millisecond per read, from an offset the test can rewind.
struct TickingClock {
    millis: AtomicI64,
}

impl TickingClock {
    fn new(start: i64) -> Self {
        Self {
            millis: AtomicI64::new(start),
        }
    }

    fn rewind_to(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl Clock for TickingClock {
    fn now_millis(&self) -> i64 {
        self.millis.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[test]
fn layout_rejects_zero_width_fields() {
    assert!(matches!(
        SnowflakeLayout::new(0, 0, 12),
        Err(Error::Configuration { .. })
    ));
    assert!(matches!(
        SnowflakeLayout::new(0, 10, 0),
        Err(Error::Configuration { .. })
    ));
}

#[test]
fn layout_rejects_widths_that_crowd_out_the_timestamp() {
    assert!(matches!(
        SnowflakeLayout::new(0, 31, 32),
        Err(Error::Configuration { .. })
    ));
    // 62 total bits leaves exactly one timestamp bit, which is allowed.
    let layout = SnowflakeLayout::new(0, 30, 32).unwrap();
    assert_eq!(layout.timestamp_bits(), 1);
}

#[test]
fn layout_rejects_negative_epoch() {
    assert!(matches!(
        SnowflakeLayout::new(-1, 10, 12),
        Err(Error::Configuration { .. })
    ));
}

#[test]
fn default_layout_matches_twitter_arrangement() {
    let layout = SnowflakeLayout::default();
    assert_eq!(layout.timestamp_bits(), 41);
    assert_eq!(layout.max_worker_id(), 1023);
    assert_eq!(layout.max_sequence(), 4095);
}

#[test]
fn policy_rejects_inverted_thresholds() {
    assert!(ClockBackwardsPolicy::new(-1, 100).is_err());
    assert!(ClockBackwardsPolicy::new(200, 100).is_err());
    assert!(ClockBackwardsPolicy::new(10, 10).is_ok());
}

#[test]
fn worker_id_must_fit_the_layout() {
    let layout = SnowflakeLayout::new(0, 4, 12).unwrap();
    let policy = ClockBackwardsPolicy::default();
    assert!(SnowflakeIdGenerator::with_layout("t", 15, layout, policy).is_ok());
    assert!(matches!(
        SnowflakeIdGenerator::with_layout("t", 16, layout, policy),
        Err(Error::Configuration { .. })
    ));
    assert!(matches!(
        SnowflakeIdGenerator::with_layout("t", -1, layout, policy),
        Err(Error::Configuration { .. })
    ));
}

#[test]
fn future_epoch_is_rejected() {
    let layout = SnowflakeLayout::new(5_000, 10, 12).unwrap();
    let clock = FixedClock { millis: 4_999 };
    let result = SnowflakeIdGenerator::with_clock(
        "t",
        1,
        layout,
        ClockBackwardsPolicy::default(),
        clock,
    );
    assert!(matches!(result, Err(Error::Configuration { .. })));
}

#[test]
fn sequence_increments_within_same_tick() {
    let layout = SnowflakeLayout::new(0, 10, 12).unwrap();
    let clock = FixedClock { millis: 42 };
    let generator =
        SnowflakeIdGenerator::with_clock("t", 7, layout, ClockBackwardsPolicy::default(), clock)
            .unwrap();

    for expected_sequence in 0..3 {
        let parts = layout.decompose(generator.generate().unwrap());
        assert_eq!(parts.timestamp_millis, 42);
        assert_eq!(parts.worker_id, 7);
        assert_eq!(parts.sequence, expected_sequence);
    }
}

#[test]
fn sequence_resets_when_the_tick_advances() {
    let layout = SnowflakeLayout::new(0, 10, 12).unwrap();
    let clock = ManualClock::new(42);
    let generator =
        SnowflakeIdGenerator::with_clock("t", 7, layout, ClockBackwardsPolicy::default(), &clock)
            .unwrap();

    let first = layout.decompose(generator.generate().unwrap());
    let second = layout.decompose(generator.generate().unwrap());
    assert_eq!((first.sequence, second.sequence), (0, 1));

    clock.set(43);
    let third = layout.decompose(generator.generate().unwrap());
    assert_eq!(third.timestamp_millis, 43);
    assert_eq!(third.sequence, 0);
}

#[test]
fn rollover_spins_into_the_next_tick() {
    // Two sequence bits: four ids per tick, the fifth must roll over.
    let layout = SnowflakeLayout::new(0, 1, 2).unwrap();
    let per_tick = layout.max_sequence() + 1;
    // Generous threshold: constructor + 5 generate calls read the clock a
    // handful of times before the rollover spin starts.
    let clock = SteppingClock::new(42, 64);
    let generator =
        SnowflakeIdGenerator::with_clock("t", 1, layout, ClockBackwardsPolicy::default(), clock)
            .unwrap();

    for expected_sequence in 0..per_tick {
        let parts = layout.decompose(generator.generate().unwrap());
        assert_eq!(parts.timestamp_millis, 42);
        assert_eq!(parts.sequence, expected_sequence);
    }
    let rolled = layout.decompose(generator.generate().unwrap());
    assert_eq!(rolled.timestamp_millis, 43);
    assert_eq!(rolled.sequence, 0);
}

#[test]
fn small_regression_is_spun_out() {
    let layout = SnowflakeLayout::new(0, 10, 12).unwrap();
    let clock = TickingClock::new(1_000);
    let generator =
        SnowflakeIdGenerator::with_clock("t", 1, layout, ClockBackwardsPolicy::default(), &clock)
            .unwrap();

    let first = generator.generate().unwrap();
    let last = layout.decompose(first).timestamp_millis;

    // Rewind below the last issued timestamp; delta stays within the spin
    // threshold, and the ticking clock lets the spin terminate.
    clock.rewind_to(last - 5);
    let second = generator.generate().unwrap();
    assert!(second > first);
    assert!(layout.decompose(second).timestamp_millis > last);
}

#[test]
fn moderate_regression_is_slept_out() {
    let layout = SnowflakeLayout::new(0, 10, 12).unwrap();
    let clock = TickingClock::new(1_000);
    let policy = ClockBackwardsPolicy::new(10, 2_000).unwrap();
    let generator =
        SnowflakeIdGenerator::with_clock("t", 1, layout, policy, &clock).unwrap();

    let first = generator.generate().unwrap();
    let last = layout.decompose(first).timestamp_millis;

    // Past the spin threshold but well inside the broken threshold.
    clock.rewind_to(last - 25);
    let second = generator.generate().unwrap();
    assert!(layout.decompose(second).timestamp_millis > last);
}

#[test]
fn broken_clock_fails_the_call_and_leaves_state_intact() {
    let layout = SnowflakeLayout::new(0, 10, 12).unwrap();
    let clock = ManualClock::new(10_000);
    let generator =
        SnowflakeIdGenerator::with_clock("t", 1, layout, ClockBackwardsPolicy::default(), &clock)
            .unwrap();

    let first = generator.generate().unwrap();

    clock.set(7_000);
    match generator.generate() {
        Err(Error::ClockMovedBackwards {
            last_millis,
            observed_millis,
        }) => {
            assert_eq!(last_millis, 10_000);
            assert_eq!(observed_millis, 7_000);
        }
        other => panic!("expected ClockMovedBackwards, got {other:?}"),
    }

    // The failed call must not have advanced internal state: once the clock
    // heals, generation resumes past the last issued id.
    clock.set(10_001);
    let healed = generator.generate().unwrap();
    assert!(healed > first);
    assert_eq!(layout.decompose(healed).timestamp_millis, 10_001);
}

#[test]
fn static_assigner_supplies_the_worker_id() {
    let assigner = StaticWorkerIdAssigner::new(9);
    let generator = SnowflakeIdGenerator::with_assigner(
        "t",
        &assigner,
        SnowflakeLayout::default(),
        ClockBackwardsPolicy::default(),
    )
    .unwrap();
    assert_eq!(generator.worker_id(), 9);
    assert!(assigner.release_worker_id(9).is_ok());
}

#[test]
fn failing_assigner_aborts_construction() {
    struct Broken;
    impl WorkerIdAssigner for Broken {
        fn assign_worker_id(&self) -> Result<i64> {
            Err(Error::allocator("lease service unavailable"))
        }
    }
    assert!(
        SnowflakeIdGenerator::with_assigner(
            "t",
            &Broken,
            SnowflakeLayout::default(),
            ClockBackwardsPolicy::default(),
        )
        .is_err()
    );
}

#[test]
fn ids_are_strictly_increasing_single_threaded() {
    let generator = SnowflakeIdGenerator::new("t", 1).unwrap();
    let mut last = 0;
    for _ in 0..10_000 {
        let id = generator.generate().unwrap();
        assert!(id > last);
        last = id;
    }
}

#[test]
fn concurrent_generation_is_collision_free() {
    const THREADS: usize = 4;
    const IDS_PER_THREAD: usize = 5_000;

    let generator = SnowflakeIdGenerator::new("t", 42).unwrap();
    let seen = Mutex::new(HashSet::with_capacity(THREADS * IDS_PER_THREAD));

    scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                let mut local = Vec::with_capacity(IDS_PER_THREAD);
                for _ in 0..IDS_PER_THREAD {
                    local.push(generator.generate().unwrap());
                }
                let mut seen = seen.lock().unwrap();
                for id in local {
                    assert!(id > 0);
                    assert!(seen.insert(id), "duplicate id {id}");
                }
            });
        }
    });

    assert_eq!(seen.into_inner().unwrap().len(), THREADS * IDS_PER_THREAD);
}

#[test]
fn decomposed_parts_round_trip_through_the_layout() {
    let layout = SnowflakeLayout::default();
    let generator = SnowflakeIdGenerator::new("t", 42).unwrap();
    let id = generator.generate().unwrap();
    let parts = layout.decompose(id);
    assert_eq!(parts.worker_id, 42);
    assert!(parts.sequence <= layout.max_sequence());
    assert!(parts.timestamp_millis >= layout.epoch_millis());
}

#[test]
fn trait_object_reports_kind_and_name() {
    use crate::GeneratorKind;
    let generator = SnowflakeIdGenerator::new("orders", 1).unwrap();
    let generator: &dyn IdGenerator = &generator;
    assert_eq!(generator.name(), "orders");
    assert_eq!(generator.kind(), GeneratorKind::Snowflake);
    assert_eq!(generator.kind().as_str(), "snowflake");
    let batch = generator.batch_generate(5).unwrap();
    assert_eq!(batch.len(), 5);
    assert!(batch.windows(2).all(|w| w[0] < w[1]));
}
