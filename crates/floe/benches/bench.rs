use core::hint::black_box;
use core::time::Duration;
use std::sync::{Arc, Barrier};
use std::thread::scope;
use std::time::Instant;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use floe::{
    ChainConfig, ChainIdGenerator, IdGenerator, InMemorySegmentAllocator, PrefetchScheduler,
    SegmentConfig, SegmentIdGenerator, SnowflakeIdGenerator,
};

// Number of IDs generated per benchmark iteration (per-thread for
// multi-threaded).
const TOTAL_IDS: usize = 4096;

// Large enough that an iteration never exhausts a segment mid-measurement;
// refill cost shows up in the contended benchmarks instead.
const SEGMENT_STEP: i64 = 1_000_000;

/// Benchmarks a generator on a single thread.
fn bench_sequential<G>(c: &mut Criterion, group_name: &str, generator_factory: impl Fn() -> G)
where
    G: IdGenerator,
{
    let mut group = c.benchmark_group(group_name);
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    group.bench_function(format!("elems/{TOTAL_IDS}"), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();

            for _ in 0..iters {
                let generator = generator_factory();
                for _ in 0..TOTAL_IDS {
                    black_box(generator.generate().unwrap());
                }
            }

            start.elapsed()
        });
    });

    group.finish();
}

/// Benchmarks a shared generator across threads.
fn bench_contended<G>(c: &mut Criterion, group_name: &str, generator_factory: impl Fn() -> G)
where
    G: IdGenerator + 'static,
{
    let mut group = c.benchmark_group(group_name);
    let max_threads = num_cpus::get();

    for thread_count in [1, 2, 4, 8, 16] {
        if thread_count > max_threads {
            continue;
        }
        let ids_per_thread = TOTAL_IDS / thread_count;

        group.throughput(Throughput::Elements(TOTAL_IDS as u64));
        group.bench_function(format!("elems/{TOTAL_IDS}/threads/{thread_count}"), |b| {
            b.iter_custom(|iters| {
                let start = Instant::now();

                for _ in 0..iters {
                    let generator = Arc::new(generator_factory());
                    let barrier = Arc::new(Barrier::new(thread_count + 1));
                    scope(|s| {
                        for _ in 0..thread_count {
                            let generator = Arc::clone(&generator);
                            let barrier = Arc::clone(&barrier);
                            s.spawn(move || {
                                barrier.wait();
                                for _ in 0..ids_per_thread {
                                    black_box(generator.generate().unwrap());
                                }
                            });
                        }
                        barrier.wait();
                    });
                }

                start.elapsed()
            });
        });
    }

    group.finish();
}

fn benchmark_snowflake_sequential(c: &mut Criterion) {
    bench_sequential(c, "snowflake/sequential", || {
        SnowflakeIdGenerator::new("bench", 1).unwrap()
    });
}

fn benchmark_snowflake_contended(c: &mut Criterion) {
    bench_contended(c, "snowflake/contended", || {
        SnowflakeIdGenerator::new("bench", 1).unwrap()
    });
}

fn benchmark_segment_sequential(c: &mut Criterion) {
    bench_sequential(c, "segment/sequential", || {
        let allocator = Arc::new(InMemorySegmentAllocator::new(SEGMENT_STEP).unwrap());
        SegmentIdGenerator::new("bench", allocator, SegmentConfig::default()).unwrap()
    });
}

fn benchmark_segment_contended(c: &mut Criterion) {
    bench_contended(c, "segment/contended", || {
        let allocator = Arc::new(InMemorySegmentAllocator::new(SEGMENT_STEP).unwrap());
        SegmentIdGenerator::new("bench", allocator, SegmentConfig::default()).unwrap()
    });
}

fn benchmark_chain_sequential(c: &mut Criterion) {
    let scheduler = PrefetchScheduler::new(Duration::from_millis(100));
    bench_sequential(c, "chain/sequential", || {
        let allocator = Arc::new(InMemorySegmentAllocator::new(SEGMENT_STEP).unwrap());
        ChainIdGenerator::new("bench", allocator, &scheduler, ChainConfig::default()).unwrap()
    });
}

fn benchmark_chain_contended(c: &mut Criterion) {
    let scheduler = PrefetchScheduler::new(Duration::from_millis(100));
    bench_contended(c, "chain/contended", move || {
        let allocator = Arc::new(InMemorySegmentAllocator::new(SEGMENT_STEP).unwrap());
        ChainIdGenerator::new("bench", allocator, &scheduler, ChainConfig::default()).unwrap()
    });
}

criterion_group!(
    benches,
    benchmark_snowflake_sequential,
    benchmark_snowflake_contended,
    benchmark_segment_sequential,
    benchmark_segment_contended,
    benchmark_chain_sequential,
    benchmark_chain_contended,
);
criterion_main!(benches);
