//! # Admission Benchmarks
//!
//! Limiter decision cost, queue handoff, and end-to-end pool throughput.
//!
//! Run with: `cargo bench`

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use gatekeep::{
    AdmissionControlledSubmitter, BoundedTaskQueue, KeyedLimiter, Pop, SlidingWindowConfig,
    SlidingWindowLimiter, TokenBucketConfig, TokenBucketLimiter, WorkerPool,
};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Single-threaded grant path of both limiters
fn bench_limiter_acquire(c: &mut Criterion) {
    let mut group = c.benchmark_group("limiter_acquire");
    group.throughput(Throughput::Elements(1));

    group.bench_function("token_bucket", |b| {
        let limiter =
            TokenBucketLimiter::new(TokenBucketConfig::per_second(u64::MAX / 2)).unwrap();
        b.iter(|| std::hint::black_box(limiter.try_acquire()));
    });

    for max_requests in [10usize, 1_000, 100_000] {
        group.bench_with_input(
            BenchmarkId::new("sliding_window", max_requests),
            &max_requests,
            |b, &max_requests| {
                b.iter_batched(
                    || {
                        SlidingWindowLimiter::new(SlidingWindowConfig::per_minute(max_requests))
                            .unwrap()
                    },
                    |limiter| {
                        for _ in 0..max_requests.min(1_000) {
                            std::hint::black_box(limiter.try_acquire());
                        }
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

/// Denial path: full window / empty bucket
fn bench_limiter_reject(c: &mut Criterion) {
    let mut group = c.benchmark_group("limiter_reject");

    group.bench_function("token_bucket", |b| {
        let limiter = TokenBucketLimiter::new(TokenBucketConfig::per_minute(1)).unwrap();
        limiter.try_acquire();
        b.iter(|| std::hint::black_box(limiter.try_acquire()));
    });

    group.bench_function("sliding_window", |b| {
        let limiter = SlidingWindowLimiter::new(SlidingWindowConfig::per_minute(100)).unwrap();
        while limiter.try_acquire() {}
        b.iter(|| std::hint::black_box(limiter.try_acquire()));
    });

    group.finish();
}

/// Many threads contending for one limiter mutex
fn bench_limiter_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("limiter_contention");

    for num_threads in [2, 4, 8] {
        group.throughput(Throughput::Elements(num_threads as u64 * 1000));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_threads", num_threads)),
            &num_threads,
            |b, &num_threads| {
                let limiter = Arc::new(
                    TokenBucketLimiter::new(TokenBucketConfig::per_second(1_000_000)).unwrap(),
                );

                b.iter_custom(|iters| {
                    let mut total_duration = Duration::ZERO;

                    for _ in 0..iters {
                        limiter.reset();
                        let start = Instant::now();

                        let handles: Vec<_> = (0..num_threads)
                            .map(|_| {
                                let limiter = Arc::clone(&limiter);
                                thread::spawn(move || {
                                    for _ in 0..1000 {
                                        limiter.try_acquire();
                                    }
                                })
                            })
                            .collect();

                        for handle in handles {
                            handle.join().unwrap();
                        }

                        total_duration += start.elapsed();
                    }

                    total_duration
                });
            },
        );
    }

    group.finish();
}

/// Uncontended push/pop pair on the bounded queue
fn bench_queue_handoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_handoff");
    group.throughput(Throughput::Elements(1));

    group.bench_function("push_pop", |b| {
        let queue = BoundedTaskQueue::new(64);
        b.iter(|| {
            queue.push(std::hint::black_box(1u64)).unwrap();
            match queue.pop(Duration::from_millis(1)) {
                Pop::Item(value) => std::hint::black_box(value),
                _ => 0,
            }
        });
    });

    group.finish();
}

/// Submit-to-completion throughput of the pool
fn bench_pool_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_throughput");
    let tasks = 10_000u64;
    group.throughput(Throughput::Elements(tasks));

    for workers in [1, 2, 4] {
        group.bench_with_input(BenchmarkId::new("workers", workers), &workers, |b, &workers| {
            b.iter_custom(|iters| {
                let mut total_duration = Duration::ZERO;

                for _ in 0..iters {
                    let pool = WorkerPool::new(workers, 256).unwrap();
                    let counter = Arc::new(AtomicU64::new(0));
                    let start = Instant::now();

                    for _ in 0..tasks {
                        let counter = Arc::clone(&counter);
                        pool.submit(move || {
                            counter.fetch_add(1, Ordering::Relaxed);
                        })
                        .unwrap();
                    }
                    pool.join();

                    total_duration += start.elapsed();
                    assert_eq!(counter.load(Ordering::Relaxed), tasks);
                }

                total_duration
            });
        });
    }

    group.finish();
}

/// Submitter overhead when most requests are turned away
fn bench_submitter_fail_fast(c: &mut Criterion) {
    let mut group = c.benchmark_group("submitter");

    group.bench_function("rate_limited", |b| {
        let pool = Arc::new(WorkerPool::new(1, 16).unwrap());
        let limiter = TokenBucketLimiter::new(TokenBucketConfig::per_minute(1)).unwrap();
        let submitter = AdmissionControlledSubmitter::new(limiter, Arc::clone(&pool));
        let _ = submitter.submit(|| {});

        b.iter(|| std::hint::black_box(submitter.submit(|| {}).is_err()));

        pool.join();
    });

    group.finish();
}

/// Lookup and creation in the keyed registry
fn bench_keyed_limiter(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyed_limiter");

    group.bench_function("existing_key", |b| {
        let keyed = KeyedLimiter::new(|| {
            TokenBucketLimiter::new(TokenBucketConfig::per_second(1_000_000)).unwrap()
        });
        let ip = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1));
        keyed.try_acquire(&ip);

        b.iter(|| std::hint::black_box(keyed.try_acquire(&ip)));
    });

    group.bench_function("new_keys", |b| {
        b.iter_batched(
            || {
                KeyedLimiter::new(|| {
                    SlidingWindowLimiter::new(SlidingWindowConfig::per_second(10)).unwrap()
                })
            },
            |keyed| {
                for i in 0..256u32 {
                    let ip = IpAddr::V4(Ipv4Addr::from(0x0A00_0000 + i));
                    std::hint::black_box(keyed.try_acquire(&ip));
                }
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_limiter_acquire,
    bench_limiter_reject,
    bench_limiter_contention,
    bench_queue_handoff,
    bench_pool_throughput,
    bench_submitter_fail_fast,
    bench_keyed_limiter,
);

criterion_main!(benches);
