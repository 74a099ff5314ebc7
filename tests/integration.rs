use gatekeep::{
    current_time_ms, AdmissionControlledSubmitter, KeyedConfig, KeyedLimiter, PoolConfig,
    PoolState, RateLimiter, SlidingWindowConfig, SlidingWindowLimiter, SubmitError,
    TokenBucketConfig, TokenBucketLimiter, WorkerPool,
};
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Barrier, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Sleeps until just past a whole-second boundary of the limiter time base,
/// so a short burst of calls lands in a single second.
fn align_to_second_start() {
    let into_second = current_time_ms() % 1000;
    if into_second > 100 {
        thread::sleep(Duration::from_millis(1000 - into_second + 5));
    }
}

fn fast_pool(workers: usize, capacity: usize) -> WorkerPool {
    WorkerPool::with_config(
        PoolConfig::new(workers, capacity).with_poll_interval(Duration::from_millis(50)),
    )
    .unwrap()
}

#[test]
fn test_sliding_window_scenario() {
    let limiter = SlidingWindowLimiter::new(SlidingWindowConfig::per_second(3)).unwrap();

    align_to_second_start();
    assert!(limiter.try_acquire());
    assert!(limiter.try_acquire());
    assert!(limiter.try_acquire());
    assert!(!limiter.try_acquire());

    thread::sleep(Duration::from_millis(1100));
    assert!(limiter.try_acquire());

    let metrics = limiter.metrics();
    assert_eq!(metrics.total_acquired, 4);
    assert_eq!(metrics.total_rejected, 1);
}

#[test]
fn test_token_bucket_scenario() {
    let limiter = TokenBucketLimiter::new(TokenBucketConfig::new(
        5,
        5,
        Duration::from_millis(1000),
    ))
    .unwrap();

    for _ in 0..5 {
        assert!(limiter.try_acquire());
    }
    assert!(!limiter.try_acquire());

    thread::sleep(Duration::from_millis(1010));
    assert!(limiter.try_acquire());
    assert_eq!(limiter.available_tokens(), 4);
}

#[test]
fn test_token_bucket_sustained_rate() {
    let limiter = Arc::new(
        TokenBucketLimiter::new(TokenBucketConfig::new(10, 10, Duration::from_millis(100)))
            .unwrap(),
    );

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            thread::spawn(move || {
                let start = Instant::now();
                let mut acquired = 0u64;
                while start.elapsed() < Duration::from_millis(500) {
                    if limiter.try_acquire() {
                        acquired += 1;
                    }
                    thread::sleep(Duration::from_millis(1));
                }
                acquired
            })
        })
        .collect();

    let total: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();

    // Initial burst of 10 plus at most one refill per elapsed 100ms.
    assert!(total >= 10);
    assert!(total <= 10 + 10 * 6, "granted {} in 500ms", total);
}

#[test]
fn test_pool_backpressure_scenario() {
    let pool = Arc::new(fast_pool(2, 3));
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let release_rx = Arc::new(Mutex::new(release_rx));
    let started = Arc::new(Barrier::new(3));
    let finished = Arc::new(AtomicUsize::new(0));

    // Occupy both workers so the queue itself fills up.
    for _ in 0..2 {
        let release_rx = Arc::clone(&release_rx);
        let started = Arc::clone(&started);
        let finished = Arc::clone(&finished);
        pool.submit(move || {
            started.wait();
            let _ = release_rx.lock().unwrap().recv();
            finished.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }
    started.wait();

    // Three quick submits fill the queue without blocking.
    let quick = Instant::now();
    for _ in 0..3 {
        let finished = Arc::clone(&finished);
        pool.submit(move || {
            finished.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }
    assert!(quick.elapsed() < Duration::from_millis(500));
    assert_eq!(pool.queued(), 3);

    // The fourth blocks until a worker frees a slot.
    let fourth_done = Arc::new(AtomicBool::new(false));
    let producer = {
        let pool = Arc::clone(&pool);
        let fourth_done = Arc::clone(&fourth_done);
        let finished = Arc::clone(&finished);
        thread::spawn(move || {
            let result = pool.submit(move || {
                finished.fetch_add(1, Ordering::SeqCst);
            });
            fourth_done.store(true, Ordering::SeqCst);
            result
        })
    };

    thread::sleep(Duration::from_millis(200));
    assert!(!fourth_done.load(Ordering::SeqCst));
    assert!(pool.queued() <= 3);

    release_tx.send(()).unwrap();
    assert_eq!(producer.join().unwrap(), Ok(()));

    // After shutdown the next submit is refused while queued work still runs.
    pool.shutdown();
    assert_eq!(pool.submit(|| {}), Err(SubmitError::ShuttingDown));
    assert_eq!(pool.state(), PoolState::Draining);

    release_tx.send(()).unwrap();
    assert!(pool.await_termination(Duration::from_secs(5)));
    assert_eq!(finished.load(Ordering::SeqCst), 6);
    assert_eq!(pool.stats().rejected, 1);
}

#[test]
fn test_drain_runs_each_task_exactly_once() {
    let pool = Arc::new(fast_pool(4, 8));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let accepted = Arc::new(Mutex::new(Vec::new()));

    let producers: Vec<_> = (0..4)
        .map(|p| {
            let pool = Arc::clone(&pool);
            let seen = Arc::clone(&seen);
            let accepted = Arc::clone(&accepted);
            thread::spawn(move || {
                for i in 0..250 {
                    let id = p * 1000 + i;
                    let seen = Arc::clone(&seen);
                    let outcome = pool.submit(move || {
                        seen.lock().unwrap().push(id);
                    });
                    match outcome {
                        Ok(()) => accepted.lock().unwrap().push(id),
                        Err(SubmitError::ShuttingDown) => break,
                        Err(other) => panic!("unexpected error: {}", other),
                    }
                }
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(20));
    pool.shutdown();

    for producer in producers {
        producer.join().unwrap();
    }
    pool.join();

    let seen = seen.lock().unwrap();
    let accepted = accepted.lock().unwrap();

    let unique: HashSet<_> = seen.iter().copied().collect();
    assert_eq!(unique.len(), seen.len(), "a task ran twice");

    let expected: HashSet<_> = accepted.iter().copied().collect();
    assert_eq!(unique, expected, "accepted and executed tasks differ");
    assert_eq!(pool.stats().completed as usize, seen.len());
}

#[test]
fn test_blocked_producer_rejected_on_shutdown() {
    let pool = Arc::new(fast_pool(1, 1));
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let (started_tx, started_rx) = mpsc::channel::<()>();
    let late_ran = Arc::new(AtomicBool::new(false));

    pool.submit(move || {
        started_tx.send(()).unwrap();
        let _ = release_rx.recv();
    })
    .unwrap();
    started_rx.recv().unwrap();
    pool.submit(|| {}).unwrap();

    let producer = {
        let pool = Arc::clone(&pool);
        let late_ran = Arc::clone(&late_ran);
        thread::spawn(move || {
            pool.submit(move || late_ran.store(true, Ordering::SeqCst))
        })
    };

    thread::sleep(Duration::from_millis(100));
    pool.shutdown();

    assert_eq!(producer.join().unwrap(), Err(SubmitError::ShuttingDown));
    release_tx.send(()).unwrap();
    pool.join();

    assert!(!late_ran.load(Ordering::SeqCst));
    assert_eq!(pool.stats().completed, 2);
}

#[test]
fn test_panics_do_not_shrink_pool() {
    let pool = fast_pool(2, 16);
    let counter = Arc::new(AtomicUsize::new(0));

    for i in 0..20 {
        let counter = Arc::clone(&counter);
        pool.submit(move || {
            if i % 2 == 0 {
                panic!("task {} failed", i);
            }
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    thread::sleep(Duration::from_millis(200));
    assert_eq!(pool.live_workers(), 2);

    pool.join();
    let stats = pool.stats();
    assert_eq!(counter.load(Ordering::SeqCst), 10);
    assert_eq!(stats.panicked, 10);
    assert_eq!(stats.completed, 10);
}

#[test]
fn test_submitter_under_load() {
    let pool = Arc::new(fast_pool(4, 32));
    let limiter = TokenBucketLimiter::new(TokenBucketConfig::new(
        50,
        1,
        Duration::from_secs(60),
    ))
    .unwrap();
    let submitter = Arc::new(AdmissionControlledSubmitter::new(limiter, Arc::clone(&pool)));
    let executed = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let submitter = Arc::clone(&submitter);
            let executed = Arc::clone(&executed);
            thread::spawn(move || {
                let mut limited = 0;
                for _ in 0..25 {
                    let executed = Arc::clone(&executed);
                    match submitter.submit(move || {
                        executed.fetch_add(1, Ordering::SeqCst);
                    }) {
                        Ok(()) => {}
                        Err(SubmitError::RateLimited) => limited += 1,
                        Err(SubmitError::ShuttingDown) => panic!("pool closed early"),
                    }
                }
                limited
            })
        })
        .collect();

    let limited: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    pool.join();

    assert_eq!(executed.load(Ordering::SeqCst), 50);
    assert_eq!(limited, 150);

    let stats = submitter.stats();
    assert_eq!(stats.accepted, 50);
    assert_eq!(stats.rate_limited, 150);
    assert_eq!(stats.pool.completed, 50);
}

#[test]
fn test_keyed_limiter_per_ip() {
    let keyed: Arc<KeyedLimiter<IpAddr, SlidingWindowLimiter>> = Arc::new(
        KeyedLimiter::with_settings(
            || SlidingWindowLimiter::new(SlidingWindowConfig::per_minute(2)).unwrap(),
            KeyedConfig {
                max_keys: 2,
                inactive_after: Duration::from_secs(300),
                cleanup_interval: Duration::from_millis(50),
            },
        )
        .unwrap(),
    );

    let a: IpAddr = "10.0.0.1".parse().unwrap();
    let b: IpAddr = "10.0.0.2".parse().unwrap();
    let c: IpAddr = "10.0.0.3".parse().unwrap();

    assert!(keyed.try_acquire(&a));
    assert!(keyed.try_acquire(&a));
    assert!(!keyed.try_acquire(&a));
    assert!(keyed.try_acquire(&b));

    // Registry full and nobody idle: a new key is denied.
    assert!(!keyed.try_acquire(&c));

    let (handle, stop) = Arc::clone(&keyed).start_cleanup_thread().unwrap();
    thread::sleep(Duration::from_millis(120));
    stop.send(()).unwrap();
    handle.join().unwrap();

    let stats = keyed.stats();
    assert_eq!(stats.active_keys, 2);
    assert_eq!(stats.total_created, 2);
    assert!(stats.is_near_capacity());
}

#[test]
fn test_shared_limiter_across_submitters() {
    let limiter: Arc<dyn RateLimiter> =
        Arc::new(SlidingWindowLimiter::new(SlidingWindowConfig::per_minute(3)).unwrap());
    let pool = Arc::new(fast_pool(1, 4));

    let first = AdmissionControlledSubmitter::new(Arc::clone(&limiter), Arc::clone(&pool));
    let second = AdmissionControlledSubmitter::new(Arc::clone(&limiter), Arc::clone(&pool));

    assert!(first.submit(|| {}).is_ok());
    assert!(second.submit(|| {}).is_ok());
    assert!(first.submit(|| {}).is_ok());
    assert_eq!(second.submit(|| {}), Err(SubmitError::RateLimited));

    assert_eq!(limiter.metrics().total_acquired, 3);
    pool.join();
}
