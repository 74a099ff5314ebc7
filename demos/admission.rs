//! Admission control walkthrough: a pool behind each kind of limiter.
//!
//! Run with `RUST_LOG=gatekeep=debug cargo run --example admission` to see
//! the library's own events.

use gatekeep::{
    AdmissionControlledSubmitter, KeyedConfig, KeyedLimiter, RateLimiter, SlidingWindowConfig,
    SlidingWindowLimiter, SubmitError, TokenBucketConfig, TokenBucketLimiter, WorkerPool,
    WorkerPoolBuilder,
};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gatekeep=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== Admission Control Example ===\n");

    let pool = Arc::new(
        WorkerPoolBuilder::new()
            .workers(2)
            .queue_capacity(3)
            .thread_name_prefix("demo-worker")
            .build()?,
    );

    sliding_window_example(&pool)?;
    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    token_bucket_example(&pool)?;
    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    keyed_example()?;
    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    shutdown_example(&pool);
    Ok(())
}

fn sliding_window_example(pool: &Arc<WorkerPool>) -> Result<(), Box<dyn std::error::Error>> {
    println!("1. Sliding window (3 requests per second):");

    let limiter = SlidingWindowLimiter::new(SlidingWindowConfig::per_second(3))?;
    let submitter = AdmissionControlledSubmitter::new(limiter, Arc::clone(pool));

    for i in 1..=4 {
        report(i, submitter.submit(move || simulate_work(i)));
    }

    thread::sleep(Duration::from_millis(1100));
    println!("   ... slept 1.1s");
    report(5, submitter.submit(|| simulate_work(5)));

    println!("   {}", submitter.limiter().metrics());
    Ok(())
}

fn token_bucket_example(pool: &Arc<WorkerPool>) -> Result<(), Box<dyn std::error::Error>> {
    println!("2. Token bucket (5 tokens, +5 every second):");

    let limiter = TokenBucketLimiter::new(TokenBucketConfig::new(
        5,
        5,
        Duration::from_millis(1000),
    ))?;
    let submitter = AdmissionControlledSubmitter::new(limiter, Arc::clone(pool));

    for i in 1..=6 {
        report(i, submitter.submit(move || simulate_work(i)));
    }

    thread::sleep(Duration::from_millis(1000));
    println!("   ... slept 1s");
    report(7, submitter.submit(|| simulate_work(7)));

    println!(
        "   Tokens left: {}",
        submitter.limiter().available_tokens()
    );
    Ok(())
}

fn keyed_example() -> Result<(), Box<dyn std::error::Error>> {
    println!("3. Per-client limits (2 requests per minute each):");

    let keyed = KeyedLimiter::<IpAddr, _>::with_settings(
        keyed_bucket,
        KeyedConfig {
            max_keys: 100,
            ..KeyedConfig::default()
        },
    )?;

    let alice: IpAddr = "192.168.1.10".parse()?;
    let bob: IpAddr = "192.168.1.20".parse()?;

    for (name, ip) in [("alice", alice), ("alice", alice), ("alice", alice), ("bob", bob)] {
        let verdict = if keyed.try_acquire(&ip) { "allowed" } else { "limited" };
        println!("   {} ({}) - {}", name, ip, verdict);
    }

    let stats = keyed.stats();
    println!(
        "   Tracking {} clients ({:.1}% of capacity)",
        stats.active_keys,
        stats.capacity_used() * 100.0
    );
    Ok(())
}

fn shutdown_example(pool: &Arc<WorkerPool>) {
    println!("4. Draining shutdown:");

    let finished = Arc::new(AtomicUsize::new(0));
    for _ in 0..3 {
        let finished = Arc::clone(&finished);
        let _ = pool.submit(move || {
            thread::sleep(Duration::from_millis(100));
            finished.fetch_add(1, Ordering::SeqCst);
        });
    }

    pool.shutdown();
    match pool.submit(|| {}) {
        Err(SubmitError::ShuttingDown) => println!("   Late submit refused"),
        other => println!("   Unexpected: {:?}", other),
    }

    if pool.await_termination(Duration::from_secs(5)) {
        println!(
            "   Pool terminated after finishing {} queued tasks",
            finished.load(Ordering::SeqCst)
        );
    }
    println!("\n{}", pool.stats());
}

fn keyed_bucket() -> TokenBucketLimiter {
    TokenBucketLimiter::new(TokenBucketConfig::per_minute(2)).expect("valid bucket settings")
}

fn report(request: usize, outcome: Result<(), SubmitError>) {
    match outcome {
        Ok(()) => println!("   Request {} - accepted", request),
        Err(err) => println!("   Request {} - {}", request, err),
    }
}

fn simulate_work(request: usize) {
    tracing::debug!("Handling request {}", request);
    thread::sleep(Duration::from_millis(20));
}
