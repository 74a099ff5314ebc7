//! # Gatekeep - Bounded Worker Pool with Admission Control
//!
//! Run tasks on a fixed set of threads, push back on producers when the
//! queue is full, and turn away excess load before it reaches the queue.
//!
//! ## The Pieces
//!
//! ```text
//!     producer ──► AdmissionControlledSubmitter
//!                      │
//!                      ├─ RateLimiter ── SlidingWindowLimiter
//!                      │               └ TokenBucketLimiter
//!                      │
//!                      └─ WorkerPool
//!                           ├─ BoundedTaskQueue (capacity C, FIFO)
//!                           └─ W worker threads
//! ```
//!
//! - **Backpressure**: `submit` blocks while the queue holds `C` tasks.
//! - **Admission control**: a denied request fails at once with
//!   [`SubmitError::RateLimited`] and never touches the queue.
//! - **Graceful drain**: after `shutdown()` no new task is accepted, but
//!   every task already queued still runs exactly once.
//!
//! ## Quick Start
//!
//! ### A Pool on Its Own
//!
//! ```rust
//! use gatekeep::WorkerPool;
//!
//! let pool = WorkerPool::new(4, 64).unwrap();
//! for i in 0..10 {
//!     pool.submit(move || println!("task {}", i)).unwrap();
//! }
//! pool.join(); // shutdown + wait for the queue to drain
//! ```
//!
//! ### Rate-Limited Submission
//!
//! ```rust
//! use gatekeep::{
//!     AdmissionControlledSubmitter, SubmitError, TokenBucketConfig, TokenBucketLimiter,
//!     WorkerPoolBuilder,
//! };
//! use std::sync::Arc;
//!
//! let limiter = TokenBucketLimiter::new(TokenBucketConfig::per_second(100)).unwrap();
//! let pool = Arc::new(WorkerPoolBuilder::new().workers(2).queue_capacity(32).build().unwrap());
//! let submitter = AdmissionControlledSubmitter::new(limiter, Arc::clone(&pool));
//!
//! match submitter.submit(|| { /* handle request */ }) {
//!     Ok(()) => {}
//!     Err(SubmitError::RateLimited) => { /* 429 */ }
//!     Err(SubmitError::ShuttingDown) => { /* 503 */ }
//! }
//! pool.join();
//! ```
//!
//! ### Per-Key Limiting
//!
//! ```rust
//! use gatekeep::{KeyedLimiter, SlidingWindowConfig, SlidingWindowLimiter};
//!
//! let keyed = KeyedLimiter::new(|| {
//!     SlidingWindowLimiter::new(SlidingWindowConfig::per_second(5)).unwrap()
//! });
//! assert!(keyed.try_acquire(&"tenant-a"));
//! assert!(keyed.try_acquire(&"tenant-b"));
//! ```
//!
//! ## Limiter Semantics
//!
//! | Limiter | Grants | Time resolution |
//! |---------|--------|-----------------|
//! | `SlidingWindowLimiter` | `< max_requests` grants in the trailing window | whole seconds |
//! | `TokenBucketLimiter` | one token per grant, `refill_tokens` per whole interval | milliseconds |
//!
//! Both are driven by a [`Clock`]. [`SystemClock`] is monotonic; tests can
//! inject a [`ManualClock`].
//!
//! ## Logging
//!
//! The crate emits `tracing` events (pool lifecycle at `info`, panicking
//! tasks at `error`, refills and evictions at `debug`) and never installs a
//! subscriber of its own.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    missing_debug_implementations
)]
#![forbid(unsafe_code)]

mod error;
mod limiter;
mod pool;
mod submitter;

pub use error::{ConfigError, PoolError, SubmitError};
pub use limiter::{
    current_time_ms, Clock, HealthStatus, KeyedConfig, KeyedLimiter, KeyedStats, LimiterMetrics,
    ManualClock, RateLimiter, SlidingWindowConfig, SlidingWindowLimiter, SystemClock,
    TokenBucketConfig, TokenBucketLimiter,
};
pub use pool::{
    BoundedTaskQueue, Closed, Pop, PoolConfig, PoolState, PoolStats, Task, WorkerPool,
    DEFAULT_POLL_INTERVAL,
};
pub use submitter::{AdmissionControlledSubmitter, SubmitterStats};

/// A pool wrapped in `Arc`, ready to be shared between producers.
pub type SharedPool = std::sync::Arc<WorkerPool>;

/// A type-erased limiter usable by any submitter.
pub type SharedLimiter = std::sync::Arc<dyn RateLimiter>;

/// Version information for the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Minimum supported Rust version.
pub const MSRV: &str = "1.70.0";

/// Prelude module for convenient imports.
pub mod prelude {
    //! Common imports for pool and limiter users.
    //!
    //! # Example
    //! ```rust
    //! use gatekeep::prelude::*;
    //!
    //! let pool = WorkerPoolBuilder::new().workers(1).queue_capacity(1).build().unwrap();
    //! let limiter = SlidingWindowLimiter::new(SlidingWindowConfig::per_second(10)).unwrap();
    //! assert!(limiter.try_acquire());
    //! pool.join();
    //! ```

    pub use crate::{
        AdmissionControlledSubmitter, PoolConfig, PoolState, RateLimiter, SharedLimiter,
        SharedPool, SlidingWindowConfig, SlidingWindowLimiter, SubmitError, TokenBucketConfig,
        TokenBucketLimiter, WorkerPool, WorkerPoolBuilder,
    };
}

/// Fluent construction of a [`WorkerPool`].
///
/// Unset fields keep the [`PoolConfig::default`] values.
///
/// # Example
///
/// ```rust
/// use gatekeep::WorkerPoolBuilder;
/// use std::time::Duration;
///
/// let pool = WorkerPoolBuilder::new()
///     .workers(2)
///     .queue_capacity(3)
///     .poll_interval(Duration::from_millis(250))
///     .thread_name_prefix("ingest")
///     .build()
///     .unwrap();
///
/// assert_eq!(pool.workers(), 2);
/// pool.join();
///
/// // Invalid settings are reported, not panicked on.
/// assert!(WorkerPoolBuilder::new().workers(0).build().is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct WorkerPoolBuilder {
    config: PoolConfig,
}

impl WorkerPoolBuilder {
    /// Starts from [`PoolConfig::default`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of worker threads (must be > 0).
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// Maximum number of queued tasks before `submit` blocks (must be > 0).
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// How long an idle worker waits before re-checking the pool state.
    pub fn poll_interval(mut self, interval: std::time::Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Worker threads are named `{prefix}-{index}`.
    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    /// The configuration built so far.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Validates the configuration and starts the pool.
    ///
    /// # Errors
    ///
    /// See [`WorkerPool::with_config`].
    pub fn build(self) -> Result<WorkerPool, PoolError> {
        WorkerPool::with_config(self.config)
    }
}
