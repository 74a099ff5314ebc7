//! Worker pool settings.

use crate::error::ConfigError;
use std::thread;
use std::time::Duration;

/// Default bounded wait of an idle worker before it re-checks pool state.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default number of queued tasks per worker when no capacity is given.
const QUEUE_SLOTS_PER_WORKER: usize = 64;

/// Configuration for a [`WorkerPool`](crate::WorkerPool).
///
/// # Example
///
/// ```rust
/// use gatekeep::PoolConfig;
/// use std::time::Duration;
///
/// let config = PoolConfig::new(2, 3).with_poll_interval(Duration::from_millis(100));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of worker threads, fixed for the pool's lifetime.
    pub workers: usize,

    /// Maximum queued (not yet running) tasks.
    pub queue_capacity: usize,

    /// How long an idle worker waits for a task before re-checking state.
    pub poll_interval: Duration,

    /// Worker threads are named `{prefix}-{index}`.
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    /// One worker per available CPU, 64 queue slots per worker, 1s poll.
    fn default() -> Self {
        let workers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        Self {
            workers,
            queue_capacity: workers * QUEUE_SLOTS_PER_WORKER,
            poll_interval: DEFAULT_POLL_INTERVAL,
            thread_name_prefix: "gatekeep-worker".to_string(),
        }
    }
}

impl PoolConfig {
    /// `workers` threads sharing a queue of `queue_capacity` slots.
    pub fn new(workers: usize, queue_capacity: usize) -> Self {
        Self {
            workers,
            queue_capacity,
            ..Default::default()
        }
    }

    /// Overrides the idle poll interval.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Overrides the worker thread name prefix.
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Checks that the pool can run at least one task.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::ZeroWorkers`]
    /// - [`ConfigError::ZeroQueueCapacity`]
    /// - [`ConfigError::ZeroPollInterval`]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }
}
