//! # Error Types
//!
//! Every fallible operation in the crate reports one of three error enums:
//!
//! ```text
//!     ConfigError  ◄── a constructor was given impossible settings
//!     PoolError    ◄── the worker pool could not be started
//!     SubmitError  ◄── a task was refused at admission time
//! ```
//!
//! `try_acquire()` on a limiter never errors: a denial is a normal `false`.

use std::io;
use thiserror::Error;

/// Invalid construction parameters for a pool or a limiter.
///
/// Construction fails fast: no limiter or pool is ever built from a
/// configuration that did not pass `validate()`.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// The pool needs at least one worker thread.
    #[error("worker count must be greater than 0")]
    ZeroWorkers,

    /// The task queue needs room for at least one task.
    #[error("queue capacity must be greater than 0")]
    ZeroQueueCapacity,

    /// Workers must wake up periodically to observe shutdown.
    #[error("worker poll interval must be greater than 0")]
    ZeroPollInterval,

    /// A token bucket with no capacity can never admit anything.
    #[error("token bucket capacity must be greater than 0")]
    ZeroCapacity,

    /// A token bucket that never refills stops admitting after one burst.
    #[error("refill token count must be greater than 0")]
    ZeroRefillTokens,

    /// The refill interval is used as a divisor.
    #[error("refill interval must be greater than 0")]
    ZeroRefillInterval,

    /// Refills are timed in whole milliseconds.
    #[error("refill interval must be a whole number of milliseconds")]
    FractionalRefillInterval,

    /// Sliding windows count in whole seconds.
    #[error("sliding window must span at least one second")]
    WindowTooShort,

    /// A window that admits nothing is a misconfiguration.
    #[error("max requests per window must be greater than 0")]
    ZeroMaxRequests,

    /// The keyed registry must be able to track at least one key.
    #[error("max tracked keys must be greater than 0")]
    ZeroMaxKeys,
}

/// Failure to bring a worker pool up.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool configuration was rejected.
    #[error("invalid pool configuration: {0}")]
    Config(#[from] ConfigError),

    /// The OS refused to start a worker thread.
    #[error("failed to spawn worker thread `{name}`: {source}")]
    Spawn {
        /// Name of the worker that failed to start.
        name: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
}

/// Reasons a task was not accepted.
///
/// Both variants are reported synchronously; a rejected task is dropped
/// without ever being queued.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum SubmitError {
    /// The pool is draining or terminated.
    #[error("pool shutting down")]
    ShuttingDown,

    /// The admission limiter denied the request.
    #[error("rate limited")]
    RateLimited,
}
