//! # Admission-Controlled Submission
//!
//! Puts a [`RateLimiter`] in front of a [`WorkerPool`]:
//!
//! ```text
//!     submit(task)
//!        │
//!        ├─ limiter.try_acquire() == false ──► Err(RateLimited)   (never blocks)
//!        │
//!        └─ pool.submit(task)
//!              ├─ queue full  ──► waits for a slot
//!              ├─ shut down   ──► Err(ShuttingDown)
//!              └─ queued      ──► Ok(())
//! ```
//!
//! A rejected request never consumes a queue slot; a granted one may still
//! wait for capacity.

use crate::error::SubmitError;
use crate::limiter::RateLimiter;
use crate::pool::{PoolStats, WorkerPool};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Rate-limited front door to a worker pool.
///
/// The limiter is any [`RateLimiter`]: a concrete limiter, a boxed trait
/// object, or an `Arc` shared with other submitters.
///
/// # Example
///
/// ```rust
/// use gatekeep::{
///     AdmissionControlledSubmitter, SlidingWindowConfig, SlidingWindowLimiter, SubmitError,
///     WorkerPool,
/// };
/// use std::sync::Arc;
///
/// let limiter = SlidingWindowLimiter::new(SlidingWindowConfig::per_second(2)).unwrap();
/// let pool = Arc::new(WorkerPool::new(1, 4).unwrap());
/// let submitter = AdmissionControlledSubmitter::new(limiter, Arc::clone(&pool));
///
/// assert!(submitter.submit(|| {}).is_ok());
/// assert!(submitter.submit(|| {}).is_ok());
/// // Unless the clock ticked over a second boundary, the third is refused.
/// let third = submitter.submit(|| {});
/// assert!(third.is_ok() || third == Err(SubmitError::RateLimited));
///
/// pool.join();
/// ```
pub struct AdmissionControlledSubmitter<L> {
    limiter: L,
    pool: Arc<WorkerPool>,
    accepted: AtomicU64,
    rate_limited: AtomicU64,
    shut_out: AtomicU64,
}

impl<L: RateLimiter> AdmissionControlledSubmitter<L> {
    /// Wraps `pool` with `limiter`.
    pub fn new(limiter: L, pool: Arc<WorkerPool>) -> Self {
        Self {
            limiter,
            pool,
            accepted: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
            shut_out: AtomicU64::new(0),
        }
    }

    /// Admits `task` through the limiter, then queues it on the pool.
    ///
    /// # Errors
    ///
    /// - [`SubmitError::RateLimited`] right away if the limiter denies. The
    ///   pool is not touched.
    /// - [`SubmitError::ShuttingDown`] if the pool refuses the task.
    ///
    /// A task refused by the pool has still consumed a limiter grant.
    pub fn submit<F>(&self, task: F) -> Result<(), SubmitError>
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.limiter.try_acquire() {
            self.rate_limited.fetch_add(1, Ordering::Relaxed);
            debug!("Submission rate limited");
            return Err(SubmitError::RateLimited);
        }

        match self.pool.submit(task) {
            Ok(()) => {
                self.accepted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(err) => {
                self.shut_out.fetch_add(1, Ordering::Relaxed);
                Err(err)
            }
        }
    }

    /// The admission limiter.
    pub fn limiter(&self) -> &L {
        &self.limiter
    }

    /// The pool tasks are queued on.
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Starts shutdown of the underlying pool.
    ///
    /// Other holders of the pool see the same shutdown.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }

    /// Submission outcomes so far, with the pool's own snapshot.
    pub fn stats(&self) -> SubmitterStats {
        SubmitterStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            shut_out: self.shut_out.load(Ordering::Relaxed),
            pool: self.pool.stats(),
        }
    }
}

impl<L> fmt::Debug for AdmissionControlledSubmitter<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionControlledSubmitter")
            .field("accepted", &self.accepted.load(Ordering::Relaxed))
            .field("rate_limited", &self.rate_limited.load(Ordering::Relaxed))
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

/// Counters of one [`AdmissionControlledSubmitter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitterStats {
    /// Tasks that passed the limiter and were queued.
    pub accepted: u64,

    /// Tasks denied by the limiter.
    pub rate_limited: u64,

    /// Tasks granted by the limiter but refused by a shutting-down pool.
    pub shut_out: u64,

    /// Snapshot of the underlying pool.
    pub pool: PoolStats,
}

impl SubmitterStats {
    /// Every call to `submit`, whatever its outcome.
    pub fn attempts(&self) -> u64 {
        self.accepted + self.rate_limited + self.shut_out
    }

    /// Fraction of attempts refused by the limiter.
    pub fn rate_limited_ratio(&self) -> f64 {
        match self.attempts() {
            0 => 0.0,
            total => self.rate_limited as f64 / total as f64,
        }
    }
}
