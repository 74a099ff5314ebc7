//! # Admission Limiters
//!
//! ```text
//!     limiter/
//!     ├── mod.rs             (RateLimiter trait)
//!     ├── clock.rs           (monotonic and manual time sources)
//!     ├── config.rs          (settings and validation)
//!     ├── sliding_window.rs  (count grants in a trailing window)
//!     ├── token_bucket.rs    (spend tokens that refill per interval)
//!     ├── keyed.rs           (one limiter per caller key)
//!     └── metrics.rs         (grant/deny snapshots and health)
//! ```
//!
//! Every limiter guards its whole check-then-act sequence with a single
//! mutex, so concurrent callers always see a consistent count/time pair.

mod clock;
mod config;
mod keyed;
mod metrics;
mod sliding_window;
mod token_bucket;

use std::sync::Arc;

pub use clock::{current_time_ms, Clock, ManualClock, SystemClock};
pub use config::{SlidingWindowConfig, TokenBucketConfig};
pub use keyed::{KeyedConfig, KeyedLimiter, KeyedStats};
pub use metrics::{HealthStatus, LimiterMetrics};
pub use sliding_window::SlidingWindowLimiter;
pub use token_bucket::TokenBucketLimiter;

pub(crate) use metrics::AdmissionCounters;

/// A non-blocking admission decision.
///
/// `try_acquire` answers "may one more unit of work start now?" and never
/// waits, panics or errors. Implementations must be safe to call from any
/// number of threads at once.
///
/// # Example
///
/// ```rust
/// use gatekeep::{RateLimiter, SlidingWindowConfig, SlidingWindowLimiter};
///
/// fn admit(limiter: &dyn RateLimiter) -> &'static str {
///     if limiter.try_acquire() { "accepted" } else { "429" }
/// }
///
/// let limiter = SlidingWindowLimiter::new(SlidingWindowConfig::per_second(1)).unwrap();
/// assert_eq!(admit(&limiter), "accepted");
/// ```
pub trait RateLimiter: Send + Sync {
    /// Grants one admission if the limit allows it right now.
    fn try_acquire(&self) -> bool;

    /// Snapshot of grant/deny counters and current headroom.
    fn metrics(&self) -> LimiterMetrics;
}

impl<L: RateLimiter + ?Sized> RateLimiter for Arc<L> {
    #[inline]
    fn try_acquire(&self) -> bool {
        (**self).try_acquire()
    }

    fn metrics(&self) -> LimiterMetrics {
        (**self).metrics()
    }
}

impl<L: RateLimiter + ?Sized> RateLimiter for Box<L> {
    #[inline]
    fn try_acquire(&self) -> bool {
        (**self).try_acquire()
    }

    fn metrics(&self) -> LimiterMetrics {
        (**self).metrics()
    }
}

impl<L: RateLimiter + ?Sized> RateLimiter for &L {
    #[inline]
    fn try_acquire(&self) -> bool {
        (**self).try_acquire()
    }

    fn metrics(&self) -> LimiterMetrics {
        (**self).metrics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trait_objects() {
        let limiters: Vec<Box<dyn RateLimiter>> = vec![
            Box::new(TokenBucketLimiter::new(TokenBucketConfig::per_second(1)).unwrap()),
            Box::new(SlidingWindowLimiter::new(SlidingWindowConfig::per_second(1)).unwrap()),
        ];

        for limiter in &limiters {
            assert!(limiter.try_acquire());
            assert!(!limiter.try_acquire());
            assert_eq!(limiter.metrics().total_rejected, 1);
        }
    }

    #[test]
    fn test_shared_limiter() {
        let limiter = Arc::new(TokenBucketLimiter::new(TokenBucketConfig::per_second(2)).unwrap());
        let other = Arc::clone(&limiter);

        assert!(limiter.try_acquire());
        assert!(other.try_acquire());
        assert!(!RateLimiter::try_acquire(&limiter));
    }
}
