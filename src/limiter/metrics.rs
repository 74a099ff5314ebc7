//! Admission metrics shared by every limiter strategy.
//!
//! ```text
//!     LimiterMetrics snapshot:
//!     ┌─────────────────────────────────────┐
//!     │  Success Rate: 85%                  │
//!     │  Available: 3/5                     │
//!     │  Consecutive Rejections: 0          │
//!     │  Health: Healthy                    │
//!     └─────────────────────────────────────┘
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Consecutive rejections above which a limiter counts as under sustained pressure.
const SUSTAINED_REJECTION_STREAK: u32 = 10;

/// Rejection ratio above which a limiter counts as under sustained pressure.
const SUSTAINED_REJECTION_RATIO: f64 = 0.3;

/// Point-in-time view of a limiter.
///
/// `available` and `capacity` are strategy specific: remaining tokens out of
/// the bucket size for a token bucket, free slots out of `max_requests` for a
/// sliding window.
///
/// # Example
///
/// ```rust
/// use gatekeep::{RateLimiter, TokenBucketConfig, TokenBucketLimiter};
///
/// let limiter = TokenBucketLimiter::new(TokenBucketConfig::per_second(2)).unwrap();
/// limiter.try_acquire();
/// limiter.try_acquire();
/// limiter.try_acquire();
///
/// let metrics = limiter.metrics();
/// assert_eq!(metrics.total_acquired, 2);
/// assert_eq!(metrics.total_rejected, 1);
/// assert!(metrics.is_under_pressure());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LimiterMetrics {
    /// Grants since creation or the last reset.
    pub total_acquired: u64,

    /// Denials since creation or the last reset.
    pub total_rejected: u64,

    /// Denials since the last grant.
    pub consecutive_rejections: u32,

    /// Admissions that could be granted right now.
    pub available: u64,

    /// Upper bound of `available`.
    pub capacity: u64,
}

impl LimiterMetrics {
    /// Fraction of attempts that were granted; 1.0 before any attempt.
    #[inline]
    pub fn success_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            1.0
        } else {
            self.total_acquired as f64 / total as f64
        }
    }

    /// Fraction of attempts that were denied.
    #[inline]
    pub fn rejection_rate(&self) -> f64 {
        1.0 - self.success_rate()
    }

    /// Grants plus denials.
    #[inline]
    pub fn total_requests(&self) -> u64 {
        self.total_acquired + self.total_rejected
    }

    /// Share of capacity currently spent (0.0 = idle, 1.0 = exhausted).
    #[inline]
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            1.0 - (self.available as f64 / self.capacity as f64)
        }
    }

    /// Less than half of attempts succeed, or nothing is available.
    #[inline]
    pub fn is_under_pressure(&self) -> bool {
        self.success_rate() < 0.5 || self.available == 0
    }

    /// A long rejection streak or a high overall rejection ratio.
    #[inline]
    pub fn is_under_sustained_pressure(&self) -> bool {
        self.consecutive_rejections > SUSTAINED_REJECTION_STREAK
            || self.rejection_rate() > SUSTAINED_REJECTION_RATIO
    }

    /// Three-level assessment derived from the pressure checks.
    pub fn health_status(&self) -> HealthStatus {
        if self.is_under_sustained_pressure() {
            HealthStatus::Critical
        } else if self.is_under_pressure() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    /// Multi-line report suitable for logs.
    pub fn summary(&self) -> String {
        format!(
            "Limiter Metrics:\n\
             ├─ Success Rate: {:.2}%\n\
             ├─ Available: {}/{}\n\
             ├─ Utilization: {:.2}%\n\
             ├─ Total Acquired: {}\n\
             ├─ Total Rejected: {}\n\
             ├─ Consecutive Rejections: {}\n\
             └─ Health: {:?}",
            self.success_rate() * 100.0,
            self.available,
            self.capacity,
            self.utilization() * 100.0,
            self.total_acquired,
            self.total_rejected,
            self.consecutive_rejections,
            self.health_status(),
        )
    }
}

impl fmt::Display for LimiterMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// Health indicator for a limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Admitting most traffic with capacity to spare.
    Healthy,

    /// Exhausted right now, or denying at least half of the attempts.
    Degraded,

    /// Denying persistently; the limit is well below demand.
    Critical,
}

impl HealthStatus {
    /// Anything other than `Healthy`.
    pub fn is_unhealthy(&self) -> bool {
        !matches!(self, Self::Healthy)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => f.write_str("healthy"),
            Self::Degraded => f.write_str("degraded"),
            Self::Critical => f.write_str("critical"),
        }
    }
}

/// Grant/deny counters embedded in each limiter.
///
/// Counters are plain atomics: they are updated inside the limiter's critical
/// section but read lock-free by `metrics()`.
#[derive(Debug, Default)]
pub(crate) struct AdmissionCounters {
    acquired: AtomicU64,
    rejected: AtomicU64,
    consecutive_rejections: AtomicU32,
}

impl AdmissionCounters {
    #[inline]
    pub(crate) fn on_acquisition(&self, n: u64) {
        self.acquired.fetch_add(n, Ordering::Relaxed);
        if self.consecutive_rejections.load(Ordering::Relaxed) > 0 {
            self.consecutive_rejections.store(0, Ordering::Relaxed);
        }
    }

    #[inline]
    pub(crate) fn on_rejection(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        self.consecutive_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, available: u64, capacity: u64) -> LimiterMetrics {
        LimiterMetrics {
            total_acquired: self.acquired.load(Ordering::Relaxed),
            total_rejected: self.rejected.load(Ordering::Relaxed),
            consecutive_rejections: self.consecutive_rejections.load(Ordering::Relaxed),
            available,
            capacity,
        }
    }

    pub(crate) fn reset(&self) {
        self.acquired.store(0, Ordering::Relaxed);
        self.rejected.store(0, Ordering::Relaxed);
        self.consecutive_rejections.store(0, Ordering::Relaxed);
    }
}
