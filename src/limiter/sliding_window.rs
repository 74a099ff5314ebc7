//! # Sliding Window Limiter
//!
//! Counts grants inside a trailing window and denies once the count reaches
//! the cap.
//!
//! ```text
//!     window = 3s, max_requests = 3, now = 10
//!
//!     cutoff = now - window = 7   (entries t <= 7 are evicted)
//!
//!       6     7     8     9     10
//!       x     x     ●     ●     ?      ● retained  x evicted
//!                   └─── 2 of 3 ──┘    → grant, append 10
//! ```
//!
//! Timestamps are whole seconds: every call inside the same second records
//! the same value, and the effective window is `(now - window, now]`.

use super::{
    clock::{Clock, SystemClock},
    config::SlidingWindowConfig,
    AdmissionCounters, LimiterMetrics, RateLimiter,
};
use crate::error::ConfigError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Sliding-window log limiter.
///
/// # Example
///
/// ```rust
/// use gatekeep::{SlidingWindowConfig, SlidingWindowLimiter};
///
/// let limiter = SlidingWindowLimiter::new(SlidingWindowConfig::per_second(3)).unwrap();
/// assert!(limiter.try_acquire());
/// assert!(limiter.try_acquire());
/// assert!(limiter.try_acquire());
/// assert_eq!(limiter.remaining(), 0);
/// ```
pub struct SlidingWindowLimiter {
    /// Admission timestamps in whole seconds, oldest first.
    timestamps: Mutex<VecDeque<u64>>,
    window_secs: u64,
    max_requests: usize,
    clock: Arc<dyn Clock>,
    counters: AdmissionCounters,
}

impl SlidingWindowLimiter {
    /// Creates a limiter driven by the system clock.
    ///
    /// # Errors
    ///
    /// Returns the first problem reported by [`SlidingWindowConfig::validate`].
    pub fn new(config: SlidingWindowConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a limiter reading time from `clock`.
    pub fn with_clock(
        config: SlidingWindowConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            timestamps: Mutex::new(VecDeque::with_capacity(config.max_requests)),
            window_secs: config.window_secs(),
            max_requests: config.max_requests,
            clock,
            counters: AdmissionCounters::default(),
        })
    }

    /// Grants one admission if fewer than `max_requests` grants fall inside
    /// the trailing window.
    ///
    /// Reading the clock, eviction, the count check and the append all happen
    /// under one lock, so the log stays oldest-first.
    pub fn try_acquire(&self) -> bool {
        let mut timestamps = self.timestamps.lock();
        let now = self.clock.now_secs();

        let evicted = Self::evict_expired(&mut timestamps, now, self.window_secs);
        if evicted > 0 {
            debug!("Sliding window evicted {} expired entries", evicted);
        }

        if timestamps.len() < self.max_requests {
            timestamps.push_back(now);
            self.counters.on_acquisition(1);
            true
        } else {
            self.counters.on_rejection();
            false
        }
    }

    /// Number of grants still available in the current window.
    pub fn remaining(&self) -> usize {
        let mut timestamps = self.timestamps.lock();
        let now = self.clock.now_secs();
        Self::evict_expired(&mut timestamps, now, self.window_secs);
        self.max_requests - timestamps.len()
    }

    /// Forgets every recorded grant and zeroes the counters.
    pub fn reset(&self) {
        self.timestamps.lock().clear();
        self.counters.reset();
    }

    /// Drops entries with `t <= now - window` from the head.
    fn evict_expired(timestamps: &mut VecDeque<u64>, now: u64, window_secs: u64) -> usize {
        let Some(cutoff) = now.checked_sub(window_secs) else {
            return 0;
        };

        let mut evicted = 0;
        while timestamps.front().is_some_and(|&t| t <= cutoff) {
            timestamps.pop_front();
            evicted += 1;
        }
        evicted
    }
}

impl RateLimiter for SlidingWindowLimiter {
    #[inline]
    fn try_acquire(&self) -> bool {
        SlidingWindowLimiter::try_acquire(self)
    }

    fn metrics(&self) -> LimiterMetrics {
        self.counters
            .snapshot(self.remaining() as u64, self.max_requests as u64)
    }
}

impl fmt::Debug for SlidingWindowLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlidingWindowLimiter")
            .field("window_secs", &self.window_secs)
            .field("max_requests", &self.max_requests)
            .field("in_window", &self.timestamps.lock().len())
            .finish()
    }
}
