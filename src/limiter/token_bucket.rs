//! # Token Bucket Limiter
//!
//! A bucket of up to `capacity` tokens. Each admission spends one; every
//! whole `refill_interval` that passes puts `refill_tokens` back.
//!
//! ```text
//!     capacity 5, refill 5 per 1000ms
//!
//!     t=0ms      [●●●●●]  5 grants ──► [     ]
//!     t=400ms    [     ]  elapsed 400 < 1000, denied
//!     t=1400ms   [●●●●●]  1 interval elapsed: +5, clamp at 5
//!                         last_refill = 1400 (the extra 400ms is dropped)
//! ```
//!
//! ## Refill Drift
//!
//! A refill consumes the entire elapsed time, including the part past the
//! last whole interval. Under steady traffic the bucket therefore refills a
//! little slower than `refill_tokens / refill_interval`.

use super::{
    clock::{Clock, SystemClock},
    config::TokenBucketConfig,
    AdmissionCounters, LimiterMetrics, RateLimiter,
};
use crate::error::ConfigError;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Mutable bucket state, always read and written together.
#[derive(Debug)]
struct BucketState {
    available: u64,
    last_refill_ms: u64,
}

/// Token bucket limiter with a single critical section per call.
///
/// # Example
///
/// ```rust
/// use gatekeep::{TokenBucketConfig, TokenBucketLimiter};
/// use std::time::Duration;
///
/// let limiter = TokenBucketLimiter::new(
///     TokenBucketConfig::new(5, 5, Duration::from_millis(1000)),
/// ).unwrap();
///
/// for _ in 0..5 {
///     assert!(limiter.try_acquire());
/// }
/// assert!(!limiter.try_acquire());
/// ```
pub struct TokenBucketLimiter {
    state: Mutex<BucketState>,
    capacity: u64,
    refill_tokens: u64,
    refill_interval_ms: u64,
    clock: Arc<dyn Clock>,
    counters: AdmissionCounters,
}

impl TokenBucketLimiter {
    /// Creates a full bucket driven by the system clock.
    ///
    /// # Errors
    ///
    /// Returns the first problem reported by [`TokenBucketConfig::validate`].
    pub fn new(config: TokenBucketConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a full bucket reading time from `clock`.
    pub fn with_clock(
        config: TokenBucketConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let now_ms = clock.now_ms();
        Ok(Self {
            state: Mutex::new(BucketState {
                available: config.capacity,
                last_refill_ms: now_ms,
            }),
            capacity: config.capacity,
            refill_tokens: config.refill_tokens,
            refill_interval_ms: config.refill_interval_ms(),
            clock,
            counters: AdmissionCounters::default(),
        })
    }

    /// Refills if due, then spends one token if any is left.
    #[inline]
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_n(1)
    }

    /// Spends `n` tokens at once, or none if fewer than `n` are available.
    ///
    /// Acquiring 0 tokens always succeeds; more than `capacity` never does.
    ///
    /// ```rust
    /// use gatekeep::{TokenBucketConfig, TokenBucketLimiter};
    ///
    /// let limiter = TokenBucketLimiter::new(TokenBucketConfig::per_second(10)).unwrap();
    /// assert!(limiter.try_acquire_n(7));
    /// assert!(!limiter.try_acquire_n(4));
    /// assert!(limiter.try_acquire_n(3));
    /// ```
    pub fn try_acquire_n(&self, n: u64) -> bool {
        if n == 0 {
            return true;
        }
        if n > self.capacity {
            self.counters.on_rejection();
            return false;
        }

        let mut state = self.state.lock();
        let now_ms = self.clock.now_ms();
        self.refill(&mut state, now_ms);

        if state.available >= n {
            state.available -= n;
            self.counters.on_acquisition(n);
            true
        } else {
            self.counters.on_rejection();
            false
        }
    }

    /// Current token count after applying any due refill.
    pub fn available_tokens(&self) -> u64 {
        let mut state = self.state.lock();
        let now_ms = self.clock.now_ms();
        self.refill(&mut state, now_ms);
        state.available
    }

    /// Puts `n` tokens back, clamped at capacity.
    pub fn add_tokens(&self, n: u64) {
        let mut state = self.state.lock();
        state.available = state.available.saturating_add(n).min(self.capacity);
    }

    /// Refills to capacity, restarts the refill clock and zeroes the counters.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        let now_ms = self.clock.now_ms();
        state.available = self.capacity;
        state.last_refill_ms = now_ms;
        self.counters.reset();
    }

    /// Adds `floor(elapsed / interval) * refill_tokens` once at least one
    /// interval has passed, and restarts the interval at `now_ms`.
    fn refill(&self, state: &mut BucketState, now_ms: u64) {
        let elapsed = now_ms.saturating_sub(state.last_refill_ms);
        if elapsed < self.refill_interval_ms {
            return;
        }

        let periods = elapsed / self.refill_interval_ms;
        let tokens_to_add = periods.saturating_mul(self.refill_tokens);
        let before = state.available;

        state.available = before.saturating_add(tokens_to_add).min(self.capacity);
        state.last_refill_ms = now_ms;

        debug!(
            "Refilled {} tokens (periods: {}, available: {})",
            state.available - before,
            periods,
            state.available
        );
    }
}

impl RateLimiter for TokenBucketLimiter {
    #[inline]
    fn try_acquire(&self) -> bool {
        TokenBucketLimiter::try_acquire(self)
    }

    fn metrics(&self) -> LimiterMetrics {
        self.counters
            .snapshot(self.available_tokens(), self.capacity)
    }
}

impl fmt::Debug for TokenBucketLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenBucketLimiter")
            .field("capacity", &self.capacity)
            .field("refill_tokens", &self.refill_tokens)
            .field("refill_interval_ms", &self.refill_interval_ms)
            .field("available", &self.state.lock().available)
            .finish()
    }
}
