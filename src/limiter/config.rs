//! # Limiter Configuration
//!
//! Settings for the two admission strategies. Each config is a plain struct
//! with a `Default`, a couple of convenience constructors and a `validate()`
//! that every limiter constructor calls before building anything.
//!
//! ```text
//!     Token bucket:                     Sliding window:
//!     ┌──────────────────────────┐      ┌──────────────────────────────┐
//!     │ capacity: 5              │      │ window: 1s                   │
//!     │ refill_tokens: 5         │      │ max_requests: 3              │
//!     │ refill_interval: 1000ms  │      │                              │
//!     │                          │      │ ──────[ t  t  t ]──► now     │
//!     │ burst 5, then 5 / second │      │ at most 3 grants per window  │
//!     └──────────────────────────┘      └──────────────────────────────┘
//! ```

use crate::error::ConfigError;
use std::time::Duration;

/// Configuration for a [`TokenBucketLimiter`](crate::TokenBucketLimiter).
///
/// # Example
///
/// ```rust
/// use gatekeep::TokenBucketConfig;
/// use std::time::Duration;
///
/// // Burst of 100, 20 tokens back every 500ms.
/// let config = TokenBucketConfig::new(100, 20, Duration::from_millis(500));
/// assert!(config.validate().is_ok());
/// assert_eq!(config.effective_rate_per_second(), 40.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBucketConfig {
    /// Maximum number of tokens the bucket holds (burst size).
    pub capacity: u64,

    /// Tokens added for every whole refill interval that has elapsed.
    pub refill_tokens: u64,

    /// Length of one refill interval.
    pub refill_interval: Duration,
}

impl Default for TokenBucketConfig {
    /// 50 tokens, 10 more every second.
    fn default() -> Self {
        Self {
            capacity: 50,
            refill_tokens: 10,
            refill_interval: Duration::from_secs(1),
        }
    }
}

impl TokenBucketConfig {
    /// Creates a configuration from its three parameters.
    pub fn new(capacity: u64, refill_tokens: u64, refill_interval: Duration) -> Self {
        Self {
            capacity,
            refill_tokens,
            refill_interval,
        }
    }

    /// A bucket admitting `requests_per_second` with an equal burst.
    pub fn per_second(requests_per_second: u64) -> Self {
        Self::new(
            requests_per_second,
            requests_per_second,
            Duration::from_secs(1),
        )
    }

    /// A bucket admitting `requests_per_minute`, refilled once per minute.
    pub fn per_minute(requests_per_minute: u64) -> Self {
        Self::new(
            requests_per_minute,
            requests_per_minute,
            Duration::from_secs(60),
        )
    }

    /// Sets the burst capacity as a multiple of the refill amount.
    ///
    /// ```rust
    /// use gatekeep::TokenBucketConfig;
    ///
    /// let config = TokenBucketConfig::per_second(10).with_burst_multiplier(5);
    /// assert_eq!(config.capacity, 50);
    /// ```
    pub fn with_burst_multiplier(mut self, multiplier: u64) -> Self {
        self.capacity = self.refill_tokens.saturating_mul(multiplier);
        self
    }

    /// Checks that the bucket can admit and refill.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::ZeroCapacity`] if `capacity` is 0
    /// - [`ConfigError::ZeroRefillTokens`] if `refill_tokens` is 0
    /// - [`ConfigError::ZeroRefillInterval`] if the interval is under 1ms
    /// - [`ConfigError::FractionalRefillInterval`] if the interval is not a
    ///   whole number of milliseconds
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.refill_tokens == 0 {
            return Err(ConfigError::ZeroRefillTokens);
        }
        if self.refill_interval_ms() == 0 {
            return Err(ConfigError::ZeroRefillInterval);
        }
        if self.refill_interval.subsec_nanos() % 1_000_000 != 0 {
            return Err(ConfigError::FractionalRefillInterval);
        }
        Ok(())
    }

    /// Sustained admission rate implied by the refill settings.
    pub fn effective_rate_per_second(&self) -> f64 {
        let interval_ms = self.refill_interval_ms();
        if interval_ms == 0 {
            0.0
        } else {
            (self.refill_tokens as f64 * 1000.0) / interval_ms as f64
        }
    }

    #[inline]
    pub(crate) fn refill_interval_ms(&self) -> u64 {
        self.refill_interval.as_millis() as u64
    }
}

/// Configuration for a [`SlidingWindowLimiter`](crate::SlidingWindowLimiter).
///
/// The window is tracked in whole seconds; any sub-second remainder of
/// `window` is ignored.
///
/// # Example
///
/// ```rust
/// use gatekeep::SlidingWindowConfig;
/// use std::time::Duration;
///
/// let config = SlidingWindowConfig::new(Duration::from_secs(10), 100);
/// assert!(config.validate().is_ok());
///
/// let too_short = SlidingWindowConfig::new(Duration::from_millis(500), 1);
/// assert!(too_short.validate().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlidingWindowConfig {
    /// Length of the trailing window.
    pub window: Duration,

    /// Maximum grants inside any window.
    pub max_requests: usize,
}

impl Default for SlidingWindowConfig {
    /// 10 requests per second.
    fn default() -> Self {
        Self {
            window: Duration::from_secs(1),
            max_requests: 10,
        }
    }
}

impl SlidingWindowConfig {
    /// Creates a configuration from a window length and a request cap.
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            window,
            max_requests,
        }
    }

    /// At most `max_requests` in any trailing second.
    pub fn per_second(max_requests: usize) -> Self {
        Self::new(Duration::from_secs(1), max_requests)
    }

    /// At most `max_requests` in any trailing minute.
    pub fn per_minute(max_requests: usize) -> Self {
        Self::new(Duration::from_secs(60), max_requests)
    }

    /// Checks the window and cap.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::WindowTooShort`] if the window is under one second
    /// - [`ConfigError::ZeroMaxRequests`] if `max_requests` is 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_secs() == 0 {
            return Err(ConfigError::WindowTooShort);
        }
        if self.max_requests == 0 {
            return Err(ConfigError::ZeroMaxRequests);
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn window_secs(&self) -> u64 {
        self.window.as_secs()
    }
}
