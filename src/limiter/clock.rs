//! # Time Sources (clock.rs)
//!
//! Limiters never read the wall clock directly. They ask a [`Clock`], which
//! lets production code use a monotonic system clock and tests drive time by
//! hand.
//!
//! ```text
//!     SystemClock:
//!
//!     process start ──► capture (Instant, epoch_ms) once
//!          │
//!          ▼
//!     now() = epoch_ms + Instant::elapsed()
//!
//!     Wall-clock adjustments after start never move `now()` backwards.
//!
//!     ManualClock:
//!
//!     now() = whatever the test last set ──► advance(d) / set(t)
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

// Wall-clock epoch milliseconds captured at first use, advanced afterwards
// with a monotonic Instant.
static START_TIME_BASE: OnceLock<(Instant, u64)> = OnceLock::new();

/// A monotonic time source measured from the UNIX epoch.
///
/// Implementations must never go backwards between two calls.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current time in milliseconds.
    fn now_ms(&self) -> u64;

    /// Returns the current time truncated to whole seconds.
    #[inline]
    fn now_secs(&self) -> u64 {
        self.now_ms() / 1000
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    #[inline]
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// The default clock: wall-clock anchored, monotonically advancing.
///
/// # Example
///
/// ```rust
/// use gatekeep::{Clock, SystemClock};
///
/// let clock = SystemClock;
/// let a = clock.now_ms();
/// let b = clock.now_ms();
/// assert!(b >= a);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now_ms(&self) -> u64 {
        current_time_ms()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying time, so a test can hand one clone to a
/// limiter and keep another to advance it.
///
/// # Example
///
/// ```rust
/// use gatekeep::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new(10_000);
/// let handle = clock.clone();
///
/// handle.advance(Duration::from_millis(1500));
/// assert_eq!(clock.now_ms(), 11_500);
/// assert_eq!(clock.now_secs(), 11);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a manual clock starting at `start_ms`.
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.now_ms
            .fetch_add(by.as_millis() as u64, Ordering::AcqRel);
    }

    /// Jumps to `now_ms`. Moving backwards is ignored so the clock stays monotonic.
    pub fn set(&self, now_ms: u64) {
        self.now_ms.fetch_max(now_ms, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::Acquire)
    }
}

/// Returns the current time in milliseconds since UNIX epoch, read from a
/// monotonic source.
///
/// # Example
///
/// ```rust
/// use gatekeep::current_time_ms;
///
/// let now = current_time_ms();
/// assert!(now > 0);
/// ```
#[inline]
pub fn current_time_ms() -> u64 {
    let (start, base_ms) = START_TIME_BASE.get_or_init(|| {
        let epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        (Instant::now(), epoch_ms)
    });
    base_ms.saturating_add(start.elapsed().as_millis() as u64)
}
