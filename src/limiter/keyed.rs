//! # Keyed Limiter Registry
//!
//! Applies a separate limit to each caller: a client id, an IP address, a
//! tenant. Limiters are created on first use from a factory and dropped once
//! the key goes quiet.
//!
//! ```text
//!     try_acquire("tenant-a") ──┐
//!     try_acquire("tenant-b") ──┼──► KeyedLimiter ──► per-key limiters
//!     try_acquire("tenant-a") ──┘         │
//!                                   ┌─────▼────────────┐
//!                                   │ DashMap          │
//!                                   │  tenant-a → L    │
//!                                   │  tenant-b → L    │
//!                                   └──────────────────┘
//! ```
//!
//! The number of tracked keys is bounded. When the bound is hit, idle keys
//! are evicted first; if none are idle the new key is denied.

use super::{
    clock::{Clock, SystemClock},
    RateLimiter,
};
use crate::error::ConfigError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Settings for a [`KeyedLimiter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyedConfig {
    /// Maximum keys tracked at once.
    pub max_keys: usize,

    /// A key unused for this long may be evicted.
    pub inactive_after: Duration,

    /// Period of the background cleanup thread.
    pub cleanup_interval: Duration,
}

impl Default for KeyedConfig {
    /// 10,000 keys, evicted after 5 idle minutes, swept every minute.
    fn default() -> Self {
        Self {
            max_keys: 10_000,
            inactive_after: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

impl KeyedConfig {
    /// Checks that at least one key can be tracked and that sweeping is periodic.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_keys == 0 {
            return Err(ConfigError::ZeroMaxKeys);
        }
        if self.cleanup_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }
}

/// A limiter plus the last time its key was seen.
struct Tracked<L> {
    limiter: Arc<L>,
    last_access_ms: AtomicU64,
}

type Factory<L> = Arc<dyn Fn() -> L + Send + Sync>;

/// Registry of per-key limiters.
///
/// # Example
///
/// ```rust
/// use gatekeep::{KeyedLimiter, TokenBucketConfig, TokenBucketLimiter};
///
/// let limits = KeyedLimiter::new(|| {
///     TokenBucketLimiter::new(TokenBucketConfig::per_second(1))
///         .expect("valid bucket settings")
/// });
///
/// assert!(limits.try_acquire(&"alice"));
/// assert!(!limits.try_acquire(&"alice"));
/// assert!(limits.try_acquire(&"bob"));
/// ```
pub struct KeyedLimiter<K, L>
where
    K: Eq + Hash,
{
    limiters: DashMap<K, Tracked<L>, ahash::RandomState>,
    factory: Factory<L>,
    config: KeyedConfig,
    clock: Arc<dyn Clock>,
    /// Slots handed out against `max_keys`; reserved before an insert so
    /// concurrent new keys cannot overshoot the bound.
    reserved: AtomicUsize,
    total_created: AtomicU64,
    total_evicted: AtomicU64,
    eviction_in_progress: AtomicBool,
}

impl<K, L> KeyedLimiter<K, L>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    L: RateLimiter + 'static,
{
    /// Creates a registry with [`KeyedConfig::default`] settings.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> L + Send + Sync + 'static,
    {
        Self::build(Arc::new(factory), KeyedConfig::default(), Arc::new(SystemClock))
    }

    /// Creates a registry with custom bounds.
    ///
    /// # Errors
    ///
    /// Returns the problem reported by [`KeyedConfig::validate`].
    pub fn with_settings<F>(factory: F, config: KeyedConfig) -> Result<Self, ConfigError>
    where
        F: Fn() -> L + Send + Sync + 'static,
    {
        Self::with_clock(factory, config, Arc::new(SystemClock))
    }

    /// Creates a registry that measures idleness with `clock`.
    pub fn with_clock<F>(
        factory: F,
        config: KeyedConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError>
    where
        F: Fn() -> L + Send + Sync + 'static,
    {
        config.validate()?;
        Ok(Self::build(Arc::new(factory), config, clock))
    }

    fn build(factory: Factory<L>, config: KeyedConfig, clock: Arc<dyn Clock>) -> Self {
        let num_shards = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(8)
            .next_power_of_two()
            .clamp(4, 64);

        Self {
            limiters: DashMap::with_capacity_and_hasher_and_shard_amount(
                config.max_keys.min(1024),
                ahash::RandomState::new(),
                num_shards,
            ),
            factory,
            config,
            clock,
            reserved: AtomicUsize::new(0),
            total_created: AtomicU64::new(0),
            total_evicted: AtomicU64::new(0),
            eviction_in_progress: AtomicBool::new(false),
        }
    }

    /// Returns the limiter for `key`, creating it if there is room.
    ///
    /// Returns `None` when `max_keys` keys are tracked and none is idle.
    pub fn get_limiter(&self, key: &K) -> Option<Arc<L>> {
        let now_ms = self.clock.now_ms();

        if let Some(tracked) = self.limiters.get(key) {
            tracked.last_access_ms.store(now_ms, Ordering::Relaxed);
            return Some(Arc::clone(&tracked.limiter));
        }

        if !self.reserve_slot() {
            self.evict_idle(now_ms);
            if !self.reserve_slot() {
                warn!("Keyed limiter capacity reached, rejecting key {:?}", key);
                return None;
            }
        }

        match self.limiters.entry(key.clone()) {
            Entry::Occupied(occupied) => {
                // Another caller inserted this key first; give the slot back.
                self.release_slots(1);
                let tracked = occupied.get();
                tracked.last_access_ms.store(now_ms, Ordering::Relaxed);
                Some(Arc::clone(&tracked.limiter))
            }
            Entry::Vacant(vacant) => {
                let limiter = Arc::new((self.factory)());
                vacant.insert(Tracked {
                    limiter: Arc::clone(&limiter),
                    last_access_ms: AtomicU64::new(now_ms),
                });
                let created = self.total_created.fetch_add(1, Ordering::Relaxed) + 1;
                debug!("Created limiter for key {:?} (created so far: {})", key, created);
                Some(limiter)
            }
        }
    }

    /// Claims one of the `max_keys` slots, failing when all are taken.
    fn reserve_slot(&self) -> bool {
        self.reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.config.max_keys).then_some(n + 1)
            })
            .is_ok()
    }

    fn release_slots(&self, n: usize) {
        self.reserved.fetch_sub(n, Ordering::AcqRel);
    }

    /// Checks the limit for `key`. Denies when the key cannot be tracked.
    #[inline]
    pub fn try_acquire(&self, key: &K) -> bool {
        match self.get_limiter(key) {
            Some(limiter) => limiter.try_acquire(),
            None => false,
        }
    }

    /// Removes every key idle for at least `inactive_after`.
    ///
    /// Returns how many keys were removed.
    pub fn cleanup(&self) -> usize {
        let now_ms = self.clock.now_ms();
        let removed = self.remove_idle(now_ms);
        if removed > 0 {
            debug!("Cleanup removed {} inactive limiters", removed);
        }
        removed
    }

    /// Capacity-triggered eviction; only one caller sweeps at a time.
    fn evict_idle(&self, now_ms: u64) {
        if self
            .eviction_in_progress
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        let _guard = EvictionGuard {
            flag: &self.eviction_in_progress,
        };

        let removed = self.remove_idle(now_ms);
        info!(
            "Capacity eviction removed {} idle limiters ({} remain)",
            removed,
            self.limiters.len()
        );
    }

    fn remove_idle(&self, now_ms: u64) -> usize {
        let threshold_ms = self.config.inactive_after.as_millis() as u64;
        let mut removed = 0;

        self.limiters.retain(|key, tracked| {
            let idle_ms = now_ms.saturating_sub(tracked.last_access_ms.load(Ordering::Relaxed));
            if idle_ms >= threshold_ms {
                debug!("Removing inactive limiter for key {:?}", key);
                removed += 1;
                false
            } else {
                true
            }
        });

        self.release_slots(removed);
        self.total_evicted
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Number of keys currently tracked.
    #[inline]
    pub fn active_keys(&self) -> usize {
        self.limiters.len()
    }

    /// Lifetime counters and current occupancy.
    pub fn stats(&self) -> KeyedStats {
        let active_keys = self.active_keys();
        KeyedStats {
            active_keys,
            max_keys: self.config.max_keys,
            total_created: self.total_created.load(Ordering::Relaxed),
            total_evicted: self.total_evicted.load(Ordering::Relaxed),
        }
    }

    /// Drops every tracked key.
    pub fn clear(&self) {
        let mut count = 0;
        self.limiters.retain(|_, _| {
            count += 1;
            false
        });
        self.release_slots(count);
        self.total_evicted.fetch_add(count as u64, Ordering::Relaxed);
        info!("Cleared all {} keyed limiters", count);
    }

    /// Starts a thread that calls [`cleanup`](Self::cleanup) every
    /// `cleanup_interval` until a value is sent on (or the sender drops from)
    /// the returned channel.
    ///
    /// ```rust
    /// use gatekeep::{KeyedLimiter, SlidingWindowConfig, SlidingWindowLimiter};
    /// use std::sync::Arc;
    ///
    /// let limits = Arc::new(KeyedLimiter::<u32, _>::new(|| {
    ///     SlidingWindowLimiter::new(SlidingWindowConfig::per_second(5)).expect("valid window")
    /// }));
    /// let (handle, stop) = Arc::clone(&limits).start_cleanup_thread().unwrap();
    ///
    /// stop.send(()).unwrap();
    /// handle.join().unwrap();
    /// ```
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn start_cleanup_thread(
        self: Arc<Self>,
    ) -> std::io::Result<(thread::JoinHandle<()>, mpsc::Sender<()>)> {
        let (stop_tx, stop_rx) = mpsc::channel();
        let interval = self.config.cleanup_interval;

        let handle = thread::Builder::new()
            .name("gatekeep-keyed-cleanup".to_string())
            .spawn(move || {
                info!("Started keyed cleanup thread (interval: {:?})", interval);

                loop {
                    match stop_rx.recv_timeout(interval) {
                        Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                            info!("Keyed cleanup thread stopping");
                            break;
                        }
                        Err(mpsc::RecvTimeoutError::Timeout) => {
                            self.cleanup();

                            let stats = self.stats();
                            if stats.is_near_capacity() {
                                warn!(
                                    "High key usage: {} tracked limiters ({:.0}% of capacity)",
                                    stats.active_keys,
                                    stats.capacity_used() * 100.0
                                );
                            }
                        }
                    }
                }
            })?;

        Ok((handle, stop_tx))
    }
}

impl<K, L> fmt::Debug for KeyedLimiter<K, L>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedLimiter")
            .field("active_keys", &self.limiters.len())
            .field("config", &self.config)
            .finish()
    }
}

/// Resets the eviction flag on every exit path.
struct EvictionGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for EvictionGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Occupancy and lifetime counters of a [`KeyedLimiter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedStats {
    /// Keys tracked right now.
    pub active_keys: usize,

    /// Upper bound on tracked keys.
    pub max_keys: usize,

    /// Limiters created since startup.
    pub total_created: u64,

    /// Limiters removed by cleanup, eviction or `clear()`.
    pub total_evicted: u64,
}

impl KeyedStats {
    /// Fraction of the key bound in use.
    pub fn capacity_used(&self) -> f64 {
        if self.max_keys == 0 {
            0.0
        } else {
            self.active_keys as f64 / self.max_keys as f64
        }
    }

    /// At or above 90% of the key bound.
    pub fn is_near_capacity(&self) -> bool {
        self.active_keys * 10 >= self.max_keys * 9
    }
}
