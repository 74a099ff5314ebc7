//! Pool lifecycle and throughput counters.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifecycle of a [`WorkerPool`](crate::WorkerPool).
///
/// ```text
///     Running ──shutdown()──► Draining ──last worker exits──► Terminated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PoolState {
    /// Accepting submissions.
    Running = 0,
    /// Refusing submissions, still executing queued tasks.
    Draining = 1,
    /// Every worker has exited.
    Terminated = 2,
}

impl PoolState {
    #[inline]
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Draining,
            _ => Self::Terminated,
        }
    }

    /// True once shutdown has started.
    #[inline]
    pub fn is_shutdown(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.write_str("running"),
            Self::Draining => f.write_str("draining"),
            Self::Terminated => f.write_str("terminated"),
        }
    }
}

/// Lifetime task counters, updated lock-free by producers and workers.
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub(crate) submitted: AtomicU64,
    pub(crate) rejected: AtomicU64,
    pub(crate) completed: AtomicU64,
    pub(crate) panicked: AtomicU64,
}

impl PoolCounters {
    #[inline]
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// Snapshot of a pool.
///
/// Values are read independently and are only advisory while the pool is
/// busy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    /// Lifecycle state at snapshot time.
    pub state: PoolState,

    /// Configured worker count.
    pub workers: usize,

    /// Workers whose loop has not exited yet.
    pub live_workers: usize,

    /// Tasks waiting in the queue.
    pub queued: usize,

    /// Fixed queue capacity.
    pub queue_capacity: usize,

    /// Tasks accepted into the queue.
    pub submitted: u64,

    /// Submissions refused because the pool was shutting down.
    pub rejected: u64,

    /// Tasks that ran to completion.
    pub completed: u64,

    /// Tasks that panicked (the worker survived).
    pub panicked: u64,
}

impl PoolStats {
    /// Accepted tasks that have not finished yet: queued or running.
    pub fn outstanding(&self) -> u64 {
        self.submitted
            .saturating_sub(self.completed + self.panicked)
    }

    /// Fraction of queue slots in use.
    pub fn queue_utilization(&self) -> f64 {
        if self.queue_capacity == 0 {
            0.0
        } else {
            self.queued as f64 / self.queue_capacity as f64
        }
    }

    /// Multi-line report suitable for logs.
    pub fn summary(&self) -> String {
        format!(
            "Worker Pool Stats:\n\
             ├─ State: {}\n\
             ├─ Workers: {}/{} live\n\
             ├─ Queue: {}/{} ({:.1}%)\n\
             └─ Tasks:\n\
                ├─ Submitted: {}\n\
                ├─ Rejected: {}\n\
                ├─ Completed: {}\n\
                └─ Panicked: {}",
            self.state,
            self.live_workers,
            self.workers,
            self.queued,
            self.queue_capacity,
            self.queue_utilization() * 100.0,
            self.submitted,
            self.rejected,
            self.completed,
            self.panicked,
        )
    }
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> PoolStats {
        PoolStats {
            state: PoolState::Running,
            workers: 4,
            live_workers: 4,
            queued: 2,
            queue_capacity: 8,
            submitted: 10,
            rejected: 1,
            completed: 6,
            panicked: 1,
        }
    }

    #[test]
    fn test_state_round_trip() {
        for state in [PoolState::Running, PoolState::Draining, PoolState::Terminated] {
            assert_eq!(PoolState::from_u8(state as u8), state);
        }
        assert!(!PoolState::Running.is_shutdown());
        assert!(PoolState::Draining.is_shutdown());
        assert_eq!(PoolState::Terminated.to_string(), "terminated");
    }

    #[test]
    fn test_derived_values() {
        let stats = stats();
        assert_eq!(stats.outstanding(), 3);
        assert_eq!(stats.queue_utilization(), 0.25);
    }

    #[test]
    fn test_summary() {
        let text = stats().to_string();
        assert!(text.contains("State: running"));
        assert!(text.contains("Queue: 2/8"));
        assert!(text.contains("Panicked: 1"));
    }
}
