//! # Worker Pool
//!
//! A fixed set of worker threads consuming a [`BoundedTaskQueue`].
//!
//! ```text
//!     submit() ──► [ bounded queue ] ──► worker-0 ──► task()
//!        │              │            ──► worker-1 ──► task()
//!        │              │            ──► worker-W ──► task()
//!        │              └─ full: submit() blocks (backpressure)
//!        └─ after shutdown(): Err(ShuttingDown)
//! ```
//!
//! ## Shutdown
//!
//! `shutdown()` flips the pool to `Draining` and closes the queue. Workers
//! keep executing whatever was already queued and exit once it is empty; the
//! last one out moves the pool to `Terminated`. Nothing already accepted is
//! cancelled, and nothing submitted after the close ever runs.

mod config;
mod queue;
mod stats;
mod worker;

pub use config::{PoolConfig, DEFAULT_POLL_INTERVAL};
pub use queue::{BoundedTaskQueue, Closed, Pop};
pub use stats::{PoolState, PoolStats};

use crate::error::{PoolError, SubmitError};
use parking_lot::{Condvar, Mutex};
use stats::PoolCounters;
use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// A unit of work: runs once on some worker, returns nothing.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// State shared between the pool handle and its workers.
pub(crate) struct Shared {
    queue: BoundedTaskQueue<Task>,
    state: AtomicU8,
    live_workers: AtomicUsize,
    poll_interval: Duration,
    counters: PoolCounters,
    termination_lock: Mutex<()>,
    termination: Condvar,
}

impl Shared {
    #[inline]
    fn state(&self) -> PoolState {
        PoolState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Running → Draining, then closes the queue. Returns whether this call
    /// made the transition.
    fn begin_shutdown(&self) -> bool {
        let transitioned = self
            .state
            .compare_exchange(
                PoolState::Running as u8,
                PoolState::Draining as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        self.queue.close();
        transitioned
    }

    /// Called by each worker as its loop ends.
    fn worker_exited(&self, name: &str) {
        let remaining = self.live_workers.fetch_sub(1, Ordering::AcqRel) - 1;
        info!("Worker {} exited ({} still running)", name, remaining);

        if remaining == 0 {
            let _guard = self.termination_lock.lock();
            self.state
                .store(PoolState::Terminated as u8, Ordering::Release);
            self.termination.notify_all();
            info!("Worker pool terminated");
        }
    }
}

/// Fixed-size thread pool with a bounded queue and drain-on-shutdown.
///
/// # Example
///
/// ```rust
/// use gatekeep::WorkerPool;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let pool = WorkerPool::new(2, 8).unwrap();
/// let done = Arc::new(AtomicUsize::new(0));
///
/// for _ in 0..5 {
///     let done = Arc::clone(&done);
///     pool.submit(move || {
///         done.fetch_add(1, Ordering::SeqCst);
///     })
///     .unwrap();
/// }
///
/// pool.join();
/// assert_eq!(done.load(Ordering::SeqCst), 5);
/// ```
pub struct WorkerPool {
    shared: Arc<Shared>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    workers: usize,
}

impl WorkerPool {
    /// Starts `workers` threads sharing a queue of `queue_capacity` slots.
    ///
    /// # Errors
    ///
    /// [`PoolError::Config`] if either count is 0, [`PoolError::Spawn`] if a
    /// thread cannot be started.
    pub fn new(workers: usize, queue_capacity: usize) -> Result<Self, PoolError> {
        Self::with_config(PoolConfig::new(workers, queue_capacity))
    }

    /// Starts a pool from a full configuration.
    ///
    /// If a worker fails to spawn, the workers already running are shut down
    /// before the error is returned.
    pub fn with_config(config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;

        let shared = Arc::new(Shared {
            queue: BoundedTaskQueue::new(config.queue_capacity),
            state: AtomicU8::new(PoolState::Running as u8),
            live_workers: AtomicUsize::new(0),
            poll_interval: config.poll_interval,
            counters: PoolCounters::default(),
            termination_lock: Mutex::new(()),
            termination: Condvar::new(),
        });

        let mut handles = Vec::with_capacity(config.workers);
        for index in 0..config.workers {
            let name = format!("{}-{}", config.thread_name_prefix, index);
            let worker_shared = Arc::clone(&shared);
            let worker_name = name.clone();

            shared.live_workers.fetch_add(1, Ordering::AcqRel);
            let spawned = thread::Builder::new()
                .name(name.clone())
                .spawn(move || worker::run(worker_shared, worker_name));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    shared.live_workers.fetch_sub(1, Ordering::AcqRel);
                    warn!("Failed to spawn {}, stopping {} started workers", name, index);
                    shared.begin_shutdown();
                    return Err(PoolError::Spawn { name, source });
                }
            }
        }

        info!(
            "Started worker pool ({} workers, queue capacity {}, poll interval {:?})",
            config.workers, config.queue_capacity, config.poll_interval
        );

        Ok(Self {
            shared,
            handles: Mutex::new(handles),
            workers: config.workers,
        })
    }

    /// Queues `task`, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// [`SubmitError::ShuttingDown`] if shutdown has begun, including when it
    /// begins while this call is waiting for a slot. The task is dropped
    /// without running.
    pub fn submit<F>(&self, task: F) -> Result<(), SubmitError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit_task(Box::new(task))
    }

    /// [`submit`](Self::submit) for an already boxed task.
    pub fn submit_task(&self, task: Task) -> Result<(), SubmitError> {
        if self.shared.state().is_shutdown() {
            PoolCounters::incr(&self.shared.counters.rejected);
            return Err(SubmitError::ShuttingDown);
        }

        match self.shared.queue.push(task) {
            Ok(()) => {
                PoolCounters::incr(&self.shared.counters.submitted);
                Ok(())
            }
            Err(Closed(_task)) => {
                PoolCounters::incr(&self.shared.counters.rejected);
                Err(SubmitError::ShuttingDown)
            }
        }
    }

    /// Stops accepting work. Idempotent; returns without waiting for the
    /// queue to drain.
    pub fn shutdown(&self) {
        if self.shared.begin_shutdown() {
            info!(
                "Worker pool draining ({} queued tasks)",
                self.shared.queue.len()
            );
        }
    }

    /// Waits up to `timeout` for every worker to exit.
    ///
    /// Returns `true` if the pool is terminated. Does not start shutdown on
    /// its own.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.shared.termination_lock.lock();
        while self.shared.state() != PoolState::Terminated {
            if self
                .shared
                .termination
                .wait_until(&mut guard, deadline)
                .timed_out()
            {
                return self.shared.state() == PoolState::Terminated;
            }
        }
        true
    }

    /// Shuts down and blocks until every queued task has run and every
    /// worker thread has been joined.
    pub fn join(&self) {
        self.shutdown();

        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        for handle in handles {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                warn!("Worker {} ended abnormally", name);
            }
        }
    }

    /// Current lifecycle state.
    #[inline]
    pub fn state(&self) -> PoolState {
        self.shared.state()
    }

    /// Whether shutdown has begun.
    #[inline]
    pub fn is_shutdown(&self) -> bool {
        self.state().is_shutdown()
    }

    /// Whether every worker has exited.
    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.state() == PoolState::Terminated
    }

    /// Tasks currently waiting in the queue.
    pub fn queued(&self) -> usize {
        self.shared.queue.len()
    }

    /// Workers whose loop has not ended.
    pub fn live_workers(&self) -> usize {
        self.shared.live_workers.load(Ordering::Acquire)
    }

    /// Configured worker count.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Counter and occupancy snapshot.
    pub fn stats(&self) -> PoolStats {
        let counters = &self.shared.counters;
        PoolStats {
            state: self.state(),
            workers: self.workers,
            live_workers: self.live_workers(),
            queued: self.queued(),
            queue_capacity: self.shared.queue.capacity(),
            submitted: PoolCounters::get(&counters.submitted),
            rejected: PoolCounters::get(&counters.rejected),
            completed: PoolCounters::get(&counters.completed),
            panicked: PoolCounters::get(&counters.panicked),
        }
    }
}

impl Drop for WorkerPool {
    /// Starts shutdown; workers finish the queue in the background.
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("state", &self.state())
            .field("workers", &self.workers)
            .field("live_workers", &self.live_workers())
            .field("queued", &self.queued())
            .finish()
    }
}
