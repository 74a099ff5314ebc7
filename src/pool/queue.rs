//! # Bounded Task Queue
//!
//! A fixed-capacity FIFO handoff between producers and workers.
//!
//! ```text
//!     push ──► [ t1 | t2 | t3 ] ──► pop
//!               capacity C = 3
//!
//!     full  → push waits on `not_full`
//!     empty → pop waits on `not_empty` (bounded by a timeout)
//!     close → both sides wake; pushes hand their item back,
//!             pops drain what is left, then report Closed
//! ```
//!
//! The item buffer and the closed flag live under one mutex, so an item is
//! either inserted before `close()` (and will be popped) or returned to its
//! producer. Nothing slips in after the close.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

/// Outcome of a timed [`BoundedTaskQueue::pop`].
#[derive(Debug, PartialEq, Eq)]
pub enum Pop<T> {
    /// The head of the queue.
    Item(T),
    /// Nothing arrived before the timeout.
    Empty,
    /// The queue is closed and has been fully drained.
    Closed,
}

/// Returned by [`BoundedTaskQueue::push`] on a closed queue; carries the
/// rejected item back to the caller.
pub struct Closed<T>(pub T);

impl<T> Closed<T> {
    /// Recovers the item that was not queued.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Closed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Closed(..)")
    }
}

impl<T> fmt::Display for Closed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("queue closed")
    }
}

struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Blocking bounded FIFO queue.
///
/// # Example
///
/// ```rust
/// use gatekeep::{BoundedTaskQueue, Pop};
/// use std::time::Duration;
///
/// let queue = BoundedTaskQueue::new(2);
/// queue.push("a").unwrap();
/// queue.push("b").unwrap();
/// assert_eq!(queue.len(), 2);
///
/// assert_eq!(queue.pop(Duration::from_millis(10)), Pop::Item("a"));
/// queue.close();
/// assert_eq!(queue.pop(Duration::from_millis(10)), Pop::Item("b"));
/// assert_eq!(queue.pop(Duration::from_millis(10)), Pop::Closed);
/// ```
pub struct BoundedTaskQueue<T> {
    inner: Mutex<Inner<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl<T> BoundedTaskQueue<T> {
    /// Creates an empty queue holding at most `capacity` items.
    ///
    /// A capacity of 0 is raised to 1; pool and limiter configs reject it
    /// before it gets here.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    /// Appends `item`, waiting as long as the queue is full.
    ///
    /// # Errors
    ///
    /// Returns the item inside [`Closed`] if the queue is closed before a
    /// slot frees up.
    pub fn push(&self, item: T) -> Result<(), Closed<T>> {
        let mut inner = self.inner.lock();
        loop {
            if inner.closed {
                return Err(Closed(item));
            }
            if inner.items.len() < self.capacity {
                inner.items.push_back(item);
                drop(inner);
                self.not_empty.notify_one();
                return Ok(());
            }
            self.not_full.wait(&mut inner);
        }
    }

    /// Removes the head, waiting at most `timeout` for one to arrive.
    ///
    /// Items queued before a close are still returned; `Closed` is only
    /// reported once the queue is both closed and empty.
    pub fn pop(&self, timeout: Duration) -> Pop<T> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        loop {
            if let Some(item) = inner.items.pop_front() {
                drop(inner);
                self.not_full.notify_one();
                return Pop::Item(item);
            }
            if inner.closed {
                return Pop::Closed;
            }
            if self.not_empty.wait_until(&mut inner, deadline).timed_out() {
                // One last look: an item may have landed as the wait expired.
                return match inner.items.pop_front() {
                    Some(item) => {
                        drop(inner);
                        self.not_full.notify_one();
                        Pop::Item(item)
                    }
                    None if inner.closed => Pop::Closed,
                    None => Pop::Empty,
                };
            }
        }
    }

    /// Refuses further pushes and wakes every waiter. Idempotent.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if inner.closed {
            return;
        }
        inner.closed = true;
        drop(inner);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Point-in-time item count; may be stale as soon as it returns.
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Point-in-time emptiness check.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Fixed maximum number of items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

impl<T> fmt::Debug for BoundedTaskQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("BoundedTaskQueue")
            .field("len", &inner.items.len())
            .field("capacity", &self.capacity)
            .field("closed", &inner.closed)
            .finish()
    }
}
