//! Worker loop and per-task fault boundary.

use super::{queue::Pop, Shared, Task};
use crate::pool::stats::PoolCounters;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error};

/// Body of one worker thread.
///
/// Pops with a bounded wait so an idle worker wakes up at least once per
/// poll interval. The loop only ends on `Pop::Closed`, which the queue
/// reports under its lock once it is closed and empty: no task can be
/// queued after a worker decides to leave.
pub(super) fn run(shared: Arc<Shared>, name: String) {
    debug!("Worker {} started", name);

    loop {
        match shared.queue.pop(shared.poll_interval) {
            Pop::Item(task) => execute(&shared, &name, task),
            // Idle timeout: keep waiting. Even while draining, the only way
            // out is `Closed`, which the queue reports once it is empty.
            Pop::Empty => continue,
            Pop::Closed => break,
        }
    }

    shared.worker_exited(&name);
}

/// Runs `task`, containing any panic so the worker survives it.
fn execute(shared: &Shared, worker: &str, task: Task) {
    match panic::catch_unwind(AssertUnwindSafe(task)) {
        Ok(()) => PoolCounters::incr(&shared.counters.completed),
        Err(payload) => {
            PoolCounters::incr(&shared.counters.panicked);
            error!(
                "Task panicked on worker {}: {}",
                worker,
                panic_message(payload.as_ref())
            );
        }
    }
}

/// Best-effort text of a panic payload.
pub(super) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
