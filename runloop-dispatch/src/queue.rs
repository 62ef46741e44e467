// runloop-dispatch/src/queue.rs
// ============================================================================
// Module: Dispatch Queue
// Description: FIFO-within-priority task queue with an explicit processing set.
// Purpose: Let a worker fan out task execution without losing a task that
//          crashes mid-flight.
// Dependencies: crate::task, runloop_core::model::identifiers, std::{collections, sync, time}
// ============================================================================

//! ## Overview
//! [`Queue`] is the trait object seam; [`InMemoryQueue`] is the concrete
//! reference implementation backed by a `Mutex` + `Condvar`, and
//! [`SharedQueue`] is a cheaply `Clone`-able wrapper around any
//! `Arc<dyn Queue>`. Ordering is strictly `(priority desc, created_at asc)`;
//! ties are broken by insertion sequence so ordering stays stable within one
//! process.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use runloop_core::model::identifiers::TaskId;

use crate::task::Task;
use crate::task::TaskResult;

/// Error raised by a [`Queue`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// The queue has been closed; no further enqueues are accepted and a
    /// blocked dequeue unblocks with this error.
    #[error("queue is closed")]
    QueueClosed,
    /// The named task is not in the processing set (already acked/rejected,
    /// or never dequeued).
    #[error("task '{0}' is not being processed")]
    NotProcessing(TaskId),
}

/// Ordering key used to sort pending tasks by `(priority desc, created_at
/// asc)`, with a monotonic sequence number to keep ties stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct OrderKey {
    /// Negated so the natural (ascending) `BTreeSet` order sorts highest
    /// priority first.
    negated_priority: i32,
    /// Enqueue timestamp; earlier values sort first among equal priorities.
    created_at_ms: u64,
    /// Tie-breaker for tasks enqueued in the same millisecond.
    sequence: u64,
}

/// Persists and orders tasks awaiting processing, plus the set of tasks
/// currently checked out by a worker.
pub trait Queue: Send + Sync {
    /// Adds `task` to the pending set, ordered by priority then age.
    ///
    /// # Errors
    /// Returns [`QueueError::QueueClosed`] if the queue has been closed.
    fn enqueue(&self, task: Task) -> Result<(), QueueError>;

    /// Blocks until a task is available, the queue closes, or `deadline`
    /// passes, returning `Ok(None)` on timeout.
    ///
    /// # Errors
    /// Returns [`QueueError::QueueClosed`] if the queue closes while waiting.
    fn dequeue(&self, deadline: Duration) -> Result<Option<Task>, QueueError>;

    /// Acknowledges successful completion of `task_id`, removing it from the
    /// processing set.
    ///
    /// # Errors
    /// Returns [`QueueError::NotProcessing`] if `task_id` is not checked out.
    fn ack(&self, task_id: &TaskId, result: TaskResult) -> Result<(), QueueError>;

    /// Rejects `task_id`, either reinserting it into the pending set at its
    /// original priority (`requeue = true`) or recording a terminal failure
    /// (`requeue = false`).
    ///
    /// # Errors
    /// Returns [`QueueError::NotProcessing`] if `task_id` is not checked out.
    fn reject(&self, task_id: &TaskId, reason: &str, requeue: bool) -> Result<(), QueueError>;

    /// Returns the next pending task without removing it, if any.
    fn peek(&self) -> Option<Task>;

    /// Returns the number of pending tasks (not counting those checked out).
    fn size(&self) -> usize;

    /// Closes the queue: further `enqueue` calls fail, and any blocked
    /// `dequeue` call unblocks with [`QueueError::QueueClosed`].
    fn close(&self);
}

/// Internal mutable state shared behind the queue's mutex.
struct State {
    /// Pending tasks ordered by [`OrderKey`].
    pending: BTreeMap<OrderKey, Task>,
    /// Tasks checked out by a worker, keyed by id.
    processing: BTreeMap<TaskId, (OrderKey, Task)>,
    /// Terminal results recorded for tasks rejected without requeue.
    results: BTreeMap<TaskId, TaskResult>,
    /// Monotonic counter breaking ties between same-millisecond enqueues.
    next_sequence: u64,
    /// True once [`Queue::close`] has been called.
    closed: bool,
}

/// Reference [`Queue`] backed by an in-process ordered map.
pub struct InMemoryQueue {
    state: Mutex<State>,
    not_empty: Condvar,
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryQueue {
    /// Creates an empty, open queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                pending: BTreeMap::new(),
                processing: BTreeMap::new(),
                results: BTreeMap::new(),
                next_sequence: 0,
                closed: false,
            }),
            not_empty: Condvar::new(),
        }
    }

    /// Returns the recorded terminal result for `task_id`, if any (set by a
    /// non-requeued reject).
    #[must_use]
    pub fn result_for(&self, task_id: &TaskId) -> Option<TaskResult> {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        let guard = self.state.lock().expect("queue mutex poisoned");
        guard.results.get(task_id).cloned()
    }
}

impl Queue for InMemoryQueue {
    fn enqueue(&self, task: Task) -> Result<(), QueueError> {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        let mut guard = self.state.lock().expect("queue mutex poisoned");
        if guard.closed {
            return Err(QueueError::QueueClosed);
        }
        let sequence = guard.next_sequence;
        guard.next_sequence += 1;
        let key = OrderKey {
            negated_priority: -task.priority,
            created_at_ms: task.created_at_ms,
            sequence,
        };
        guard.pending.insert(key, task);
        self.not_empty.notify_one();
        Ok(())
    }

    fn dequeue(&self, deadline: Duration) -> Result<Option<Task>, QueueError> {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        let mut guard = self.state.lock().expect("queue mutex poisoned");
        let started = Instant::now();
        loop {
            if let Some((&key, _)) = guard.pending.iter().next() {
                #[allow(clippy::expect_used, reason = "key was just observed present under the same lock")]
                let task = guard.pending.remove(&key).expect("key observed present above");
                guard.processing.insert(task.task_id.clone(), (key, task.clone()));
                return Ok(Some(task));
            }
            if guard.closed {
                return Err(QueueError::QueueClosed);
            }
            let elapsed = started.elapsed();
            if elapsed >= deadline {
                return Ok(None);
            }
            #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
            let (next_guard, timeout) =
                self.not_empty.wait_timeout(guard, deadline - elapsed).expect("queue condvar poisoned");
            guard = next_guard;
            if timeout.timed_out() && guard.pending.is_empty() && !guard.closed {
                return Ok(None);
            }
        }
    }

    fn ack(&self, task_id: &TaskId, result: TaskResult) -> Result<(), QueueError> {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        let mut guard = self.state.lock().expect("queue mutex poisoned");
        if guard.processing.remove(task_id).is_none() {
            return Err(QueueError::NotProcessing(task_id.clone()));
        }
        guard.results.insert(task_id.clone(), result);
        Ok(())
    }

    fn reject(&self, task_id: &TaskId, reason: &str, requeue: bool) -> Result<(), QueueError> {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        let mut guard = self.state.lock().expect("queue mutex poisoned");
        let Some((key, mut task)) = guard.processing.remove(task_id) else {
            return Err(QueueError::NotProcessing(task_id.clone()));
        };
        if requeue {
            task.attempt += 1;
            guard.pending.insert(key, task);
            self.not_empty.notify_one();
        } else {
            guard.results.insert(task_id.clone(), TaskResult::failure(task_id.clone(), reason.to_string()));
        }
        Ok(())
    }

    fn peek(&self) -> Option<Task> {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        let guard = self.state.lock().expect("queue mutex poisoned");
        guard.pending.values().next().cloned()
    }

    fn size(&self) -> usize {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        let guard = self.state.lock().expect("queue mutex poisoned");
        guard.pending.len()
    }

    fn close(&self) {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        let mut guard = self.state.lock().expect("queue mutex poisoned");
        guard.closed = true;
        self.not_empty.notify_all();
    }
}

/// A `Clone`-able handle to any [`Queue`] implementation.
#[derive(Clone)]
pub struct SharedQueue {
    inner: Arc<dyn Queue>,
}

impl SharedQueue {
    /// Wraps an existing queue behind a shared handle.
    #[must_use]
    pub fn new(inner: Arc<dyn Queue>) -> Self {
        Self { inner }
    }
}

impl Queue for SharedQueue {
    fn enqueue(&self, task: Task) -> Result<(), QueueError> {
        self.inner.enqueue(task)
    }

    fn dequeue(&self, deadline: Duration) -> Result<Option<Task>, QueueError> {
        self.inner.dequeue(deadline)
    }

    fn ack(&self, task_id: &TaskId, result: TaskResult) -> Result<(), QueueError> {
        self.inner.ack(task_id, result)
    }

    fn reject(&self, task_id: &TaskId, reason: &str, requeue: bool) -> Result<(), QueueError> {
        self.inner.reject(task_id, reason, requeue)
    }

    fn peek(&self) -> Option<Task> {
        self.inner.peek()
    }

    fn size(&self) -> usize {
        self.inner.size()
    }

    fn close(&self) {
        self.inner.close();
    }
}
