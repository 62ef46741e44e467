// runloop-dispatch/src/worker.rs
// ============================================================================
// Module: Dispatch Worker
// Description: Pulls tasks from a queue, locks them, and runs a handler.
// Purpose: The execution half of the dispatcher; pairs with queue.rs's
//          ordering and lock.rs's mutual exclusion.
// Dependencies: crate::{lock, queue, task}, runloop_core::model::{identifiers, tool}, std::{collections, sync, time}
// ============================================================================

//! ## Overview
//! A [`Worker`] polls a [`crate::queue::Queue`] for work, takes a
//! [`crate::lock::Lock`] on the task's id so at most one worker processes it
//! at a time, then dispatches by `task_type` to a registered handler. The
//! built-in `tool_call` handler looks the tool up in a
//! [`runloop_core::model::tool::ToolRegistry`] and invokes it directly,
//! bypassing the run engine's middleware chain since dispatcher tasks are
//! not tied to a live [`runloop_core::engine::Engine`] run.
//!
//! Retry is the queue's decision, not the worker's: on handler failure the
//! worker always rejects without requeue, recording the failure in the
//! queue's terminal-result map.

use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use serde_json::Value;

use runloop_core::model::identifiers::HolderId;
use runloop_core::model::identifiers::RunId;
use runloop_core::model::identifiers::ToolName;
use runloop_core::model::state::State;
use runloop_core::model::tool::ToolContext;
use runloop_core::model::tool::ToolRegistry;

use crate::lock::Lock;
use crate::lock::LockError;
use crate::queue::Queue;
use crate::queue::QueueError;
use crate::task::Task;
use crate::task::TaskResult;

/// A task-type-specific handler. Returns the handler's output on success, or
/// a human-readable error message on failure.
pub type TaskHandler = Arc<dyn Fn(&Task) -> Result<Value, String> + Send + Sync>;

/// Tunables for one [`Worker`].
#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    /// How long to wait on an empty queue before returning from `poll_once`.
    pub poll_timeout: Duration,
    /// TTL applied to the per-task lock while a handler runs.
    pub lock_ttl: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(1),
            lock_ttl: Duration::from_secs(60),
        }
    }
}

/// Running totals for tasks this worker has processed.
#[derive(Default)]
pub struct WorkerMetrics {
    /// Tasks dequeued and handed to a handler.
    pub tasks_started: AtomicU64,
    /// Tasks whose handler returned success.
    pub tasks_completed: AtomicU64,
    /// Tasks whose handler returned failure, or that could not be locked.
    pub tasks_failed: AtomicU64,
    /// Sum of handler durations, in milliseconds.
    pub total_duration_ms: AtomicU64,
}

impl WorkerMetrics {
    /// Fraction of started tasks that completed successfully, or `1.0` if
    /// none have started yet.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let started = self.tasks_started.load(Ordering::Relaxed);
        if started == 0 {
            return 1.0;
        }
        let completed = self.tasks_completed.load(Ordering::Relaxed);
        #[allow(clippy::cast_precision_loss, reason = "metrics ratio, precision loss is acceptable")]
        let rate = completed as f64 / started as f64;
        rate
    }
}

/// Pulls tasks off a queue, locks them, and dispatches to a registered
/// handler by `task_type`.
pub struct Worker {
    queue: Arc<dyn Queue>,
    lock: Arc<dyn Lock>,
    holder: HolderId,
    config: WorkerConfig,
    handlers: HashMap<String, TaskHandler>,
    metrics: WorkerMetrics,
}

impl Worker {
    /// Creates a worker with no registered handlers.
    #[must_use]
    pub fn new(queue: Arc<dyn Queue>, lock: Arc<dyn Lock>, holder: HolderId, config: WorkerConfig) -> Self {
        Self {
            queue,
            lock,
            holder,
            config,
            handlers: HashMap::new(),
            metrics: WorkerMetrics::default(),
        }
    }

    /// Registers a handler for `task_type`, replacing any prior handler for
    /// the same type.
    pub fn register_handler(&mut self, task_type: impl Into<String>, handler: TaskHandler) -> &mut Self {
        self.handlers.insert(task_type.into(), handler);
        self
    }

    /// Registers the built-in `tool_call` handler, dispatching task input of
    /// the shape `{"tool_name": ..., "input": ...}` through `registry`.
    pub fn register_tool_registry(&mut self, registry: Arc<ToolRegistry>) -> &mut Self {
        let handler: TaskHandler = Arc::new(move |task: &Task| -> Result<Value, String> {
            let tool_name = task
                .input
                .get("tool_name")
                .and_then(Value::as_str)
                .ok_or_else(|| "task input missing 'tool_name'".to_string())?;
            let tool_input = task.input.get("input").cloned().unwrap_or(Value::Null);
            let tool = registry
                .get(&ToolName::new(tool_name))
                .ok_or_else(|| format!("tool '{tool_name}' is not registered"))?;
            let context = ToolContext {
                run_id: task.run_id.clone(),
                state: State::Act,
                reason: "dispatcher task".to_string(),
                deadline_ms: u64::MAX,
            };
            (tool.handler)(&context, &tool_input).map_err(|error| error.message)
        });
        self.register_handler("tool_call", handler);
        self
    }

    /// Returns this worker's running metrics.
    #[must_use]
    pub fn metrics(&self) -> &WorkerMetrics {
        &self.metrics
    }

    /// Performs one dequeue-lock-handle-ack cycle, returning `true` if a task
    /// was actually processed (as opposed to the queue being empty).
    ///
    /// # Errors
    /// Returns [`QueueError::QueueClosed`] if the queue closed while waiting.
    pub fn poll_once(&self) -> Result<bool, QueueError> {
        let Some(task) = self.queue.dequeue(self.config.poll_timeout)? else {
            return Ok(false);
        };
        self.process(task)?;
        Ok(true)
    }

    /// Runs a single task through locking and dispatch, acking or rejecting
    /// it on the queue according to the outcome.
    fn process(&self, task: Task) -> Result<(), QueueError> {
        let lock_key = format!("dispatch-task:{}", task.task_id);
        if let Err(error) = self.lock.acquire(&lock_key, &self.holder, self.config.lock_ttl) {
            self.metrics.tasks_failed.fetch_add(1, Ordering::Relaxed);
            return self.queue.reject(&task.task_id, &lock_failure_reason(&error), true);
        }

        self.metrics.tasks_started.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let outcome = self.dispatch(&task);
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.metrics.total_duration_ms.fetch_add(elapsed_ms, Ordering::Relaxed);

        let result = match outcome {
            Ok(output) => {
                self.metrics.tasks_completed.fetch_add(1, Ordering::Relaxed);
                self.queue.ack(&task.task_id, TaskResult::success(task.task_id.clone(), output))
            }
            Err(message) => {
                self.metrics.tasks_failed.fetch_add(1, Ordering::Relaxed);
                self.queue.reject(&task.task_id, &message, false)
            }
        };

        let _ = self.lock.release(&lock_key, &self.holder);
        result
    }

    /// Routes `task` to its registered handler by `task_type`.
    fn dispatch(&self, task: &Task) -> Result<Value, String> {
        let handler = self
            .handlers
            .get(&task.task_type)
            .ok_or_else(|| format!("no handler registered for task type '{}'", task.task_type))?;
        handler(task)
    }
}

/// Renders a [`LockError`] as a rejection reason string.
fn lock_failure_reason(error: &LockError) -> String {
    format!("could not lock task: {error}")
}

/// Convenience accessor pairing a worker with the run it is processing
/// tasks on behalf of, used by integration tests and the demo binary.
#[must_use]
pub fn run_id_of(task: &Task) -> RunId {
    task.run_id.clone()
}
