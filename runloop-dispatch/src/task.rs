// runloop-dispatch/src/task.rs
// ============================================================================
// Module: Dispatcher Task
// Description: The unit of work a queue orders and a worker executes.
// Purpose: Decouple the queue's ordering contract from what a task actually
//          does once dequeued.
// Dependencies: runloop_core::model::identifiers, serde_json
// ============================================================================

//! ## Overview
//! A [`Task`] carries everything a worker needs to dispatch by `task_type`
//! without the queue itself understanding what any particular type means.

use runloop_core::model::identifiers::RunId;
use runloop_core::model::identifiers::TaskId;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// One unit of work submitted to a [`crate::queue::Queue`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier for this task.
    pub task_id: TaskId,
    /// The run this task was submitted on behalf of.
    pub run_id: RunId,
    /// Dispatch key a worker's handler registry is keyed on (e.g. `tool_call`).
    pub task_type: String,
    /// Task-specific input, interpreted by the registered handler.
    pub input: Value,
    /// Priority; higher values are dequeued first.
    pub priority: i32,
    /// Unix-epoch milliseconds when this task was enqueued.
    pub created_at_ms: u64,
    /// Number of times this task has been dequeued (starts at zero).
    pub attempt: u32,
}

/// The terminal result of processing one [`Task`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// The task this result belongs to.
    pub task_id: TaskId,
    /// Whether the task succeeded.
    pub succeeded: bool,
    /// The handler's output, if it succeeded.
    pub output: Option<Value>,
    /// A human-readable failure reason, if it did not.
    pub error: Option<String>,
}

impl TaskResult {
    /// Builds a successful result.
    #[must_use]
    pub fn success(task_id: TaskId, output: Value) -> Self {
        Self {
            task_id,
            succeeded: true,
            output: Some(output),
            error: None,
        }
    }

    /// Builds a failed result.
    #[must_use]
    pub fn failure(task_id: TaskId, error: impl Into<String>) -> Self {
        Self {
            task_id,
            succeeded: false,
            output: None,
            error: Some(error.into()),
        }
    }
}
