// runloop-dispatch/src/lib.rs
// ============================================================================
// Module: Runloop Dispatch Library
// Description: Public API surface for distributed task dispatch.
// Purpose: Expose the queue, lock, worker and coordinator seams as one
//          backend-agnostic crate, independent of the run engine's planner
//          loop.
// Dependencies: runloop_core, crate::{coordinator, lock, queue, task, worker}
// ============================================================================

//! ## Overview
//! `runloop-dispatch` lets tasks produced outside the deterministic run
//! engine loop (tool calls fanned out across workers, background jobs tied
//! to a run) be queued, locked against duplicate execution, and tracked to
//! completion. It depends on `runloop-core` only for shared identifiers and
//! the tool contract; it does not depend on `runloop_core::engine`.

pub mod coordinator;
pub mod lock;
pub mod queue;
pub mod task;
pub mod worker;

pub use coordinator::Coordinator;
pub use coordinator::CoordinatorError;
pub use coordinator::InMemoryCoordinator;
pub use coordinator::RunCounts;
pub use coordinator::SharedCoordinator;
pub use lock::acquire_with_retry;
pub use lock::InMemoryLock;
pub use lock::Lock;
pub use lock::LockError;
pub use lock::RetryConfig;
pub use lock::SharedLock;
pub use queue::InMemoryQueue;
pub use queue::Queue;
pub use queue::QueueError;
pub use queue::SharedQueue;
pub use task::Task;
pub use task::TaskResult;
pub use worker::TaskHandler;
pub use worker::Worker;
pub use worker::WorkerConfig;
pub use worker::WorkerMetrics;
