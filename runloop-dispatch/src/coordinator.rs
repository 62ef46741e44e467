// runloop-dispatch/src/coordinator.rs
// ============================================================================
// Module: Run Coordinator
// Description: Tracks how many tasks are outstanding for each run.
// Purpose: Let an embedder know when every task fanned out for a run has
//          resolved, without polling the queue itself.
// Dependencies: runloop_core::model::identifiers, std::{collections, sync}
// ============================================================================

//! ## Overview
//! A run typically fans out into several dispatcher tasks. [`Coordinator`]
//! tracks each run's `{pending, running, done}` counts so an embedder can
//! ask "is this run's task fan-out finished" without re-deriving it from
//! queue/lock state. It does not itself enqueue or execute anything; callers
//! report transitions explicitly.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use runloop_core::model::identifiers::RunId;

/// Error raised by a [`Coordinator`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordinatorError {
    /// The named run has no tracked state (never submitted, or already
    /// completed and forgotten).
    #[error("run '{0}' is not tracked")]
    UnknownRun(RunId),
}

/// Snapshot of one run's task counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounts {
    /// Tasks submitted but not yet dequeued by a worker.
    pub pending: u32,
    /// Tasks currently checked out by a worker.
    pub running: u32,
    /// Tasks that have reached a terminal outcome.
    pub done: u32,
}

impl RunCounts {
    /// True once every submitted task has resolved and none remain pending
    /// or running.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.pending == 0 && self.running == 0
    }
}

/// Tracks per-run task fan-out progress.
pub trait Coordinator: Send + Sync {
    /// Registers a new run with `task_count` tasks expected, all initially
    /// pending.
    fn submit_run(&self, run_id: &RunId, task_count: u32);

    /// Moves one task for `run_id` from pending to running.
    ///
    /// # Errors
    /// Returns [`CoordinatorError::UnknownRun`] if `run_id` was never submitted.
    fn task_started(&self, run_id: &RunId) -> Result<(), CoordinatorError>;

    /// Moves one task for `run_id` from running to done (success case).
    ///
    /// # Errors
    /// Returns [`CoordinatorError::UnknownRun`] if `run_id` was never submitted.
    fn task_completed(&self, run_id: &RunId) -> Result<(), CoordinatorError>;

    /// Moves one task for `run_id` from running to done (failure case). The
    /// count bookkeeping is identical to [`Coordinator::task_completed`];
    /// callers distinguish success from failure via the task's own result,
    /// not via this trait.
    fn task_failed(&self, run_id: &RunId) -> Result<(), CoordinatorError>;

    /// Returns the current counts for `run_id`, if tracked.
    fn counts(&self, run_id: &RunId) -> Option<RunCounts>;

    /// Removes `run_id` from tracking entirely.
    fn forget(&self, run_id: &RunId);
}

/// Reference [`Coordinator`] backed by an in-process map.
#[derive(Default)]
pub struct InMemoryCoordinator {
    runs: Mutex<HashMap<RunId, RunCounts>>,
}

impl InMemoryCoordinator {
    /// Creates a coordinator tracking no runs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `update` to `run_id`'s counts under the lock, or returns
    /// [`CoordinatorError::UnknownRun`] if untracked.
    fn with_counts<F>(&self, run_id: &RunId, update: F) -> Result<(), CoordinatorError>
    where
        F: FnOnce(&mut RunCounts),
    {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        let mut guard = self.runs.lock().expect("coordinator mutex poisoned");
        let Some(counts) = guard.get_mut(run_id) else {
            return Err(CoordinatorError::UnknownRun(run_id.clone()));
        };
        update(counts);
        Ok(())
    }
}

impl Coordinator for InMemoryCoordinator {
    fn submit_run(&self, run_id: &RunId, task_count: u32) {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        let mut guard = self.runs.lock().expect("coordinator mutex poisoned");
        guard.insert(
            run_id.clone(),
            RunCounts {
                pending: task_count,
                running: 0,
                done: 0,
            },
        );
    }

    fn task_started(&self, run_id: &RunId) -> Result<(), CoordinatorError> {
        self.with_counts(run_id, |counts| {
            counts.pending = counts.pending.saturating_sub(1);
            counts.running += 1;
        })
    }

    fn task_completed(&self, run_id: &RunId) -> Result<(), CoordinatorError> {
        self.with_counts(run_id, |counts| {
            counts.running = counts.running.saturating_sub(1);
            counts.done += 1;
        })
    }

    fn task_failed(&self, run_id: &RunId) -> Result<(), CoordinatorError> {
        self.task_completed(run_id)
    }

    fn counts(&self, run_id: &RunId) -> Option<RunCounts> {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        let guard = self.runs.lock().expect("coordinator mutex poisoned");
        guard.get(run_id).copied()
    }

    fn forget(&self, run_id: &RunId) {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        let mut guard = self.runs.lock().expect("coordinator mutex poisoned");
        guard.remove(run_id);
    }
}

/// A `Clone`-able handle to any [`Coordinator`] implementation.
#[derive(Clone)]
pub struct SharedCoordinator {
    inner: Arc<dyn Coordinator>,
}

impl SharedCoordinator {
    /// Wraps an existing coordinator behind a shared handle.
    #[must_use]
    pub fn new(inner: Arc<dyn Coordinator>) -> Self {
        Self { inner }
    }
}

impl Coordinator for SharedCoordinator {
    fn submit_run(&self, run_id: &RunId, task_count: u32) {
        self.inner.submit_run(run_id, task_count);
    }

    fn task_started(&self, run_id: &RunId) -> Result<(), CoordinatorError> {
        self.inner.task_started(run_id)
    }

    fn task_completed(&self, run_id: &RunId) -> Result<(), CoordinatorError> {
        self.inner.task_completed(run_id)
    }

    fn task_failed(&self, run_id: &RunId) -> Result<(), CoordinatorError> {
        self.inner.task_failed(run_id)
    }

    fn counts(&self, run_id: &RunId) -> Option<RunCounts> {
        self.inner.counts(run_id)
    }

    fn forget(&self, run_id: &RunId) {
        self.inner.forget(run_id);
    }
}

#[cfg(test)]
mod tests {
    use super::Coordinator;
    use super::CoordinatorError;
    use super::InMemoryCoordinator;
    use runloop_core::model::identifiers::RunId;

    #[test]
    fn submit_then_drain_reaches_all_done() {
        let coordinator = InMemoryCoordinator::new();
        let run_id = RunId::new("run-1");
        coordinator.submit_run(&run_id, 2);

        coordinator.task_started(&run_id).expect("start 1");
        coordinator.task_started(&run_id).expect("start 2");
        let mid = coordinator.counts(&run_id).expect("counts");
        assert!(!mid.is_drained());

        coordinator.task_completed(&run_id).expect("complete 1");
        coordinator.task_failed(&run_id).expect("complete 2");
        let end = coordinator.counts(&run_id).expect("counts");
        assert!(end.is_drained());
        assert_eq!(end.done, 2);
    }

    #[test]
    fn unknown_run_is_rejected() {
        let coordinator = InMemoryCoordinator::new();
        assert_eq!(
            coordinator.task_started(&RunId::new("ghost")),
            Err(CoordinatorError::UnknownRun(RunId::new("ghost")))
        );
    }

    #[test]
    fn forget_removes_tracking() {
        let coordinator = InMemoryCoordinator::new();
        let run_id = RunId::new("run-1");
        coordinator.submit_run(&run_id, 1);
        coordinator.forget(&run_id);
        assert_eq!(coordinator.counts(&run_id), None);
    }
}
