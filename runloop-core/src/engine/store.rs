// runloop-core/src/engine/store.rs
// ============================================================================
// Module: Run Store
// Description: Durable storage seam for `Run` state, keyed by `RunId`.
// Purpose: Let the engine persist and resume runs without depending on any
//          concrete storage technology.
// Dependencies: crate::model::{identifiers, state}, std::{collections, sync}
// ============================================================================

//! ## Overview
//! [`RunStore`] is the trait object seam; [`InMemoryRunStore`] is the
//! concrete reference implementation backed by a `Mutex<BTreeMap<...>>`, and
//! [`SharedRunStore`] is a cheaply `Clone`-able wrapper around any
//! `Arc<dyn RunStore>` for embedders that need to hand the same store to
//! multiple engine instances.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use crate::model::identifiers::RunId;
use crate::model::state::Run;

/// Error raised by a [`RunStore`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No run exists under the given id.
    #[error("no run found for id: {0}")]
    NotFound(RunId),
    /// The underlying storage backend failed.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Persists and retrieves [`Run`] state.
pub trait RunStore: Send + Sync {
    /// Inserts or replaces the run under its own id.
    ///
    /// # Errors
    /// Returns [`StoreError::Backend`] if the write fails.
    fn put(&self, run: Run) -> Result<(), StoreError>;

    /// Retrieves the run stored under `run_id`.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if no run is stored under `run_id`,
    /// or [`StoreError::Backend`] if the read fails.
    fn get(&self, run_id: &RunId) -> Result<Run, StoreError>;

    /// Lists the ids of every stored run.
    ///
    /// # Errors
    /// Returns [`StoreError::Backend`] if the listing fails.
    fn list_ids(&self) -> Result<Vec<RunId>, StoreError>;
}

/// Reference [`RunStore`] backed by an in-process map.
#[derive(Default)]
pub struct InMemoryRunStore {
    runs: Mutex<BTreeMap<RunId, Run>>,
}

impl InMemoryRunStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunStore for InMemoryRunStore {
    fn put(&self, run: Run) -> Result<(), StoreError> {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        let mut guard = self.runs.lock().expect("run store mutex poisoned");
        guard.insert(run.run_id.clone(), run);
        Ok(())
    }

    fn get(&self, run_id: &RunId) -> Result<Run, StoreError> {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        let guard = self.runs.lock().expect("run store mutex poisoned");
        guard.get(run_id).cloned().ok_or_else(|| StoreError::NotFound(run_id.clone()))
    }

    fn list_ids(&self) -> Result<Vec<RunId>, StoreError> {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        let guard = self.runs.lock().expect("run store mutex poisoned");
        Ok(guard.keys().cloned().collect())
    }
}

/// A `Clone`-able handle to any [`RunStore`] implementation, sharable across
/// engine instances without exposing the concrete backing type.
#[derive(Clone)]
pub struct SharedRunStore {
    inner: Arc<dyn RunStore>,
}

impl SharedRunStore {
    /// Wraps an existing store behind a shared handle.
    #[must_use]
    pub fn new(inner: Arc<dyn RunStore>) -> Self {
        Self { inner }
    }
}

impl RunStore for SharedRunStore {
    fn put(&self, run: Run) -> Result<(), StoreError> {
        self.inner.put(run)
    }

    fn get(&self, run_id: &RunId) -> Result<Run, StoreError> {
        self.inner.get(run_id)
    }

    fn list_ids(&self) -> Result<Vec<RunId>, StoreError> {
        self.inner.list_ids()
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryRunStore;
    use super::RunStore;
    use super::SharedRunStore;
    use crate::model::identifiers::RunId;
    use crate::model::state::Run;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    #[test]
    fn put_then_get_round_trips_a_run() {
        let store = InMemoryRunStore::new();
        let run = Run::new(RunId::new("run-1"), "find the bug", 0, BTreeMap::new());

        assert!(store.put(run.clone()).is_ok());
        let fetched = store.get(&RunId::new("run-1"));
        assert!(fetched.is_ok());
    }

    #[test]
    fn get_on_unknown_id_is_not_found() {
        let store = InMemoryRunStore::new();
        assert!(store.get(&RunId::new("missing")).is_err());
    }

    #[test]
    fn shared_store_delegates_to_the_same_backing_instance() {
        let inner = Arc::new(InMemoryRunStore::new());
        let shared_a = SharedRunStore::new(inner.clone());
        let shared_b = shared_a.clone();
        let run = Run::new(RunId::new("run-1"), "find the bug", 0, BTreeMap::new());

        assert!(shared_a.put(run).is_ok());
        assert!(shared_b.get(&RunId::new("run-1")).is_ok());
    }
}
