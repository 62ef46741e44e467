// runloop-core/src/engine/artifact.rs
// ============================================================================
// Module: Artifact Store
// Description: Content-addressed storage seam for large tool outputs that
//              should not be inlined into the evidence log.
// Purpose: Let a tool hand off a large payload (a file, a rendered report)
//          without bloating `Run::evidence`.
// Dependencies: crate::model::hashing, std::{collections, sync}
// ============================================================================

//! ## Overview
//! [`ArtifactStore`] is the trait object seam; [`InMemoryArtifactStore`] is
//! a reference implementation keyed by the content's own [`HashDigest`], so
//! storing the same bytes twice is a no-op. A production embedder supplies
//! its own store backed by object storage or a filesystem.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::model::hashing::hash_bytes;
use crate::model::hashing::HashDigest;
use crate::model::hashing::DEFAULT_HASH_ALGORITHM;

/// Error raised by an [`ArtifactStore`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArtifactError {
    /// No artifact exists under the given digest.
    #[error("no artifact found for digest: {}", .0.value)]
    NotFound(HashDigest),
    /// The underlying storage backend failed.
    #[error("artifact backend error: {0}")]
    Backend(String),
}

/// Stores and retrieves content-addressed byte payloads.
pub trait ArtifactStore: Send + Sync {
    /// Stores `bytes`, returning its content digest.
    ///
    /// # Errors
    /// Returns [`ArtifactError::Backend`] if the write fails.
    fn put(&self, bytes: &[u8]) -> Result<HashDigest, ArtifactError>;

    /// Retrieves the bytes stored under `digest`.
    ///
    /// # Errors
    /// Returns [`ArtifactError::NotFound`] if no artifact is stored under
    /// `digest`, or [`ArtifactError::Backend`] if the read fails.
    fn get(&self, digest: &HashDigest) -> Result<Vec<u8>, ArtifactError>;
}

/// Reference [`ArtifactStore`] backed by an in-process map.
#[derive(Default)]
pub struct InMemoryArtifactStore {
    artifacts: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryArtifactStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn put(&self, bytes: &[u8]) -> Result<HashDigest, ArtifactError> {
        let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, bytes);
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        let mut guard = self.artifacts.lock().expect("artifact store mutex poisoned");
        guard.entry(digest.value.clone()).or_insert_with(|| bytes.to_vec());
        Ok(digest)
    }

    fn get(&self, digest: &HashDigest) -> Result<Vec<u8>, ArtifactError> {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        let guard = self.artifacts.lock().expect("artifact store mutex poisoned");
        guard.get(&digest.value).cloned().ok_or_else(|| ArtifactError::NotFound(digest.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::ArtifactStore;
    use super::InMemoryArtifactStore;

    #[test]
    fn put_then_get_round_trips_the_bytes() {
        let store = InMemoryArtifactStore::new();
        let digest = store.put(b"report contents");

        assert!(digest.is_ok());
        #[allow(clippy::unwrap_used, reason = "checked is_ok above")]
        let digest = digest.unwrap();
        assert_eq!(store.get(&digest).ok(), Some(b"report contents".to_vec()));
    }

    #[test]
    fn storing_the_same_bytes_twice_is_idempotent() {
        let store = InMemoryArtifactStore::new();
        let first = store.put(b"same bytes");
        let second = store.put(b"same bytes");

        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(first.ok(), second.ok());
    }
}
