// runloop-dispatch/src/lock.rs
// ============================================================================
// Module: Distributed Lock
// Description: TTL-based mutual exclusion keyed by an arbitrary string.
// Purpose: Let two workers agree on which of them owns a task without a
//          central scheduler serializing every dequeue.
// Dependencies: runloop_core::model::identifiers, std::{collections, sync, time}
// ============================================================================

//! ## Overview
//! [`Lock`] is the trait seam; [`InMemoryLock`] is the concrete reference
//! implementation. A lock is held by a [`HolderId`] for a bounded TTL;
//! holding past expiry is not prevented (there is no fencing token), callers
//! needing that guarantee must layer it on top. Reacquisition by the same
//! holder before expiry is idempotent and extends the TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use runloop_core::model::identifiers::HolderId;

/// Error raised by a [`Lock`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    /// The key is held by a different holder.
    #[error("lock '{0}' is held by another holder")]
    LockHeld(String),
    /// The caller's lease on the key has already expired.
    #[error("lock '{0}' lease has expired")]
    LockExpired(String),
    /// The caller does not hold the key at all.
    #[error("lock '{0}' is not held")]
    LockNotHeld(String),
}

/// One key's lease state.
#[derive(Debug, Clone)]
struct Lease {
    /// The holder currently owning this key.
    holder: HolderId,
    /// When this lease expires.
    expires_at: Instant,
}

/// TTL-bounded mutual exclusion over string keys.
pub trait Lock: Send + Sync {
    /// Attempts to acquire `key` for `holder` with the given `ttl`.
    /// Reacquisition by the same holder before expiry succeeds and extends
    /// the lease.
    ///
    /// # Errors
    /// Returns [`LockError::LockHeld`] if a different, unexpired holder owns `key`.
    fn acquire(&self, key: &str, holder: &HolderId, ttl: Duration) -> Result<(), LockError>;

    /// Releases `key`, provided `holder` currently owns it.
    ///
    /// # Errors
    /// Returns [`LockError::LockNotHeld`] if `key` is unheld or held by someone else.
    fn release(&self, key: &str, holder: &HolderId) -> Result<(), LockError>;

    /// Extends `holder`'s existing lease on `key` by `ttl` from now.
    ///
    /// # Errors
    /// Returns [`LockError::LockExpired`] if `holder`'s lease already lapsed, or
    /// [`LockError::LockNotHeld`] if `key` is held by someone else or not at all.
    fn extend(&self, key: &str, holder: &HolderId, ttl: Duration) -> Result<(), LockError>;

    /// Returns whether `key` is currently held by any unexpired holder.
    fn is_held(&self, key: &str) -> bool;
}

/// Reference [`Lock`] backed by an in-process map of leases.
#[derive(Default)]
pub struct InMemoryLock {
    leases: Mutex<HashMap<String, Lease>>,
}

impl InMemoryLock {
    /// Creates a lock with no held keys.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Lock for InMemoryLock {
    fn acquire(&self, key: &str, holder: &HolderId, ttl: Duration) -> Result<(), LockError> {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        let mut guard = self.leases.lock().expect("lock mutex poisoned");
        let now = Instant::now();
        if let Some(existing) = guard.get(key) {
            if existing.expires_at > now && &existing.holder != holder {
                return Err(LockError::LockHeld(key.to_string()));
            }
        }
        guard.insert(
            key.to_string(),
            Lease {
                holder: holder.clone(),
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    fn release(&self, key: &str, holder: &HolderId) -> Result<(), LockError> {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        let mut guard = self.leases.lock().expect("lock mutex poisoned");
        match guard.get(key) {
            Some(lease) if &lease.holder == holder => {
                guard.remove(key);
                Ok(())
            }
            _ => Err(LockError::LockNotHeld(key.to_string())),
        }
    }

    fn extend(&self, key: &str, holder: &HolderId, ttl: Duration) -> Result<(), LockError> {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        let mut guard = self.leases.lock().expect("lock mutex poisoned");
        let now = Instant::now();
        match guard.get_mut(key) {
            Some(lease) if &lease.holder == holder && lease.expires_at > now => {
                lease.expires_at = now + ttl;
                Ok(())
            }
            Some(lease) if &lease.holder == holder => Err(LockError::LockExpired(key.to_string())),
            _ => Err(LockError::LockNotHeld(key.to_string())),
        }
    }

    fn is_held(&self, key: &str) -> bool {
        #[allow(clippy::expect_used, reason = "poisoned mutex is an unrecoverable bug, not a normal error path")]
        let guard = self.leases.lock().expect("lock mutex poisoned");
        guard.get(key).is_some_and(|lease| lease.expires_at > Instant::now())
    }
}

/// A `Clone`-able handle to any [`Lock`] implementation.
#[derive(Clone)]
pub struct SharedLock {
    inner: Arc<dyn Lock>,
}

impl SharedLock {
    /// Wraps an existing lock behind a shared handle.
    #[must_use]
    pub fn new(inner: Arc<dyn Lock>) -> Self {
        Self { inner }
    }
}

impl Lock for SharedLock {
    fn acquire(&self, key: &str, holder: &HolderId, ttl: Duration) -> Result<(), LockError> {
        self.inner.acquire(key, holder, ttl)
    }

    fn release(&self, key: &str, holder: &HolderId) -> Result<(), LockError> {
        self.inner.release(key, holder)
    }

    fn extend(&self, key: &str, holder: &HolderId, ttl: Duration) -> Result<(), LockError> {
        self.inner.extend(key, holder, ttl)
    }

    fn is_held(&self, key: &str) -> bool {
        self.inner.is_held(key)
    }
}

/// Retry policy for [`acquire_with_retry`].
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Delay between acquisition attempts.
    pub interval: Duration,
    /// Maximum number of attempts before giving up.
    pub max_attempts: u32,
}

impl RetryConfig {
    /// Builds a retry policy.
    #[must_use]
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self { interval, max_attempts }
    }
}

/// Repeatedly attempts `lock.acquire(key, holder, ttl)`, sleeping `config.interval`
/// between attempts, stopping early if `cancelled` starts returning true.
///
/// # Errors
/// Returns the last [`LockError`] observed once `config.max_attempts` is exhausted
/// or `cancelled` reports true.
pub fn acquire_with_retry(
    lock: &dyn Lock,
    key: &str,
    holder: &HolderId,
    ttl: Duration,
    config: RetryConfig,
    cancelled: &dyn Fn() -> bool,
) -> Result<(), LockError> {
    let mut last_error = LockError::LockHeld(key.to_string());
    for attempt in 0..config.max_attempts {
        match lock.acquire(key, holder, ttl) {
            Ok(()) => return Ok(()),
            Err(error) => last_error = error,
        }
        if cancelled() {
            return Err(last_error);
        }
        if attempt + 1 < config.max_attempts {
            std::thread::sleep(config.interval);
        }
    }
    Err(last_error)
}

#[cfg(test)]
mod tests {
    use super::acquire_with_retry;
    use super::InMemoryLock;
    use super::Lock;
    use super::LockError;
    use super::RetryConfig;
    use runloop_core::model::identifiers::HolderId;
    use std::time::Duration;

    #[test]
    fn second_holder_is_refused_while_lease_is_live() {
        let lock = InMemoryLock::new();
        let holder_a = HolderId::new("a");
        let holder_b = HolderId::new("b");

        lock.acquire("task-1", &holder_a, Duration::from_secs(60)).expect("acquire");
        assert_eq!(lock.acquire("task-1", &holder_b, Duration::from_secs(60)), Err(LockError::LockHeld("task-1".to_string())));
    }

    #[test]
    fn same_holder_reacquisition_is_idempotent() {
        let lock = InMemoryLock::new();
        let holder = HolderId::new("a");

        lock.acquire("task-1", &holder, Duration::from_secs(60)).expect("acquire");
        lock.acquire("task-1", &holder, Duration::from_secs(60)).expect("reacquire");
    }

    #[test]
    fn expired_lease_can_be_taken_by_another_holder() {
        let lock = InMemoryLock::new();
        let holder_a = HolderId::new("a");
        let holder_b = HolderId::new("b");

        lock.acquire("task-1", &holder_a, Duration::from_millis(10)).expect("acquire");
        std::thread::sleep(Duration::from_millis(30));
        lock.acquire("task-1", &holder_b, Duration::from_secs(60)).expect("acquire after expiry");
    }

    #[test]
    fn release_by_non_holder_fails() {
        let lock = InMemoryLock::new();
        let holder_a = HolderId::new("a");
        let holder_b = HolderId::new("b");

        lock.acquire("task-1", &holder_a, Duration::from_secs(60)).expect("acquire");
        assert_eq!(lock.release("task-1", &holder_b), Err(LockError::LockNotHeld("task-1".to_string())));
    }

    #[test]
    fn extend_refreshes_the_ttl() {
        let lock = InMemoryLock::new();
        let holder = HolderId::new("a");

        lock.acquire("task-1", &holder, Duration::from_millis(20)).expect("acquire");
        lock.extend("task-1", &holder, Duration::from_secs(60)).expect("extend");
        std::thread::sleep(Duration::from_millis(30));
        assert!(lock.is_held("task-1"));
    }

    #[test]
    fn acquire_with_retry_succeeds_once_the_lease_expires() {
        let lock = InMemoryLock::new();
        let holder_a = HolderId::new("a");
        let holder_b = HolderId::new("b");

        lock.acquire("task-1", &holder_a, Duration::from_millis(10)).expect("acquire");
        let result = acquire_with_retry(
            &lock,
            "task-1",
            &holder_b,
            Duration::from_secs(60),
            RetryConfig::new(Duration::from_millis(15), 10),
            &|| false,
        );
        assert!(result.is_ok());
    }
}
