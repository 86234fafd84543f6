//! Per-key serialization for read-modify-write cycles.
//!
//! Every policy update here is a load, a decision, and a store against a
//! single key. Two concurrent updates for the same key must not interleave
//! (two failed logins both reading count=3 and both writing count=4), so each
//! service guards its cycles with a lock scoped to the storage key. Different
//! keys proceed in parallel.
//!
//! The lock table does not grow without bound: when a guard drops and no
//! other task holds or awaits that key's mutex, the entry is removed. A key
//! touched again later simply recreates it.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A map of lazily created per-key async mutexes.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

/// Holds a key's mutex; releasing it also reclaims the table entry when no
/// other task is using that key.
#[derive(Debug)]
pub struct KeyedGuard {
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    key: String,
}

impl Drop for KeyedGuard {
    fn drop(&mut self) {
        // Release the mutex before inspecting the refcount, so our own clone
        // (held inside the guard) is gone. remove_if holds the shard lock,
        // which makes the count check atomic with respect to `acquire`.
        self.guard.take();
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, creating it on first use.
    pub async fn acquire(&self, key: &str) -> KeyedGuard {
        let lock = self
            .locks
            .entry(key.to_string())
            .or_default()
            .value()
            .clone();
        let guard = lock.lock_owned().await;
        KeyedGuard {
            guard: Some(guard),
            locks: self.locks.clone(),
            key: key.to_string(),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.len()
    }
}
