//! In-memory storage backend for bastion.
//!
//! Records are held in a string-keyed map of JSON documents, one logical
//! record per key, using the same key patterns any other backend would
//! (`loginAttempts:<userId>`, `rateLimit:<action>:<identifier>`,
//! `twoFactor:<accountKey>`). A stored document that no longer deserializes
//! is treated as absent, so a corrupt record self-heals on the next write
//! instead of failing every read of that key.
//!
//! This backend is intended for tests and single-process deployments; it does
//! not survive process restarts. Durable backends implement the same
//! repository traits in `bastion_core::repositories`.

pub mod repositories;

use std::sync::Arc;

use async_trait::async_trait;
use bastion_core::{
    Error,
    error::StorageError,
    repositories::{
        LoginAttemptRepositoryProvider, RateLimitRepositoryProvider, RepositoryProvider,
        TwoFactorRepositoryProvider,
    },
};
use dashmap::DashMap;
use serde::{Serialize, de::DeserializeOwned};
use tracing::warn;

pub use repositories::{
    MemoryLoginAttemptRepository, MemoryRateLimitRepository, MemoryTwoFactorRepository,
};

/// String-keyed JSON document store.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: DashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Load and deserialize the record at `key`.
    ///
    /// A record that fails to deserialize is reported as absent. This favors
    /// availability: a corrupt rate-limit record resets the counter rather
    /// than wedging the key.
    pub(crate) fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.records.get(key)?;
        match serde_json::from_str(raw.value()) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = key, error = %e, "Discarding corrupt stored record");
                None
            }
        }
    }

    pub(crate) fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), Error> {
        let raw = serde_json::to_string(value)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.records.insert(key.to_string(), raw);
        Ok(())
    }

    pub(crate) fn delete(&self, key: &str) {
        self.records.remove(key);
    }

    /// Store a raw document, bypassing serialization. Test hook for
    /// exercising corrupt-record handling.
    pub fn insert_raw(&self, key: &str, raw: &str) {
        self.records.insert(key.to_string(), raw.to_string());
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Repository provider backed by a shared [`MemoryStorage`].
pub struct MemoryRepositoryProvider {
    rate_limit: MemoryRateLimitRepository,
    login_attempt: MemoryLoginAttemptRepository,
    two_factor: MemoryTwoFactorRepository,
}

impl MemoryRepositoryProvider {
    pub fn new() -> Self {
        Self::with_storage(Arc::new(MemoryStorage::new()))
    }

    /// Build a provider over an existing store, e.g. one shared with another
    /// provider instance.
    pub fn with_storage(storage: Arc<MemoryStorage>) -> Self {
        Self {
            rate_limit: MemoryRateLimitRepository::new(storage.clone()),
            login_attempt: MemoryLoginAttemptRepository::new(storage.clone()),
            two_factor: MemoryTwoFactorRepository::new(storage),
        }
    }
}

impl Default for MemoryRepositoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitRepositoryProvider for MemoryRepositoryProvider {
    type RateLimitRepo = MemoryRateLimitRepository;

    fn rate_limit(&self) -> &Self::RateLimitRepo {
        &self.rate_limit
    }
}

impl LoginAttemptRepositoryProvider for MemoryRepositoryProvider {
    type LoginAttemptRepo = MemoryLoginAttemptRepository;

    fn login_attempt(&self) -> &Self::LoginAttemptRepo {
        &self.login_attempt
    }
}

impl TwoFactorRepositoryProvider for MemoryRepositoryProvider {
    type TwoFactorRepo = MemoryTwoFactorRepository;

    fn two_factor(&self) -> &Self::TwoFactorRepo {
        &self.two_factor
    }
}

#[async_trait]
impl RepositoryProvider for MemoryRepositoryProvider {
    async fn health_check(&self) -> Result<(), Error> {
        Ok(())
    }
}
