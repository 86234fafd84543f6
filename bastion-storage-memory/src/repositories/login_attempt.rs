//! In-memory implementation of the login-attempt repository.

use std::sync::Arc;

use async_trait::async_trait;
use bastion_core::{
    Error,
    repositories::LoginAttemptRepository,
    storage::{LoginAttemptInfo, login_attempts_key},
};

use crate::MemoryStorage;

pub struct MemoryLoginAttemptRepository {
    storage: Arc<MemoryStorage>,
}

impl MemoryLoginAttemptRepository {
    pub fn new(storage: Arc<MemoryStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl LoginAttemptRepository for MemoryLoginAttemptRepository {
    async fn get_attempts(&self, user_id: &str) -> Result<Option<LoginAttemptInfo>, Error> {
        Ok(self.storage.get_json(&login_attempts_key(user_id)))
    }

    async fn set_attempts(&self, user_id: &str, info: &LoginAttemptInfo) -> Result<(), Error> {
        self.storage.set_json(&login_attempts_key(user_id), info)
    }

    async fn clear_attempts(&self, user_id: &str) -> Result<(), Error> {
        self.storage.delete(&login_attempts_key(user_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_roundtrip_and_clear() {
        let repo = MemoryLoginAttemptRepository::new(Arc::new(MemoryStorage::new()));

        assert!(repo.get_attempts("alice").await.unwrap().is_none());

        let info = LoginAttemptInfo {
            count: 3,
            first_attempt_at: Utc::now(),
        };
        repo.set_attempts("alice", &info).await.unwrap();

        let loaded = repo.get_attempts("alice").await.unwrap().unwrap();
        assert_eq!(loaded.count, 3);

        repo.clear_attempts("alice").await.unwrap();
        assert!(repo.get_attempts("alice").await.unwrap().is_none());
        // Clearing again is a no-op.
        repo.clear_attempts("alice").await.unwrap();
    }
}
