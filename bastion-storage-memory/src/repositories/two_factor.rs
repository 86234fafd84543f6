//! In-memory implementation of the two-factor repository.

use std::sync::Arc;

use async_trait::async_trait;
use bastion_core::{
    Error,
    repositories::TwoFactorRepository,
    storage::{TwoFactorRecord, two_factor_key},
};

use crate::MemoryStorage;

pub struct MemoryTwoFactorRepository {
    storage: Arc<MemoryStorage>,
}

impl MemoryTwoFactorRepository {
    pub fn new(storage: Arc<MemoryStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl TwoFactorRepository for MemoryTwoFactorRepository {
    async fn get_record(&self, account: &str) -> Result<Option<TwoFactorRecord>, Error> {
        Ok(self.storage.get_json(&two_factor_key(account)))
    }

    async fn upsert_record(&self, account: &str, record: &TwoFactorRecord) -> Result<(), Error> {
        self.storage.set_json(&two_factor_key(account), record)
    }

    async fn delete_record(&self, account: &str) -> Result<(), Error> {
        self.storage.delete(&two_factor_key(account));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bastion_core::storage::BackupCode;
    use chrono::Utc;

    #[tokio::test]
    async fn test_roundtrip_preserves_backup_code_state() {
        let repo = MemoryTwoFactorRepository::new(Arc::new(MemoryStorage::new()));

        let record = TwoFactorRecord {
            enabled: true,
            secret: "JBSWY3DPEHPK3PXP".to_string(),
            verified_at: Utc::now(),
            backup_codes: vec![
                BackupCode::new("hash-a".to_string()),
                BackupCode {
                    code_hash: "hash-b".to_string(),
                    used_at: Some(Utc::now()),
                },
            ],
        };
        repo.upsert_record("alice", &record).await.unwrap();

        let loaded = repo.get_record("alice").await.unwrap().unwrap();
        assert_eq!(loaded.secret, record.secret);
        assert_eq!(loaded.backup_codes_remaining(), 1);

        repo.delete_record("alice").await.unwrap();
        assert!(repo.get_record("alice").await.unwrap().is_none());
    }
}
