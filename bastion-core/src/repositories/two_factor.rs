//! Repository trait for two-factor enrollment records.

use async_trait::async_trait;

use crate::{Error, storage::TwoFactorRecord};

/// Storage operations for per-account two-factor state.
///
/// A record exists only for accounts with two-factor enabled; the in-progress
/// setup state is never persisted. Backup-code consumption is written through
/// `upsert_record` under the service's per-key lock, so a redeemed code is
/// marked used in the same persisted update that accepts it.
#[async_trait]
pub trait TwoFactorRepository: Send + Sync + 'static {
    /// Load the record for an account, or `None` if two-factor is not enabled.
    async fn get_record(&self, account: &str) -> Result<Option<TwoFactorRecord>, Error>;

    /// Create or replace the record for an account.
    async fn upsert_record(&self, account: &str, record: &TwoFactorRecord) -> Result<(), Error>;

    /// Delete the record for an account. Deleting a missing record is a no-op.
    async fn delete_record(&self, account: &str) -> Result<(), Error>;
}
