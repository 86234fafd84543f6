//! Repository trait for failed-login tracking.

use async_trait::async_trait;

use crate::{Error, storage::LoginAttemptInfo};

/// Storage operations for per-user failed-login counters.
///
/// Records are keyed by user identifier and cover one lockout cycle each.
/// Expiry is decided by the service; the repository only loads and stores.
#[async_trait]
pub trait LoginAttemptRepository: Send + Sync + 'static {
    /// Load the attempt record for a user, or `None` if no record exists.
    async fn get_attempts(&self, user_id: &str) -> Result<Option<LoginAttemptInfo>, Error>;

    /// Store the attempt record for a user, replacing any existing record.
    async fn set_attempts(&self, user_id: &str, info: &LoginAttemptInfo) -> Result<(), Error>;

    /// Delete the attempt record for a user. Deleting a missing record is a no-op.
    async fn clear_attempts(&self, user_id: &str) -> Result<(), Error>;
}
