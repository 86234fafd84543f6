//! Repository trait for sliding-window rate-limit state.

use async_trait::async_trait;

use crate::{
    Error,
    storage::{RateLimitAction, RateLimitState},
};

/// Storage operations for per-key rate-limit state.
///
/// One record exists per `action:identifier` pair, created lazily on first
/// use. Implementations must treat an undecodable stored record as absent so
/// a corrupt bucket self-heals instead of failing every check for that key.
#[async_trait]
pub trait RateLimitRepository: Send + Sync + 'static {
    /// Load the state for a key, or `None` if no record exists.
    async fn get_state(
        &self,
        action: RateLimitAction,
        identifier: &str,
    ) -> Result<Option<RateLimitState>, Error>;

    /// Store the state for a key, replacing any existing record.
    async fn set_state(
        &self,
        action: RateLimitAction,
        identifier: &str,
        state: &RateLimitState,
    ) -> Result<(), Error>;

    /// Delete the state for a key. Deleting a missing record is a no-op.
    async fn delete_state(&self, action: RateLimitAction, identifier: &str) -> Result<(), Error>;
}
