//! In-memory implementation of the rate-limit repository.

use std::sync::Arc;

use async_trait::async_trait;
use bastion_core::{
    Error,
    repositories::RateLimitRepository,
    storage::{RateLimitAction, RateLimitState, rate_limit_key},
};

use crate::MemoryStorage;

pub struct MemoryRateLimitRepository {
    storage: Arc<MemoryStorage>,
}

impl MemoryRateLimitRepository {
    pub fn new(storage: Arc<MemoryStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl RateLimitRepository for MemoryRateLimitRepository {
    async fn get_state(
        &self,
        action: RateLimitAction,
        identifier: &str,
    ) -> Result<Option<RateLimitState>, Error> {
        Ok(self.storage.get_json(&rate_limit_key(action, identifier)))
    }

    async fn set_state(
        &self,
        action: RateLimitAction,
        identifier: &str,
        state: &RateLimitState,
    ) -> Result<(), Error> {
        self.storage.set_json(&rate_limit_key(action, identifier), state)
    }

    async fn delete_state(&self, action: RateLimitAction, identifier: &str) -> Result<(), Error> {
        self.storage.delete(&rate_limit_key(action, identifier));
        Ok(())
    }
}
