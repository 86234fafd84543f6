//! Adapters that wrap a [`RepositoryProvider`] and implement the individual
//! repository traits, so services generic over a single repository can be
//! built from a shared provider.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    Error,
    repositories::{
        LoginAttemptRepository, RateLimitRepository, RepositoryProvider, TwoFactorRepository,
    },
    storage::{LoginAttemptInfo, RateLimitAction, RateLimitState, TwoFactorRecord},
};

pub struct RateLimitRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> RateLimitRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> RateLimitRepository for RateLimitRepositoryAdapter<R> {
    async fn get_state(
        &self,
        action: RateLimitAction,
        identifier: &str,
    ) -> Result<Option<RateLimitState>, Error> {
        self.provider.rate_limit().get_state(action, identifier).await
    }

    async fn set_state(
        &self,
        action: RateLimitAction,
        identifier: &str,
        state: &RateLimitState,
    ) -> Result<(), Error> {
        self.provider
            .rate_limit()
            .set_state(action, identifier, state)
            .await
    }

    async fn delete_state(&self, action: RateLimitAction, identifier: &str) -> Result<(), Error> {
        self.provider
            .rate_limit()
            .delete_state(action, identifier)
            .await
    }
}

pub struct LoginAttemptRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> LoginAttemptRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> LoginAttemptRepository for LoginAttemptRepositoryAdapter<R> {
    async fn get_attempts(&self, user_id: &str) -> Result<Option<LoginAttemptInfo>, Error> {
        self.provider.login_attempt().get_attempts(user_id).await
    }

    async fn set_attempts(&self, user_id: &str, info: &LoginAttemptInfo) -> Result<(), Error> {
        self.provider.login_attempt().set_attempts(user_id, info).await
    }

    async fn clear_attempts(&self, user_id: &str) -> Result<(), Error> {
        self.provider.login_attempt().clear_attempts(user_id).await
    }
}

pub struct TwoFactorRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> TwoFactorRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> TwoFactorRepository for TwoFactorRepositoryAdapter<R> {
    async fn get_record(&self, account: &str) -> Result<Option<TwoFactorRecord>, Error> {
        self.provider.two_factor().get_record(account).await
    }

    async fn upsert_record(&self, account: &str, record: &TwoFactorRecord) -> Result<(), Error> {
        self.provider.two_factor().upsert_record(account, record).await
    }

    async fn delete_record(&self, account: &str) -> Result<(), Error> {
        self.provider.two_factor().delete_record(account).await
    }
}
