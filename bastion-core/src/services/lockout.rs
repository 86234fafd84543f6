//! Login lockout service.
//!
//! Enforces a hard lockout after a fixed number of consecutive failed login
//! attempts per user, expiring automatically a fixed duration after the
//! first failure of the cycle. Expiry is lazy: a stale record is purged the
//! next time it is read, not by a background timer.
//!
//! This is a local defense-in-depth mechanism, not a substitute for
//! credential verification, which happens in the calling layer.

use std::sync::Arc;

use chrono::Duration;
use tracing::{info, warn};

use crate::{
    Error,
    clock::Clock,
    repositories::LoginAttemptRepository,
    storage::{LockoutConfig, LockoutStatus, LoginAttemptInfo, login_attempts_key},
    sync::KeyedLocks,
};

/// Service tracking failed logins and enforcing account lockout.
///
/// An empty user id is never tracked and never locked; callers must supply a
/// real identifier before relying on this protection.
pub struct LockoutService<R: LoginAttemptRepository> {
    repository: Arc<R>,
    config: LockoutConfig,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks,
}

impl<R: LoginAttemptRepository> LockoutService<R> {
    pub fn new(repository: Arc<R>, config: LockoutConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            config,
            clock,
            locks: KeyedLocks::new(),
        }
    }

    /// Get the current configuration.
    pub fn config(&self) -> &LockoutConfig {
        &self.config
    }

    /// Record a failed login attempt and return the updated lockout status.
    ///
    /// The count keeps growing past the lockout threshold, though further
    /// failures have no additional effect once the account is locked.
    pub async fn record_failed_attempt(&self, user_id: &str) -> Result<LockoutStatus, Error> {
        if user_id.is_empty() {
            return Ok(LockoutStatus::clean(user_id));
        }

        let _guard = self.locks.acquire(&login_attempts_key(user_id)).await;
        let now = self.clock.now();

        let info = match self.get_active(user_id).await? {
            Some(mut info) => {
                info.count += 1;
                info
            }
            None => LoginAttemptInfo {
                count: 1,
                first_attempt_at: now,
            },
        };
        self.repository.set_attempts(user_id, &info).await?;

        let status = self.status_from(user_id, &info);
        if info.count == self.config.max_failed_attempts {
            warn!(
                user_id = user_id,
                attempts = info.count,
                "Account locked after repeated failed logins"
            );
        }
        Ok(status)
    }

    /// Delete the attempt record entirely. Called on successful
    /// authentication. A no-op for users with no record.
    pub async fn clear_attempts(&self, user_id: &str) -> Result<(), Error> {
        if user_id.is_empty() {
            return Ok(());
        }
        let _guard = self.locks.acquire(&login_attempts_key(user_id)).await;
        self.repository.clear_attempts(user_id).await?;
        info!(user_id = user_id, "Cleared failed login attempts");
        Ok(())
    }

    /// Whether the user is currently locked out.
    pub async fn is_locked_out(&self, user_id: &str) -> Result<bool, Error> {
        Ok(self.get_status(user_id).await?.is_locked)
    }

    /// Current lockout status, purging an expired record as a side effect.
    pub async fn get_status(&self, user_id: &str) -> Result<LockoutStatus, Error> {
        if user_id.is_empty() {
            return Ok(LockoutStatus::clean(user_id));
        }

        let _guard = self.locks.acquire(&login_attempts_key(user_id)).await;
        match self.get_active(user_id).await? {
            Some(info) => Ok(self.status_from(user_id, &info)),
            None => Ok(LockoutStatus::clean(user_id)),
        }
    }

    /// Time until the lockout lifts. Zero when not locked out.
    pub async fn lockout_time_remaining(&self, user_id: &str) -> Result<Duration, Error> {
        let status = self.get_status(user_id).await?;
        if !status.is_locked {
            return Ok(Duration::zero());
        }
        let now = self.clock.now();
        Ok(status
            .locked_until
            .map(|until| (until - now).max(Duration::zero()))
            .unwrap_or_else(Duration::zero))
    }

    /// Load the record for a user, deleting it first if its cycle expired.
    async fn get_active(&self, user_id: &str) -> Result<Option<LoginAttemptInfo>, Error> {
        let Some(info) = self.repository.get_attempts(user_id).await? else {
            return Ok(None);
        };
        if info.is_expired(self.clock.now(), self.config.lockout_duration) {
            self.repository.clear_attempts(user_id).await?;
            return Ok(None);
        }
        Ok(Some(info))
    }

    fn status_from(&self, user_id: &str, info: &LoginAttemptInfo) -> LockoutStatus {
        let is_locked = info.count >= self.config.max_failed_attempts;
        LockoutStatus {
            user_id: user_id.to_string(),
            failed_attempts: info.count,
            is_locked,
            locked_until: if is_locked {
                Some(info.first_attempt_at + self.config.lockout_duration)
            } else {
                None
            },
        }
    }
}
