//! Sliding-window rate limiting service.
//!
//! Throttles repeated actions per identifier using a sliding time window,
//! with an escalating block once the window's quota is exceeded. The sliding
//! window (rather than fixed buckets) avoids burst-at-boundary abuse; the
//! separate block timestamp keeps a cooldown in force even after the original
//! requests have aged out of the window.
//!
//! All expiry is lazy: stored timestamps are compared to the injected clock
//! on each check, never by a background timer.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    Error,
    clock::Clock,
    repositories::RateLimitRepository,
    storage::{
        DEFAULT_IDENTIFIER, RateLimitAction, RateLimitConfig, RateLimitDecision, RateLimitState,
        RateLimitStatus, rate_limit_key,
    },
    sync::KeyedLocks,
};

/// Service enforcing per-action, per-identifier request quotas.
///
/// # Thread Safety
///
/// This service is thread-safe and can be shared across multiple tasks.
/// Read-modify-write cycles for a given `action:identifier` key are
/// serialized through a per-key lock.
pub struct RateLimitService<R: RateLimitRepository> {
    repository: Arc<R>,
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks,
}

impl<R: RateLimitRepository> RateLimitService<R> {
    pub fn new(repository: Arc<R>, config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            config,
            clock,
            locks: KeyedLocks::new(),
        }
    }

    /// Get the current configuration.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Check whether an action is rate limited, recording the request if not.
    ///
    /// An empty identifier degrades to a shared default bucket rather than
    /// failing; callers wanting per-subject limits must supply a stable key
    /// such as a user id or IP address.
    pub async fn check(
        &self,
        action: RateLimitAction,
        identifier: &str,
    ) -> Result<RateLimitDecision, Error> {
        let identifier = normalize_identifier(identifier);
        let quota = self.config.quota_for(action);
        let _guard = self.locks.acquire(&rate_limit_key(action, identifier)).await;

        let now = self.clock.now();
        let mut state = self
            .repository
            .get_state(action, identifier)
            .await?
            .unwrap_or_default();

        // An active block denies the call without recording it.
        if let Some(until) = state.blocked_until {
            if until > now {
                return Ok(RateLimitDecision::limited(ceil_seconds_until(now, until)));
            }
        }

        state.prune(now, quota.window);

        if state.requests.len() as u32 >= quota.max_requests {
            state.blocked_until = Some(now + quota.block_duration);
            self.repository.set_state(action, identifier, &state).await?;
            warn!(
                action = %action,
                identifier = identifier,
                block_seconds = quota.block_duration.num_seconds(),
                "Rate limit exceeded, block engaged"
            );
            return Ok(RateLimitDecision::limited(
                quota.block_duration.num_seconds().max(0) as u64,
            ));
        }

        state.requests.push(now);
        self.repository.set_state(action, identifier, &state).await?;

        let remaining = quota.max_requests - state.requests.len() as u32;
        debug!(action = %action, identifier = identifier, remaining, "Request accepted");
        Ok(RateLimitDecision::allowed(remaining))
    }

    /// Unconditionally delete the state for a key.
    ///
    /// Used for administrative override or after successful completion of a
    /// sensitive flow (e.g. clearing the login limiter on successful login).
    /// A no-op for keys with no state.
    pub async fn reset(&self, action: RateLimitAction, identifier: &str) -> Result<(), Error> {
        let identifier = normalize_identifier(identifier);
        let _guard = self.locks.acquire(&rate_limit_key(action, identifier)).await;
        self.repository.delete_state(action, identifier).await
    }

    /// Read-only projection of the current state. Never records a request.
    pub async fn status(
        &self,
        action: RateLimitAction,
        identifier: &str,
    ) -> Result<RateLimitStatus, Error> {
        let identifier = normalize_identifier(identifier);
        let quota = self.config.quota_for(action);
        let now = self.clock.now();

        let mut state = self
            .repository
            .get_state(action, identifier)
            .await?
            .unwrap_or_default();
        state.prune(now, quota.window);

        let is_blocked = state.is_blocked(now);
        Ok(RateLimitStatus {
            requests_used: state.requests.len() as u32,
            max_requests: quota.max_requests,
            window: quota.window,
            is_blocked,
            blocked_until: if is_blocked { state.blocked_until } else { None },
        })
    }
}

fn normalize_identifier(identifier: &str) -> &str {
    if identifier.is_empty() {
        DEFAULT_IDENTIFIER
    } else {
        identifier
    }
}

fn ceil_seconds_until(now: chrono::DateTime<chrono::Utc>, until: chrono::DateTime<chrono::Utc>) -> u64 {
    let ms = (until - now).num_milliseconds().max(0);
    ((ms + 999) / 1000) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Mock repository for testing
    #[derive(Default)]
    struct MockRateLimitRepository {
        states: Mutex<HashMap<String, RateLimitState>>,
    }

    #[async_trait]
    impl RateLimitRepository for MockRateLimitRepository {
        async fn get_state(
            &self,
            action: RateLimitAction,
            identifier: &str,
        ) -> Result<Option<RateLimitState>, Error> {
            Ok(self
                .states
                .lock()
                .unwrap()
                .get(&rate_limit_key(action, identifier))
                .cloned())
        }

        async fn set_state(
            &self,
            action: RateLimitAction,
            identifier: &str,
            state: &RateLimitState,
        ) -> Result<(), Error> {
            self.states
                .lock()
                .unwrap()
                .insert(rate_limit_key(action, identifier), state.clone());
            Ok(())
        }

        async fn delete_state(
            &self,
            action: RateLimitAction,
            identifier: &str,
        ) -> Result<(), Error> {
            self.states
                .lock()
                .unwrap()
                .remove(&rate_limit_key(action, identifier));
            Ok(())
        }
    }

    fn service_with_clock() -> (RateLimitService<MockRateLimitRepository>, Arc<TestClock>) {
        let clock = Arc::new(TestClock::new(Utc::now()));
        let service = RateLimitService::new(
            Arc::new(MockRateLimitRepository::default()),
            RateLimitConfig::default(),
            clock.clone(),
        );
        (service, clock)
    }

    #[tokio::test]
    async fn test_quota_allows_then_limits() {
        let (service, _clock) = service_with_clock();

        // Login quota is 5 per minute.
        for used in 1..=5u32 {
            let decision = service
                .check(RateLimitAction::Login, "user-1")
                .await
                .unwrap();
            assert!(!decision.limited);
            assert_eq!(decision.remaining_requests, Some(5 - used));
        }

        let decision = service
            .check(RateLimitAction::Login, "user-1")
            .await
            .unwrap();
        assert!(decision.limited);
        // Block duration for login is 5 minutes.
        assert_eq!(decision.retry_after_secs, Some(300));
    }

    #[tokio::test]
    async fn test_window_slides() {
        let (service, clock) = service_with_clock();

        for _ in 0..5 {
            service.check(RateLimitAction::Login, "user-1").await.unwrap();
        }

        // Once the original requests age out, new calls succeed again.
        clock.advance(Duration::seconds(61));
        let decision = service
            .check(RateLimitAction::Login, "user-1")
            .await
            .unwrap();
        assert!(!decision.limited);
    }

    #[tokio::test]
    async fn test_block_persists_past_window_expiry() {
        let (service, clock) = service_with_clock();

        for _ in 0..6 {
            service.check(RateLimitAction::Login, "user-1").await.unwrap();
        }

        // Two minutes in, the request window has fully expired but the
        // 5-minute block is still in force.
        clock.advance(Duration::minutes(2));
        let decision = service
            .check(RateLimitAction::Login, "user-1")
            .await
            .unwrap();
        assert!(decision.limited);
        assert_eq!(decision.retry_after_secs, Some(180));

        clock.advance(Duration::minutes(3));
        let decision = service
            .check(RateLimitAction::Login, "user-1")
            .await
            .unwrap();
        assert!(!decision.limited);
    }

    #[tokio::test]
    async fn test_blocked_call_is_not_recorded() {
        let (service, clock) = service_with_clock();

        for _ in 0..6 {
            service.check(RateLimitAction::Login, "user-1").await.unwrap();
        }
        // Hammering while blocked must not extend anything.
        for _ in 0..10 {
            let decision = service
                .check(RateLimitAction::Login, "user-1")
                .await
                .unwrap();
            assert!(decision.limited);
        }

        clock.advance(Duration::seconds(301));
        let decision = service
            .check(RateLimitAction::Login, "user-1")
            .await
            .unwrap();
        assert!(!decision.limited);
    }

    #[tokio::test]
    async fn test_status_does_not_count_as_attempt() {
        let (service, _clock) = service_with_clock();

        service.check(RateLimitAction::Login, "user-1").await.unwrap();
        for _ in 0..20 {
            let status = service
                .status(RateLimitAction::Login, "user-1")
                .await
                .unwrap();
            assert_eq!(status.requests_used, 1);
            assert!(!status.is_blocked);
        }
    }

    #[tokio::test]
    async fn test_status_for_unknown_key() {
        let (service, _clock) = service_with_clock();

        let status = service
            .status(RateLimitAction::Withdraw, "nobody")
            .await
            .unwrap();
        assert_eq!(status.requests_used, 0);
        assert_eq!(status.max_requests, 5);
        assert!(!status.is_blocked);
        assert!(status.blocked_until.is_none());
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let (service, _clock) = service_with_clock();

        for _ in 0..6 {
            service.check(RateLimitAction::Signup, "user-1").await.unwrap();
        }
        service.reset(RateLimitAction::Signup, "user-1").await.unwrap();
        // Resetting an already-clean key is a no-op.
        service.reset(RateLimitAction::Signup, "user-1").await.unwrap();

        let decision = service
            .check(RateLimitAction::Signup, "user-1")
            .await
            .unwrap();
        assert!(!decision.limited);
        assert_eq!(decision.remaining_requests, Some(2));
    }

    #[tokio::test]
    async fn test_identifiers_are_independent() {
        let (service, _clock) = service_with_clock();

        for _ in 0..6 {
            service.check(RateLimitAction::Login, "user-1").await.unwrap();
        }
        let decision = service
            .check(RateLimitAction::Login, "user-2")
            .await
            .unwrap();
        assert!(!decision.limited);
    }

    #[tokio::test]
    async fn test_actions_are_independent() {
        let (service, _clock) = service_with_clock();

        for _ in 0..6 {
            service.check(RateLimitAction::Login, "user-1").await.unwrap();
        }
        let decision = service
            .check(RateLimitAction::Trade, "user-1")
            .await
            .unwrap();
        assert!(!decision.limited);
    }

    #[tokio::test]
    async fn test_empty_identifier_shares_default_bucket() {
        let (service, _clock) = service_with_clock();

        service.check(RateLimitAction::Login, "").await.unwrap();
        let status = service
            .status(RateLimitAction::Login, DEFAULT_IDENTIFIER)
            .await
            .unwrap();
        assert_eq!(status.requests_used, 1);
    }
}
