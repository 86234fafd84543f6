//! # Bastion
//!
//! Bastion is an account-protection toolkit for Rust applications: a
//! sliding-window rate limiter, a failed-login lockout tracker, and a
//! two-factor authentication manager, unified behind one facade over a
//! pluggable storage backend.
//!
//! The three policies are independent — none calls another — but the facade
//! composes them where it matters: every live-code verification path
//! (enrollment confirmation, login verification, disable) is itself rate
//! limited, so a 6-digit TOTP code cannot be brute-forced.
//!
//! ## Storage Support
//!
//! Any backend implementing `bastion_core::repositories::RepositoryProvider`
//! can be used; the crate ships an in-memory backend behind the `memory`
//! feature (enabled by default).
//!
//! ## Example
//!
//! ```rust,no_run
//! use bastion::{Bastion, MemoryRepositoryProvider, RateLimitAction};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let repositories = Arc::new(MemoryRepositoryProvider::new());
//!     let bastion = Bastion::new(repositories);
//!
//!     let decision = bastion
//!         .check_rate_limit(RateLimitAction::Login, "203.0.113.7")
//!         .await
//!         .unwrap();
//!     if decision.limited {
//!         // render "try again in {decision.retry_after_secs:?} seconds"
//!     }
//! }
//! ```

use std::sync::Arc;

use chrono::Duration;
use tracing::warn;

use bastion_core::{
    repositories::{
        LoginAttemptRepositoryAdapter, RateLimitRepositoryAdapter, RepositoryProvider,
        TwoFactorRepositoryAdapter,
    },
    services::{LockoutService, RateLimitService, TwoFactorService},
    totp::{RfcTotp, TotpVerifier},
};

/// Re-export core types from bastion_core
///
/// These types are commonly used when working with the Bastion API.
pub use bastion_core::{
    Clock, CodeCheck, Error, LockoutConfig, LockoutStatus, RateLimitAction, RateLimitConfig,
    RateLimitDecision, RateLimitStatus, SystemClock, TestClock, TwoFactorConfig, TwoFactorStatus,
    services::{
        BackupCodeOutcome, DisableOutcome, EnrollmentOutcome, TwoFactorEnrollment,
    },
};

/// Re-export storage backends
///
/// These storage implementations are available when the corresponding feature
/// is enabled.
#[cfg(feature = "memory")]
pub use bastion_storage_memory::{MemoryRepositoryProvider, MemoryStorage};

/// Configuration for the full protection stack.
#[derive(Debug, Clone, Default)]
pub struct BastionConfig {
    pub rate_limits: RateLimitConfig,
    pub lockout: LockoutConfig,
    pub two_factor: TwoFactorConfig,
}

/// Result of an operation that passes through the two-factor verification
/// rate limiter before reaching the underlying policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gated<T> {
    Allowed(T),
    /// The verification quota for this account is exhausted.
    RateLimited { retry_after_secs: u64 },
}

impl<T> Gated<T> {
    /// The inner outcome, if the gate let the call through.
    pub fn into_allowed(self) -> Option<T> {
        match self {
            Gated::Allowed(value) => Some(value),
            Gated::RateLimited { .. } => None,
        }
    }
}

/// The main facade over the three protection services.
///
/// Generic over a [`RepositoryProvider`], so the same policies run against
/// any storage backend.
pub struct Bastion<R: RepositoryProvider> {
    repositories: Arc<R>,
    rate_limit: RateLimitService<RateLimitRepositoryAdapter<R>>,
    lockout: LockoutService<LoginAttemptRepositoryAdapter<R>>,
    two_factor: TwoFactorService<TwoFactorRepositoryAdapter<R>>,
}

impl<R: RepositoryProvider> Bastion<R> {
    /// Create a new Bastion with default configuration and the system clock.
    pub fn new(repositories: Arc<R>) -> Self {
        Self::with_config(repositories, BastionConfig::default())
    }

    /// Create a new Bastion with custom configuration.
    pub fn with_config(repositories: Arc<R>, config: BastionConfig) -> Self {
        Self::with_clock(repositories, config, Arc::new(SystemClock))
    }

    /// Create a new Bastion with an injected clock. Primarily useful for
    /// deterministic tests of time-driven behavior.
    pub fn with_clock(
        repositories: Arc<R>,
        config: BastionConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let totp: Arc<dyn TotpVerifier> =
            Arc::new(RfcTotp::new(config.two_factor.issuer.clone()));
        Self {
            rate_limit: RateLimitService::new(
                Arc::new(RateLimitRepositoryAdapter::new(repositories.clone())),
                config.rate_limits,
                clock.clone(),
            ),
            lockout: LockoutService::new(
                Arc::new(LoginAttemptRepositoryAdapter::new(repositories.clone())),
                config.lockout,
                clock.clone(),
            ),
            two_factor: TwoFactorService::new(
                Arc::new(TwoFactorRepositoryAdapter::new(repositories.clone())),
                config.two_factor,
                totp,
                clock,
            ),
            repositories,
        }
    }

    /// Check that the backing store is reachable.
    pub async fn health_check(&self) -> Result<(), Error> {
        self.repositories.health_check().await
    }

    // ========================================================================
    // Rate limiting
    // ========================================================================

    /// Check whether an action is rate limited, recording the request if not.
    pub async fn check_rate_limit(
        &self,
        action: RateLimitAction,
        identifier: &str,
    ) -> Result<RateLimitDecision, Error> {
        self.rate_limit.check(action, identifier).await
    }

    /// Administrative reset of one rate-limit bucket.
    pub async fn reset_rate_limit(
        &self,
        action: RateLimitAction,
        identifier: &str,
    ) -> Result<(), Error> {
        self.rate_limit.reset(action, identifier).await
    }

    /// Read-only rate-limit state for display. Never counts as an attempt.
    pub async fn rate_limit_status(
        &self,
        action: RateLimitAction,
        identifier: &str,
    ) -> Result<RateLimitStatus, Error> {
        self.rate_limit.status(action, identifier).await
    }

    // ========================================================================
    // Login lockout
    // ========================================================================

    /// Record a failed login and return the updated lockout status.
    pub async fn record_failed_login(&self, user_id: &str) -> Result<LockoutStatus, Error> {
        self.lockout.record_failed_attempt(user_id).await
    }

    /// Clear protection state after a successful authentication: the failed
    /// attempt counter and the user's login rate-limit bucket.
    pub async fn report_successful_login(&self, user_id: &str) -> Result<(), Error> {
        self.lockout.clear_attempts(user_id).await?;
        self.rate_limit.reset(RateLimitAction::Login, user_id).await
    }

    /// Whether the user is currently locked out.
    pub async fn is_locked_out(&self, user_id: &str) -> Result<bool, Error> {
        self.lockout.is_locked_out(user_id).await
    }

    /// Current lockout status for a user.
    pub async fn lockout_status(&self, user_id: &str) -> Result<LockoutStatus, Error> {
        self.lockout.get_status(user_id).await
    }

    /// Time until an active lockout lifts. Zero when not locked out.
    pub async fn lockout_time_remaining(&self, user_id: &str) -> Result<Duration, Error> {
        self.lockout.lockout_time_remaining(user_id).await
    }

    // ========================================================================
    // Two-factor authentication
    // ========================================================================

    /// Begin two-factor enrollment: a fresh secret and provisioning URI for
    /// QR display. Nothing is persisted until confirmation.
    pub fn start_two_factor_enrollment(&self, label: &str) -> TwoFactorEnrollment {
        self.two_factor.start_enrollment(label)
    }

    /// Confirm enrollment with a code from the authenticator. Attempts are
    /// rate limited per account so the setup code cannot be brute-forced.
    pub async fn confirm_two_factor_enrollment(
        &self,
        account: &str,
        secret: &str,
        code: &str,
    ) -> Result<Gated<EnrollmentOutcome>, Error> {
        let decision = self
            .rate_limit
            .check(RateLimitAction::TwoFactorVerify, account)
            .await?;
        if decision.limited {
            warn!(account = account, "Enrollment confirmation rate limited");
            return Ok(Gated::RateLimited {
                retry_after_secs: decision.retry_after_secs.unwrap_or(0),
            });
        }

        let outcome = self.two_factor.confirm_enrollment(account, secret, code).await?;
        if matches!(outcome, EnrollmentOutcome::Enabled { .. }) {
            self.rate_limit
                .reset(RateLimitAction::TwoFactorVerify, account)
                .await?;
        }
        Ok(Gated::Allowed(outcome))
    }

    /// Verify a live TOTP code for the login flow. Returns `true` for
    /// accounts without two-factor enabled. Attempts are rate limited per
    /// account.
    pub async fn verify_two_factor_code(
        &self,
        account: &str,
        code: &str,
    ) -> Result<Gated<bool>, Error> {
        let decision = self
            .rate_limit
            .check(RateLimitAction::TwoFactorVerify, account)
            .await?;
        if decision.limited {
            warn!(account = account, "Two-factor verification rate limited");
            return Ok(Gated::RateLimited {
                retry_after_secs: decision.retry_after_secs.unwrap_or(0),
            });
        }

        let valid = self.two_factor.verify_code(account, code).await?;
        if valid {
            self.rate_limit
                .reset(RateLimitAction::TwoFactorVerify, account)
                .await?;
        }
        Ok(Gated::Allowed(valid))
    }

    /// Disable two-factor, gated on a currently-valid TOTP code (backup codes
    /// are not accepted here). Attempts are rate limited per account.
    pub async fn disable_two_factor(
        &self,
        account: &str,
        code: &str,
    ) -> Result<Gated<DisableOutcome>, Error> {
        let decision = self
            .rate_limit
            .check(RateLimitAction::TwoFactorVerify, account)
            .await?;
        if decision.limited {
            warn!(account = account, "Two-factor disable rate limited");
            return Ok(Gated::RateLimited {
                retry_after_secs: decision.retry_after_secs.unwrap_or(0),
            });
        }

        let outcome = self.two_factor.disable(account, code).await?;
        if outcome == DisableOutcome::Disabled {
            self.rate_limit
                .reset(RateLimitAction::TwoFactorVerify, account)
                .await?;
        }
        Ok(Gated::Allowed(outcome))
    }

    /// Redeem a single-use backup code for account recovery.
    pub async fn redeem_backup_code(
        &self,
        account: &str,
        code: &str,
    ) -> Result<BackupCodeOutcome, Error> {
        self.two_factor.redeem_backup_code(account, code).await
    }

    /// Issue a fresh batch of backup codes, invalidating all previous ones.
    pub async fn regenerate_backup_codes(
        &self,
        account: &str,
    ) -> Result<Option<Vec<String>>, Error> {
        self.two_factor.regenerate_backup_codes(account).await
    }

    /// Read-only two-factor state for an account.
    pub async fn two_factor_status(&self, account: &str) -> Result<TwoFactorStatus, Error> {
        self.two_factor.status(account).await
    }
}
