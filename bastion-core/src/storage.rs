//! Persisted record types, status projections, and configuration.
//!
//! One logical record is stored per key in the backing store:
//!
//! | Key pattern | Record |
//! |---|---|
//! | `loginAttempts:<userId>` | [`LoginAttemptInfo`] |
//! | `rateLimit:<action>:<identifier>` | [`RateLimitState`] |
//! | `twoFactor:<accountKey>` | [`TwoFactorRecord`] |

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Identifier substituted when a caller supplies an empty one.
///
/// Callers are expected to supply a stable per-subject key (user id, IP);
/// everything without one shares a single bucket.
pub const DEFAULT_IDENTIFIER: &str = "default";

// ============================================================================
// Rate limiting
// ============================================================================

/// The closed set of rate-limited action kinds.
///
/// [`RateLimitAction::Api`] doubles as the catch-all quota for generic
/// API-shaped traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RateLimitAction {
    Login,
    Signup,
    PasswordReset,
    Trade,
    Withdraw,
    TwoFactorVerify,
    Api,
}

impl RateLimitAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitAction::Login => "login",
            RateLimitAction::Signup => "signup",
            RateLimitAction::PasswordReset => "passwordReset",
            RateLimitAction::Trade => "trade",
            RateLimitAction::Withdraw => "withdraw",
            RateLimitAction::TwoFactorVerify => "twoFactorVerify",
            RateLimitAction::Api => "api",
        }
    }
}

impl fmt::Display for RateLimitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-action quota: how many requests fit in the sliding window, and how
/// long to block once the quota is exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitQuota {
    pub max_requests: u32,
    pub window: Duration,
    pub block_duration: Duration,
}

impl RateLimitQuota {
    pub const fn new(max_requests: u32, window: Duration, block_duration: Duration) -> Self {
        Self {
            max_requests,
            window,
            block_duration,
        }
    }
}

/// Static quota table, immutable for the process lifetime.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub login: RateLimitQuota,
    pub signup: RateLimitQuota,
    pub password_reset: RateLimitQuota,
    pub trade: RateLimitQuota,
    pub withdraw: RateLimitQuota,
    pub two_factor_verify: RateLimitQuota,
    pub api: RateLimitQuota,
}

impl RateLimitConfig {
    pub fn quota_for(&self, action: RateLimitAction) -> RateLimitQuota {
        match action {
            RateLimitAction::Login => self.login,
            RateLimitAction::Signup => self.signup,
            RateLimitAction::PasswordReset => self.password_reset,
            RateLimitAction::Trade => self.trade,
            RateLimitAction::Withdraw => self.withdraw,
            RateLimitAction::TwoFactorVerify => self.two_factor_verify,
            RateLimitAction::Api => self.api,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            // 5 per minute, block 5 min
            login: RateLimitQuota::new(5, Duration::minutes(1), Duration::minutes(5)),
            // 3 per minute, block 10 min
            signup: RateLimitQuota::new(3, Duration::minutes(1), Duration::minutes(10)),
            // 3 per 5 min, block 15 min
            password_reset: RateLimitQuota::new(3, Duration::minutes(5), Duration::minutes(15)),
            // 30 per minute, block 1 min
            trade: RateLimitQuota::new(30, Duration::minutes(1), Duration::minutes(1)),
            // 5 per 5 min, block 10 min
            withdraw: RateLimitQuota::new(5, Duration::minutes(5), Duration::minutes(10)),
            // 5 per 5 min, block 15 min
            two_factor_verify: RateLimitQuota::new(5, Duration::minutes(5), Duration::minutes(15)),
            // 100 per minute, block 1 min
            api: RateLimitQuota::new(100, Duration::minutes(1), Duration::minutes(1)),
        }
    }
}

/// Persisted sliding-window state for one `action:identifier` key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitState {
    /// Timestamps of accepted requests within the current window, oldest first.
    pub requests: Vec<DateTime<Utc>>,
    /// When the current block expires; `None` when not blocked.
    pub blocked_until: Option<DateTime<Utc>>,
}

impl RateLimitState {
    /// Drop requests that have aged out of the window.
    pub fn prune(&mut self, now: DateTime<Utc>, window: Duration) {
        self.requests.retain(|ts| now - *ts < window);
    }

    pub fn is_blocked(&self, now: DateTime<Utc>) -> bool {
        self.blocked_until.is_some_and(|until| until > now)
    }
}

/// Decision returned by a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub limited: bool,
    /// Seconds until the caller may retry; set when limited.
    pub retry_after_secs: Option<u64>,
    /// Requests left in the current window; set when not limited.
    pub remaining_requests: Option<u32>,
}

impl RateLimitDecision {
    pub fn allowed(remaining_requests: u32) -> Self {
        Self {
            limited: false,
            retry_after_secs: None,
            remaining_requests: Some(remaining_requests),
        }
    }

    pub fn limited(retry_after_secs: u64) -> Self {
        Self {
            limited: true,
            retry_after_secs: Some(retry_after_secs),
            remaining_requests: None,
        }
    }
}

/// Read-only projection of the rate-limit state for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub requests_used: u32,
    pub max_requests: u32,
    pub window: Duration,
    pub is_blocked: bool,
    pub blocked_until: Option<DateTime<Utc>>,
}

// ============================================================================
// Login lockout
// ============================================================================

/// Persisted failed-login counter for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginAttemptInfo {
    /// Consecutive failed attempts in the current lockout cycle.
    pub count: u32,
    /// When the current cycle started.
    pub first_attempt_at: DateTime<Utc>,
}

impl LoginAttemptInfo {
    /// Whether this cycle has outlived the lockout window and must be purged.
    pub fn is_expired(&self, now: DateTime<Utc>, lockout_duration: Duration) -> bool {
        now - self.first_attempt_at > lockout_duration
    }
}

/// Lockout policy: fixed strike count, fixed cycle duration.
#[derive(Debug, Clone, Copy)]
pub struct LockoutConfig {
    pub max_failed_attempts: u32,
    pub lockout_duration: Duration,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_failed_attempts: 4,
            lockout_duration: Duration::hours(24),
        }
    }
}

/// Current lockout state for a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockoutStatus {
    pub user_id: String,
    pub failed_attempts: u32,
    pub is_locked: bool,
    pub locked_until: Option<DateTime<Utc>>,
}

impl LockoutStatus {
    pub fn clean(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            failed_attempts: 0,
            is_locked: false,
            locked_until: None,
        }
    }

    /// Seconds until the lockout lifts, if locked.
    pub fn retry_after_seconds(&self, now: DateTime<Utc>) -> Option<i64> {
        self.locked_until
            .map(|until| (until - now).num_seconds().max(0))
    }
}

// ============================================================================
// Two-factor authentication
// ============================================================================

/// A single-use recovery code, stored as a SHA256 hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupCode {
    pub code_hash: String,
    pub used_at: Option<DateTime<Utc>>,
}

impl BackupCode {
    pub fn new(code_hash: String) -> Self {
        Self {
            code_hash,
            used_at: None,
        }
    }

    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }
}

/// Persisted two-factor enrollment for one account.
///
/// A record exists only for accounts that completed the enable flow; the
/// pending-setup state is transient and held by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwoFactorRecord {
    pub enabled: bool,
    /// Base32-encoded shared TOTP secret.
    pub secret: String,
    /// When the activating verification succeeded.
    pub verified_at: DateTime<Utc>,
    pub backup_codes: Vec<BackupCode>,
}

impl TwoFactorRecord {
    pub fn backup_codes_remaining(&self) -> usize {
        self.backup_codes.iter().filter(|c| !c.is_used()).count()
    }
}

/// Two-factor policy knobs.
#[derive(Debug, Clone)]
pub struct TwoFactorConfig {
    /// Issuer shown in authenticator apps.
    pub issuer: String,
    /// Backup codes issued per batch.
    pub backup_code_count: usize,
}

impl Default for TwoFactorConfig {
    fn default() -> Self {
        Self {
            issuer: "Bastion".to_string(),
            backup_code_count: 8,
        }
    }
}

/// Read-only projection of an account's two-factor state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwoFactorStatus {
    pub enabled: bool,
    pub backup_codes_remaining: usize,
    pub verified_at: Option<DateTime<Utc>>,
}

impl TwoFactorStatus {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            backup_codes_remaining: 0,
            verified_at: None,
        }
    }
}

// ============================================================================
// Storage keys
// ============================================================================

/// Storage key for a user's failed-login record.
pub fn login_attempts_key(user_id: &str) -> String {
    format!("loginAttempts:{user_id}")
}

/// Storage key for one `action:identifier` rate-limit bucket.
pub fn rate_limit_key(action: RateLimitAction, identifier: &str) -> String {
    format!("rateLimit:{action}:{identifier}")
}

/// Storage key for an account's two-factor record.
pub fn two_factor_key(account: &str) -> String {
    format!("twoFactor:{account}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_patterns() {
        assert_eq!(login_attempts_key("alice"), "loginAttempts:alice");
        assert_eq!(
            rate_limit_key(RateLimitAction::PasswordReset, "10.0.0.1"),
            "rateLimit:passwordReset:10.0.0.1"
        );
        assert_eq!(two_factor_key("alice"), "twoFactor:alice");
    }

    #[test]
    fn test_prune_drops_aged_requests() {
        let now = Utc::now();
        let mut state = RateLimitState {
            requests: vec![
                now - Duration::seconds(120),
                now - Duration::seconds(59),
                now,
            ],
            blocked_until: None,
        };
        state.prune(now, Duration::minutes(1));
        assert_eq!(state.requests.len(), 2);
    }

    #[test]
    fn test_attempt_expiry_boundary() {
        let now = Utc::now();
        let info = LoginAttemptInfo {
            count: 4,
            first_attempt_at: now - Duration::hours(24),
        };
        // Exactly 24h old is still within the cycle; one second more expires it.
        assert!(!info.is_expired(now, Duration::hours(24)));
        assert!(info.is_expired(now + Duration::seconds(1), Duration::hours(24)));
    }

    #[test]
    fn test_backup_codes_remaining() {
        let record = TwoFactorRecord {
            enabled: true,
            secret: "SECRET".to_string(),
            verified_at: Utc::now(),
            backup_codes: vec![
                BackupCode::new("a".to_string()),
                BackupCode {
                    code_hash: "b".to_string(),
                    used_at: Some(Utc::now()),
                },
            ],
        };
        assert_eq!(record.backup_codes_remaining(), 1);
    }
}
