//! Two-factor authentication service.
//!
//! Manages the lifecycle of a per-account shared TOTP secret and its
//! single-use backup codes, gating enable/disable transitions behind a valid
//! current code.
//!
//! The pending-setup state is transient: `start_enrollment` hands the fresh
//! secret to the caller, and nothing is persisted until the caller proves
//! possession of the authenticator by confirming with a valid code. Disable
//! requires a live TOTP code specifically; backup codes are redeemed through
//! their own explicit path and are never accepted for disable.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    Error,
    clock::Clock,
    crypto::{generate_backup_codes, hash_backup_code, verify_backup_code},
    repositories::TwoFactorRepository,
    storage::{BackupCode, TwoFactorConfig, TwoFactorRecord, TwoFactorStatus, two_factor_key},
    sync::KeyedLocks,
    totp::{CodeCheck, TotpVerifier},
};

/// Transient output of `start_enrollment`, held by the caller until the
/// confirmation step.
#[derive(Debug, Clone)]
pub struct TwoFactorEnrollment {
    /// Base32-encoded shared secret for manual entry.
    pub secret: String,
    /// `otpauth://` URI for QR display.
    pub provisioning_uri: String,
}

/// Result of confirming an enrollment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentOutcome {
    /// Two-factor is now enabled; the backup codes are returned in plaintext
    /// exactly once and stored only as hashes.
    Enabled { backup_codes: Vec<String> },
    /// The supplied code is not a 6-digit number.
    InvalidCodeFormat,
    /// The supplied code does not match the offered secret.
    IncorrectCode,
    /// The account already has two-factor enabled; disable it first.
    AlreadyEnabled,
}

/// Result of a disable request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisableOutcome {
    Disabled,
    InvalidCodeFormat,
    IncorrectCode,
    NotEnabled,
}

/// Result of redeeming a backup code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupCodeOutcome {
    /// The code was accepted and atomically marked used.
    Accepted { remaining: usize },
    /// Unknown code, or a code that has already been used.
    Rejected,
    NotEnabled,
}

/// Service managing per-account two-factor enrollment.
pub struct TwoFactorService<R: TwoFactorRepository> {
    repository: Arc<R>,
    config: TwoFactorConfig,
    totp: Arc<dyn TotpVerifier>,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks,
}

impl<R: TwoFactorRepository> TwoFactorService<R> {
    pub fn new(
        repository: Arc<R>,
        config: TwoFactorConfig,
        totp: Arc<dyn TotpVerifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            config,
            totp,
            clock,
            locks: KeyedLocks::new(),
        }
    }

    /// Get the current configuration.
    pub fn config(&self) -> &TwoFactorConfig {
        &self.config
    }

    /// Begin the enable flow: generate a fresh secret and provisioning URI.
    ///
    /// Nothing is persisted; the returned secret must be passed back to
    /// [`confirm_enrollment`](Self::confirm_enrollment).
    pub fn start_enrollment(&self, label: &str) -> TwoFactorEnrollment {
        let secret = self.totp.generate_secret();
        let provisioning_uri = self.totp.provisioning_uri(&secret, label);
        TwoFactorEnrollment {
            secret,
            provisioning_uri,
        }
    }

    /// Complete the enable flow by proving possession of the authenticator.
    ///
    /// On success, persists the record and issues a fresh batch of backup
    /// codes, returned in plaintext exactly once.
    pub async fn confirm_enrollment(
        &self,
        account: &str,
        secret: &str,
        code: &str,
    ) -> Result<EnrollmentOutcome, Error> {
        let _guard = self.locks.acquire(&two_factor_key(account)).await;

        if self.repository.get_record(account).await?.is_some() {
            return Ok(EnrollmentOutcome::AlreadyEnabled);
        }

        let now = self.clock.now();
        match self.totp.verify(code, secret, now)? {
            CodeCheck::BadFormat => return Ok(EnrollmentOutcome::InvalidCodeFormat),
            CodeCheck::Mismatch => return Ok(EnrollmentOutcome::IncorrectCode),
            CodeCheck::Valid => {}
        }

        let backup_codes = generate_backup_codes(self.config.backup_code_count);
        let record = TwoFactorRecord {
            enabled: true,
            secret: secret.to_string(),
            verified_at: now,
            backup_codes: backup_codes
                .iter()
                .map(|c| BackupCode::new(hash_backup_code(c)))
                .collect(),
        };
        self.repository.upsert_record(account, &record).await?;
        info!(account = account, "Two-factor authentication enabled");

        Ok(EnrollmentOutcome::Enabled { backup_codes })
    }

    /// Verify a live TOTP code for the login flow.
    ///
    /// Always returns `true` for accounts without two-factor enabled:
    /// two-factor is opt-in and its absence must never block login. Backup
    /// codes are not consulted here; redemption is a separate explicit path.
    pub async fn verify_code(&self, account: &str, code: &str) -> Result<bool, Error> {
        let Some(record) = self.enabled_record(account).await? else {
            return Ok(true);
        };
        let check = self.totp.verify(code, &record.secret, self.clock.now())?;
        Ok(check.is_valid())
    }

    /// Disable two-factor, gated on a currently-valid TOTP code.
    ///
    /// Removes all persisted state, including unused backup codes.
    pub async fn disable(&self, account: &str, code: &str) -> Result<DisableOutcome, Error> {
        let _guard = self.locks.acquire(&two_factor_key(account)).await;

        let Some(record) = self.enabled_record(account).await? else {
            return Ok(DisableOutcome::NotEnabled);
        };
        match self.totp.verify(code, &record.secret, self.clock.now())? {
            CodeCheck::BadFormat => return Ok(DisableOutcome::InvalidCodeFormat),
            CodeCheck::Mismatch => return Ok(DisableOutcome::IncorrectCode),
            CodeCheck::Valid => {}
        }

        self.repository.delete_record(account).await?;
        info!(account = account, "Two-factor authentication disabled");
        Ok(DisableOutcome::Disabled)
    }

    /// Redeem a backup code for account recovery.
    ///
    /// A code is accepted at most once; acceptance marks it used in the same
    /// persisted update. A second redemption of the same code is rejected.
    pub async fn redeem_backup_code(
        &self,
        account: &str,
        code: &str,
    ) -> Result<BackupCodeOutcome, Error> {
        let _guard = self.locks.acquire(&two_factor_key(account)).await;

        let Some(mut record) = self.enabled_record(account).await? else {
            return Ok(BackupCodeOutcome::NotEnabled);
        };

        let now = self.clock.now();
        let matched = record
            .backup_codes
            .iter_mut()
            .find(|c| !c.is_used() && verify_backup_code(code, &c.code_hash));
        match matched {
            Some(backup) => {
                backup.used_at = Some(now);
                self.repository.upsert_record(account, &record).await?;
                let remaining = record.backup_codes_remaining();
                info!(account = account, remaining, "Backup code redeemed");
                Ok(BackupCodeOutcome::Accepted { remaining })
            }
            None => {
                warn!(account = account, "Backup code rejected");
                Ok(BackupCodeOutcome::Rejected)
            }
        }
    }

    /// Issue a fresh batch of backup codes, invalidating every previously
    /// issued code. Returns `None` when two-factor is not enabled.
    pub async fn regenerate_backup_codes(
        &self,
        account: &str,
    ) -> Result<Option<Vec<String>>, Error> {
        let _guard = self.locks.acquire(&two_factor_key(account)).await;

        let Some(mut record) = self.enabled_record(account).await? else {
            return Ok(None);
        };

        let backup_codes = generate_backup_codes(self.config.backup_code_count);
        record.backup_codes = backup_codes
            .iter()
            .map(|c| BackupCode::new(hash_backup_code(c)))
            .collect();
        self.repository.upsert_record(account, &record).await?;
        info!(account = account, "Backup codes regenerated");

        Ok(Some(backup_codes))
    }

    /// Read-only projection of the account's two-factor state.
    pub async fn status(&self, account: &str) -> Result<TwoFactorStatus, Error> {
        match self.enabled_record(account).await? {
            Some(record) => Ok(TwoFactorStatus {
                enabled: true,
                backup_codes_remaining: record.backup_codes_remaining(),
                verified_at: Some(record.verified_at),
            }),
            None => Ok(TwoFactorStatus::disabled()),
        }
    }

    async fn enabled_record(&self, account: &str) -> Result<Option<TwoFactorRecord>, Error> {
        Ok(self
            .repository
            .get_record(account)
            .await?
            .filter(|r| r.enabled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;
    use crate::totp::RfcTotp;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use totp_rs::{Algorithm, Secret, TOTP};

    /// Mock repository for testing
    #[derive(Default)]
    struct MockTwoFactorRepository {
        records: Mutex<HashMap<String, TwoFactorRecord>>,
    }

    #[async_trait]
    impl TwoFactorRepository for MockTwoFactorRepository {
        async fn get_record(&self, account: &str) -> Result<Option<TwoFactorRecord>, Error> {
            Ok(self.records.lock().unwrap().get(account).cloned())
        }

        async fn upsert_record(
            &self,
            account: &str,
            record: &TwoFactorRecord,
        ) -> Result<(), Error> {
            self.records
                .lock()
                .unwrap()
                .insert(account.to_string(), record.clone());
            Ok(())
        }

        async fn delete_record(&self, account: &str) -> Result<(), Error> {
            self.records.lock().unwrap().remove(account);
            Ok(())
        }
    }

    fn code_for(secret: &str, at: DateTime<Utc>) -> String {
        let bytes = Secret::Encoded(secret.to_string()).to_bytes().unwrap();
        let totp = TOTP::new(Algorithm::SHA1, 6, 1, 30, bytes).unwrap();
        totp.generate(at.timestamp() as u64)
    }

    fn service_with_clock() -> (TwoFactorService<MockTwoFactorRepository>, Arc<TestClock>) {
        let clock = Arc::new(TestClock::new(Utc::now()));
        let service = TwoFactorService::new(
            Arc::new(MockTwoFactorRepository::default()),
            TwoFactorConfig::default(),
            Arc::new(RfcTotp::new("Bastion")),
            clock.clone(),
        );
        (service, clock)
    }

    async fn enroll(
        service: &TwoFactorService<MockTwoFactorRepository>,
        clock: &TestClock,
        account: &str,
    ) -> (String, Vec<String>) {
        let enrollment = service.start_enrollment(account);
        let code = code_for(&enrollment.secret, clock.now());
        match service
            .confirm_enrollment(account, &enrollment.secret, &code)
            .await
            .unwrap()
        {
            EnrollmentOutcome::Enabled { backup_codes } => (enrollment.secret, backup_codes),
            other => panic!("enrollment failed: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_enrollment_persists_nothing_until_confirmed() {
        let (service, _clock) = service_with_clock();

        let enrollment = service.start_enrollment("alice@example.com");
        assert!(enrollment.provisioning_uri.contains(&enrollment.secret));

        let status = service.status("alice@example.com").await.unwrap();
        assert!(!status.enabled);
    }

    #[tokio::test]
    async fn test_confirm_with_valid_code_enables() {
        let (service, clock) = service_with_clock();

        let (_secret, backup_codes) = enroll(&service, &clock, "alice").await;
        assert_eq!(backup_codes.len(), 8);

        let status = service.status("alice").await.unwrap();
        assert!(status.enabled);
        assert_eq!(status.backup_codes_remaining, 8);
        assert_eq!(status.verified_at, Some(clock.now()));
    }

    #[tokio::test]
    async fn test_confirm_distinguishes_format_from_mismatch() {
        let (service, clock) = service_with_clock();

        let enrollment = service.start_enrollment("alice");
        assert_eq!(
            service
                .confirm_enrollment("alice", &enrollment.secret, "not-a-code")
                .await
                .unwrap(),
            EnrollmentOutcome::InvalidCodeFormat
        );

        let code = code_for(&enrollment.secret, clock.now());
        let wrong: String = code
            .chars()
            .enumerate()
            .map(|(i, c)| {
                if i == 0 {
                    char::from_digit((c.to_digit(10).unwrap() + 1) % 10, 10).unwrap()
                } else {
                    c
                }
            })
            .collect();
        assert_eq!(
            service
                .confirm_enrollment("alice", &enrollment.secret, &wrong)
                .await
                .unwrap(),
            EnrollmentOutcome::IncorrectCode
        );

        // A failed confirmation leaves nothing behind.
        assert!(!service.status("alice").await.unwrap().enabled);
    }

    #[tokio::test]
    async fn test_confirm_when_already_enabled() {
        let (service, clock) = service_with_clock();

        enroll(&service, &clock, "alice").await;

        let enrollment = service.start_enrollment("alice");
        let code = code_for(&enrollment.secret, clock.now());
        assert_eq!(
            service
                .confirm_enrollment("alice", &enrollment.secret, &code)
                .await
                .unwrap(),
            EnrollmentOutcome::AlreadyEnabled
        );
    }

    #[tokio::test]
    async fn test_verify_code_bypasses_when_disabled() {
        let (service, _clock) = service_with_clock();

        // 2FA is opt-in; its absence must never block login.
        assert!(service.verify_code("nobody", "000000").await.unwrap());
        assert!(service.verify_code("nobody", "garbage").await.unwrap());
    }

    #[tokio::test]
    async fn test_verify_code_when_enabled() {
        let (service, clock) = service_with_clock();

        let (secret, backup_codes) = enroll(&service, &clock, "alice").await;

        let code = code_for(&secret, clock.now());
        assert!(service.verify_code("alice", &code).await.unwrap());
        assert!(!service.verify_code("alice", "000001").await.unwrap());

        // Backup codes are not accepted on the live-code path.
        assert!(!service.verify_code("alice", &backup_codes[0]).await.unwrap());
    }

    #[tokio::test]
    async fn test_backup_codes_single_use() {
        let (service, clock) = service_with_clock();

        let (_secret, backup_codes) = enroll(&service, &clock, "alice").await;

        for (i, code) in backup_codes.iter().enumerate() {
            match service.redeem_backup_code("alice", code).await.unwrap() {
                BackupCodeOutcome::Accepted { remaining } => {
                    assert_eq!(remaining, backup_codes.len() - i - 1);
                }
                other => panic!("code {i} rejected: {other:?}"),
            }
        }

        // Every code has now been consumed; second redemptions are rejected.
        for code in &backup_codes {
            assert_eq!(
                service.redeem_backup_code("alice", code).await.unwrap(),
                BackupCodeOutcome::Rejected
            );
        }
    }

    #[tokio::test]
    async fn test_unknown_backup_code_rejected() {
        let (service, clock) = service_with_clock();

        enroll(&service, &clock, "alice").await;
        assert_eq!(
            service.redeem_backup_code("alice", "ZZZZ-ZZZZ").await.unwrap(),
            BackupCodeOutcome::Rejected
        );
    }

    #[tokio::test]
    async fn test_regenerate_invalidates_old_codes() {
        let (service, clock) = service_with_clock();

        let (_secret, old_codes) = enroll(&service, &clock, "alice").await;
        let new_codes = service
            .regenerate_backup_codes("alice")
            .await
            .unwrap()
            .expect("2FA is enabled");
        assert_eq!(new_codes.len(), 8);

        assert_eq!(
            service.redeem_backup_code("alice", &old_codes[0]).await.unwrap(),
            BackupCodeOutcome::Rejected
        );
        assert!(matches!(
            service.redeem_backup_code("alice", &new_codes[0]).await.unwrap(),
            BackupCodeOutcome::Accepted { remaining: 7 }
        ));
    }

    #[tokio::test]
    async fn test_regenerate_requires_enrollment() {
        let (service, _clock) = service_with_clock();
        assert!(
            service
                .regenerate_backup_codes("nobody")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_disable_requires_live_code() {
        let (service, clock) = service_with_clock();

        let (secret, backup_codes) = enroll(&service, &clock, "alice").await;

        // Backup codes are explicitly not accepted for disable.
        assert_eq!(
            service.disable("alice", &backup_codes[0]).await.unwrap(),
            DisableOutcome::InvalidCodeFormat
        );
        assert_eq!(
            service.disable("alice", "000001").await.unwrap(),
            DisableOutcome::IncorrectCode
        );
        assert!(service.status("alice").await.unwrap().enabled);

        let code = code_for(&secret, clock.now());
        assert_eq!(
            service.disable("alice", &code).await.unwrap(),
            DisableOutcome::Disabled
        );
        assert!(!service.status("alice").await.unwrap().enabled);

        assert_eq!(
            service.disable("alice", "123456").await.unwrap(),
            DisableOutcome::NotEnabled
        );
    }

    #[tokio::test]
    async fn test_disable_then_reenroll_rotates_secret() {
        let (service, clock) = service_with_clock();

        let (first_secret, _) = enroll(&service, &clock, "alice").await;
        let code = code_for(&first_secret, clock.now());
        service.disable("alice", &code).await.unwrap();

        let (second_secret, _) = enroll(&service, &clock, "alice").await;
        assert_ne!(first_secret, second_secret);

        // Codes for the old secret no longer verify.
        let stale = code_for(&first_secret, clock.now());
        let fresh = code_for(&second_secret, clock.now());
        if stale != fresh {
            assert!(!service.verify_code("alice", &stale).await.unwrap());
        }
        assert!(service.verify_code("alice", &fresh).await.unwrap());
    }
}
