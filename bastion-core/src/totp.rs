//! Time-based one-time password capability.
//!
//! The services treat TOTP as an external capability behind the
//! [`TotpVerifier`] trait; [`RfcTotp`] is the stock implementation using the
//! standard RFC 6238 parameters (HMAC-SHA1, 6 digits, 30 second step) with a
//! clock-skew tolerance of one step in either direction.

use chrono::{DateTime, Utc};
use totp_rs::{Algorithm, Secret, TOTP};

use crate::{
    Error,
    crypto::generate_secret_bytes,
    error::CryptoError,
};

/// Outcome of checking a user-supplied one-time code.
///
/// A malformed code (wrong length, non-numeric) is reported separately from a
/// well-formed code that simply does not match, so callers can distinguish
/// input mistakes from real rejections. Both deny the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeCheck {
    /// The code is valid for the secret at the given time.
    Valid,
    /// The code is not a 6-digit number.
    BadFormat,
    /// The code is well-formed but does not match.
    Mismatch,
}

impl CodeCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, CodeCheck::Valid)
    }
}

/// Verifier for time-based one-time passwords.
pub trait TotpVerifier: Send + Sync + 'static {
    /// Generate a fresh shared secret, base32-encoded for authenticator apps.
    fn generate_secret(&self) -> String;

    /// Check a code against a secret at the given instant.
    fn verify(&self, code: &str, secret: &str, at: DateTime<Utc>) -> Result<CodeCheck, Error>;

    /// Build the `otpauth://` provisioning URI for onboarding display.
    fn provisioning_uri(&self, secret: &str, label: &str) -> String;
}

/// Standard RFC 6238 TOTP verifier.
#[derive(Debug, Clone)]
pub struct RfcTotp {
    issuer: String,
}

const TOTP_DIGITS: usize = 6;
const TOTP_SKEW: u8 = 1;
const TOTP_STEP: u64 = 30;

impl RfcTotp {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
        }
    }

    fn build(&self, secret: &str) -> Result<TOTP, Error> {
        let bytes = Secret::Encoded(secret.to_string())
            .to_bytes()
            .map_err(|e| CryptoError::InvalidSecret(format!("{e:?}")))?;
        TOTP::new(Algorithm::SHA1, TOTP_DIGITS, TOTP_SKEW, TOTP_STEP, bytes)
            .map_err(|e| CryptoError::InvalidSecret(format!("{e:?}")).into())
    }
}

impl TotpVerifier for RfcTotp {
    fn generate_secret(&self) -> String {
        match Secret::Raw(generate_secret_bytes().to_vec()).to_encoded() {
            Secret::Encoded(encoded) => encoded,
            // to_encoded always yields the Encoded variant
            Secret::Raw(_) => unreachable!(),
        }
    }

    fn verify(&self, code: &str, secret: &str, at: DateTime<Utc>) -> Result<CodeCheck, Error> {
        let code = code.trim();
        if code.len() != TOTP_DIGITS || !code.chars().all(|c| c.is_ascii_digit()) {
            return Ok(CodeCheck::BadFormat);
        }

        let totp = self.build(secret)?;
        let timestamp = at.timestamp().max(0) as u64;
        if totp.check(code, timestamp) {
            Ok(CodeCheck::Valid)
        } else {
            Ok(CodeCheck::Mismatch)
        }
    }

    fn provisioning_uri(&self, secret: &str, label: &str) -> String {
        format!(
            "otpauth://totp/{issuer}:{label}?secret={secret}&issuer={issuer}&algorithm=SHA1&digits={TOTP_DIGITS}&period={TOTP_STEP}",
            issuer = self.issuer,
        )
    }
}
