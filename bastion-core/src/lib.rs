//! Core functionality for the bastion account-protection ecosystem
//!
//! This crate contains the policy layer shared by every bastion storage
//! backend and the top-level `bastion` facade: sliding-window rate limiting,
//! failed-login lockout, and two-factor authentication lifecycle management.
//!
//! The three services are independent policies unified only by being part of
//! the account-protection concern. Each one reads and writes its own records
//! through a repository trait, compares stored timestamps against an injected
//! [`Clock`] for lazy expiry, and reports expected conditions (rate limited,
//! locked out, wrong code) as plain return values rather than errors.
//!
//! See [`services`] for the policy implementations and [`repositories`] for
//! the storage seam that backends implement.

pub mod clock;
pub mod crypto;
pub mod error;
pub mod repositories;
pub mod services;
pub mod storage;
pub mod sync;
pub mod totp;

pub use clock::{Clock, SystemClock, TestClock};
pub use error::Error;
pub use repositories::RepositoryProvider;
pub use storage::{
    LockoutConfig, LockoutStatus, RateLimitAction, RateLimitConfig, RateLimitDecision,
    RateLimitStatus, TwoFactorConfig, TwoFactorStatus,
};
pub use totp::{CodeCheck, RfcTotp, TotpVerifier};
