//! Service layer for account-protection policies
//!
//! This module contains the concrete service implementations. Each service is
//! an independent policy over its own repository; they never call one another.
//! Composition (for example, rate limiting two-factor verification attempts)
//! happens a layer above, in the `bastion` facade.

pub mod lockout;
pub mod rate_limit;
pub mod two_factor;

pub use lockout::LockoutService;
pub use rate_limit::RateLimitService;
pub use two_factor::{
    BackupCodeOutcome, DisableOutcome, EnrollmentOutcome, TwoFactorEnrollment, TwoFactorService,
};
