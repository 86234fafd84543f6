//! Repository traits for the data access layer
//!
//! This module defines the repository interfaces that services use to interact
//! with storage. These traits provide a clean abstraction over the underlying
//! storage implementation.
//!
//! # Trait Hierarchy
//!
//! The repository system uses a composable trait hierarchy:
//!
//! - Individual `*Repository` traits define the operations for each data domain
//! - Individual `*RepositoryProvider` traits provide access to each repository type
//! - [`RepositoryProvider`] is a supertrait combining all provider traits plus
//!   lifecycle methods
//!
//! This design allows storage backends to implement only the repositories they
//! need while exposing a unified interface through the full
//! `RepositoryProvider` trait.

pub mod adapter;
pub mod login_attempt;
pub mod rate_limit;
pub mod two_factor;

pub use adapter::{
    LoginAttemptRepositoryAdapter, RateLimitRepositoryAdapter, TwoFactorRepositoryAdapter,
};
pub use login_attempt::LoginAttemptRepository;
pub use rate_limit::RateLimitRepository;
pub use two_factor::TwoFactorRepository;

use async_trait::async_trait;

use crate::Error;

/// Provider trait for rate-limit repository access.
pub trait RateLimitRepositoryProvider: Send + Sync + 'static {
    /// The rate-limit repository implementation type
    type RateLimitRepo: RateLimitRepository;

    /// Get the rate-limit repository
    fn rate_limit(&self) -> &Self::RateLimitRepo;
}

/// Provider trait for login-attempt repository access.
pub trait LoginAttemptRepositoryProvider: Send + Sync + 'static {
    /// The login-attempt repository implementation type
    type LoginAttemptRepo: LoginAttemptRepository;

    /// Get the login-attempt repository
    fn login_attempt(&self) -> &Self::LoginAttemptRepo;
}

/// Provider trait for two-factor repository access.
pub trait TwoFactorRepositoryProvider: Send + Sync + 'static {
    /// The two-factor repository implementation type
    type TwoFactorRepo: TwoFactorRepository;

    /// Get the two-factor repository
    fn two_factor(&self) -> &Self::TwoFactorRepo;
}

/// Unified provider over all protection repositories.
#[async_trait]
pub trait RepositoryProvider:
    RateLimitRepositoryProvider + LoginAttemptRepositoryProvider + TwoFactorRepositoryProvider
{
    /// Check that the backing store is reachable.
    async fn health_check(&self) -> Result<(), Error>;
}
