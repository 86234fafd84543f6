//! Repository implementations over the in-memory document store.

mod login_attempt;
mod rate_limit;
mod two_factor;

pub use login_attempt::MemoryLoginAttemptRepository;
pub use rate_limit::MemoryRateLimitRepository;
pub use two_factor::MemoryTwoFactorRepository;
