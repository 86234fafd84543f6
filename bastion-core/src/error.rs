use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Record not found")]
    NotFound,
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Random number generation failed: {0}")]
    Rng(String),

    #[error("Invalid TOTP secret: {0}")]
    InvalidSecret(String),
}

impl Error {
    /// Whether this error originated in the storage backend.
    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }
}
