use std::path::PathBuf;
use thiserror::Error;

/// All errors that can occur in SecretKeep.
#[derive(Debug, Error)]
pub enum KeepError {
    // --- Request errors ---
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Not authorized")]
    Unauthorized,

    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("Secret not found")]
    NotFound,

    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: wrong key or corrupted data")]
    DecryptionFailed,

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    // --- Keyfile errors ---
    #[error("Keyfile error: {0}")]
    KeyfileError(String),

    #[error("Keyfile already exists at {0}")]
    KeyfileExists(PathBuf),

    // --- Storage errors ---
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Operation deadline exceeded")]
    Timeout,

    // --- Config errors ---
    #[error("Config error: {0}")]
    Config(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl KeepError {
    /// HTTP status code this error is surfaced as.
    ///
    /// `NotFound` deliberately shares 401 with `Unauthorized` so callers
    /// cannot learn of the existence of other accounts' secrets.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Unauthorized | Self::NotFound => 401,
            Self::Conflict(_) => 409,
            _ => 500,
        }
    }

    /// Whether this error points at a server-side fault rather than a bad request.
    pub fn is_internal(&self) -> bool {
        self.status_code() >= 500
    }
}

/// Convenience type alias for SecretKeep results.
pub type Result<T> = std::result::Result<T, KeepError>;
