//! Error types for the credential store.

use std::path::PathBuf;

use credstore_core::ConfigError;
use thiserror::Error;

/// Errors that can occur during credential store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A master key is present but does not decrypt the database.
    #[error("Incorrect master password")]
    IncorrectMasterPassword,

    /// No master key material where one was expected.
    #[error("Master key file is missing: {0}")]
    MissingMasterKey(PathBuf),

    /// The database bytes do not parse.
    #[error("Corrupted database: {0}")]
    CorruptedDatabase(String),

    /// The key file exists but cannot be read as a master key.
    #[error("Corrupted master key file: {0}")]
    CorruptedKeyFile(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Invalid encryption spec: {0}")]
    InvalidSpec(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether the error means "the key is wrong", as opposed to missing
    /// material or broken files.
    pub fn is_incorrect_master_password(&self) -> bool {
        matches!(self, StoreError::IncorrectMasterPassword)
    }
}

/// Convenience result alias for credential store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
