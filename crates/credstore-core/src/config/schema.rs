//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main credstore configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Where the database and key files live.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Cipher and key-derivation settings used when saving.
    #[serde(default)]
    pub encryption: EncryptionConfig,

    /// Recovery (import/clear) behaviour.
    #[serde(default)]
    pub recovery: RecoveryConfig,
}

/// Storage configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Store directory. Defaults to `~/.credstore/store`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Database file name inside `dir`.
    #[serde(default = "default_database_file")]
    pub database_file: String,

    /// Master key file name inside `dir`.
    #[serde(default = "default_key_file")]
    pub key_file: String,

    /// How the master key is protected inside the key file.
    #[serde(default)]
    pub key_protection: KeyProtection,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: None,
            database_file: default_database_file(),
            key_file: default_key_file(),
            key_protection: KeyProtection::default(),
        }
    }
}

fn default_database_file() -> String {
    "credentials.db".to_string()
}

fn default_key_file() -> String {
    "credentials.key".to_string()
}

/// Protection applied to master key bytes in the key file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyProtection {
    /// Wrapped under a key compiled into the binary (obfuscation only).
    #[default]
    Builtin,
    /// Stored as plain base64.
    None,
}

/// Encryption configuration section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncryptionConfig {
    /// Key derivation function applied to the master key.
    #[serde(default)]
    pub kdf: KdfKind,

    /// Argon2id cost parameters, used when `kdf` is `argon2id`.
    #[serde(default)]
    pub argon2: Argon2Config,
}

/// Key derivation function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KdfKind {
    /// HKDF-SHA256, for random key material.
    #[default]
    Hkdf,
    /// Argon2id, for human passphrases.
    Argon2id,
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argon2Config {
    /// Memory cost in KiB (default: 65536 = 64 MiB).
    #[serde(default = "default_argon2_memory")]
    pub memory_kib: u32,

    /// Iteration count (default: 3).
    #[serde(default = "default_argon2_iterations")]
    pub iterations: u32,

    /// Parallelism lanes (default: 4).
    #[serde(default = "default_argon2_parallelism")]
    pub parallelism: u32,
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self {
            memory_kib: default_argon2_memory(),
            iterations: default_argon2_iterations(),
            parallelism: default_argon2_parallelism(),
        }
    }
}

fn default_argon2_memory() -> u32 {
    65536
}

fn default_argon2_iterations() -> u32 {
    3
}

fn default_argon2_parallelism() -> u32 {
    4
}

/// Recovery configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// How many times `import` asks for a master password before giving up.
    #[serde(default = "default_max_password_attempts")]
    pub max_password_attempts: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_password_attempts: default_max_password_attempts(),
        }
    }
}

fn default_max_password_attempts() -> u32 {
    3
}
