//! Encrypted local credential storage for credstore.
//!
//! Credentials are kept in a single AES-256-GCM encrypted database file whose
//! key is derived from a master key stored beside it. The master key is either
//! generated randomly or derived from a user passphrase.
//!
//! - [`CredentialStore`]: get/set/save facade over the database
//! - [`MasterKeyManager`]: key file lifecycle and rotation
//! - [`RecoveryManager`]: clear and import when key and database disagree

pub mod crypto;
pub mod database;
pub mod error;
pub mod fs;
pub mod kdf;
pub mod master_key;
pub mod recovery;
pub mod store;
pub mod types;

pub use error::{Result, StoreError};
pub use fs::{FileSystem, StdFileSystem};
pub use kdf::{CipherId, EncryptionSpec, KdfParams};
pub use master_key::{MasterKey, MasterKeyManager};
pub use recovery::{
    ClearOutcome, ImportOutcome, MasterPasswordRequest, PasswordReason, RecoveryManager,
};
pub use store::{CredentialBackend, CredentialStore, StoreLocation};
pub use types::{CredentialAttributes, Credentials};
