//! CLI command implementations.

pub mod config;
pub mod credentials;
pub mod master_key;
pub mod recovery;

use std::path::Path;

use anyhow::Context;
use credstore_core::Config;
use credstore_secrets::{CredentialStore, EncryptionSpec, StoreError};

/// Load and validate configuration. A missing file means defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = Config::load_or_default(path).context("Failed to load config")?;
    config.validate()?;
    Ok(config)
}

/// Open the configured store, turning key problems into actionable errors.
pub fn open_store(config: &Config) -> anyhow::Result<CredentialStore> {
    CredentialStore::from_config(config).map_err(|e| match e {
        StoreError::MissingMasterKey(path) => anyhow::anyhow!(
            "Master key file {} is missing. Run `credstore clear` to start over \
             or `credstore import <db-file>` to restore a backup.",
            path.display()
        ),
        StoreError::IncorrectMasterPassword => anyhow::anyhow!(
            "The master key does not open the credential database. Run `credstore clear` \
             to start over or `credstore import <db-file>` to restore a backup."
        ),
        other => anyhow::Error::new(other).context("Failed to open credential store"),
    })
}

/// Spec for the next save: keep whatever the database already uses.
pub fn save_spec(store: &CredentialStore, config: &Config) -> anyhow::Result<EncryptionSpec> {
    if let Some(spec) = store.stored_spec()? {
        return Ok(spec);
    }
    Ok(match store.master_key_is_auto_generated() {
        Some(false) => EncryptionSpec::passphrase_from_config(&config.encryption),
        _ => EncryptionSpec::from_config(&config.encryption),
    })
}
