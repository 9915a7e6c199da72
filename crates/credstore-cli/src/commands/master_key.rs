//! Master key commands: `change-password`, `rotate-key`.

use credstore_core::{Config, SecretString};
use credstore_secrets::EncryptionSpec;

use super::{open_store, save_spec};

/// Prompt twice for a new master password.
fn prompt_new_password() -> anyhow::Result<SecretString> {
    let read = |prompt: &str| {
        rpassword::prompt_password(prompt)
            .map(SecretString::from)
            .map_err(|e| anyhow::anyhow!("Failed to read password: {}", e))
    };

    let password = read("New master password: ")?;
    if password.is_empty() {
        anyhow::bail!("Master password must not be empty");
    }
    let confirm = read("Confirm master password: ")?;
    if password != confirm {
        anyhow::bail!("Passwords do not match");
    }
    Ok(password)
}

/// Re-encrypt the store under a passphrase-derived master key.
pub fn change_password(config: &Config) -> anyhow::Result<()> {
    let mut store = open_store(config)?;
    let password = prompt_new_password()?;

    let spec = EncryptionSpec::passphrase_from_config(&config.encryption);
    store.set_master_password(&password, &spec)?;

    println!(
        "Master password changed; {} credential(s) re-encrypted.",
        store.len()
    );
    Ok(())
}

/// Re-encrypt the store under a new random master key.
pub fn rotate_key(config: &Config) -> anyhow::Result<()> {
    let mut store = open_store(config)?;

    let spec = match store.master_key_is_auto_generated() {
        Some(false) => EncryptionSpec::from_config(&config.encryption),
        _ => save_spec(&store, config)?,
    };
    store.rotate_master_key(&spec)?;

    println!("Master key rotated; {} credential(s) re-encrypted.", store.len());
    Ok(())
}
