//! Recovery commands: `clear`, `import`, `reset`.

use std::path::Path;

use credstore_core::{Config, SecretString};
use credstore_secrets::{
    ClearOutcome, ImportOutcome, MasterPasswordRequest, PasswordReason, RecoveryManager,
};
use tracing::warn;

/// Reset the store to a consistent state.
pub fn clear(config: &Config) -> anyhow::Result<()> {
    let mut manager = RecoveryManager::from_config(config)?;
    let message = match manager.clear()? {
        ClearOutcome::Reset => "No master key file: removed database and key file.",
        ClearOutcome::DatabaseRemoved => {
            "Master key does not open the database: removed the database, kept the key."
        }
        ClearOutcome::Emptied => "All credentials removed.",
        ClearOutcome::Unchanged => "No database to clear.",
    };
    println!("{message}");
    Ok(())
}

/// Delete both store files.
pub fn reset(config: &Config) -> anyhow::Result<()> {
    let mut manager = RecoveryManager::from_config(config)?;
    manager.reset()?;
    println!("Credential store deleted.");
    Ok(())
}

fn prompt_message(request: &MasterPasswordRequest) -> String {
    match request.reason {
        PasswordReason::KeyFileMissing => format!(
            "No master key file next to {}.\nMaster password: ",
            request.source_db.display()
        ),
        PasswordReason::IncorrectKey => format!(
            "Master password does not open {} (attempt {}).\nMaster password: ",
            request.source_db.display(),
            request.attempt
        ),
    }
}

/// Hidden prompt. Empty input or a terminal error declines the request.
fn prompt_master_password(request: &MasterPasswordRequest) -> Option<SecretString> {
    match rpassword::prompt_password(prompt_message(request)) {
        Ok(password) if !password.is_empty() => Some(SecretString::from(password)),
        Ok(_) => None,
        Err(e) => {
            warn!("could not read master password: {e}");
            None
        }
    }
}

/// Replace the store with `source`.
pub fn import(config: &Config, source: &Path) -> anyhow::Result<()> {
    let mut manager = RecoveryManager::from_config(config)?;

    match manager.import(source, prompt_master_password)? {
        ImportOutcome::Imported { credentials } => {
            println!(
                "Imported {} credential(s) from {}.",
                credentials,
                source.display()
            );
            Ok(())
        }
        ImportOutcome::SameFile => {
            println!("{} is already the active database.", source.display());
            Ok(())
        }
        ImportOutcome::Unsatisfied => anyhow::bail!("Import cancelled: no master password given"),
    }
}
