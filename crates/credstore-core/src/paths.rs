//! Path resolution utilities.

use crate::env;
use crate::error::ConfigError;
use std::path::PathBuf;

/// Get the credstore base directory (`~/.credstore`, or `$CREDSTORE_HOME`).
pub fn base_dir() -> Result<PathBuf, ConfigError> {
    if let Some(home) = env::get_var(env::vars::CREDSTORE_HOME) {
        return Ok(expand_tilde(&home));
    }
    let home = dirs::home_dir().ok_or_else(|| {
        ConfigError::Validation("Could not determine home directory".to_string())
    })?;
    Ok(home.join(".credstore"))
}

/// Get the main config file path (~/.credstore/credstore.json5).
pub fn config_file() -> Result<PathBuf, ConfigError> {
    Ok(base_dir()?.join("credstore.json5"))
}

/// Get the default store directory (~/.credstore/store).
pub fn store_dir() -> Result<PathBuf, ConfigError> {
    Ok(base_dir()?.join("store"))
}

/// Ensure the base and store directories exist.
pub fn ensure_dirs() -> Result<(), ConfigError> {
    for dir in [base_dir()?, store_dir()?] {
        std::fs::create_dir_all(&dir)?;
    }
    Ok(())
}

/// Expand tilde (~) in a path.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
