//! Configuration loading and persistence.

use super::Config;
use crate::env;
use crate::error::ConfigError;
use crate::paths;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = paths::config_file()?;
        Self::load(&path)
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        debug!(path = %path.display(), "loaded config file");
        Self::parse(&content)
    }

    /// Load from `path` (or the default path), falling back to defaults when
    /// the file does not exist. Other errors propagate.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let result = match path {
            Some(p) => Self::load(p),
            None => Self::load_default(),
        };
        let mut config = match result {
            Ok(config) => config,
            Err(ConfigError::NotFound(_)) => Self::default(),
            Err(e) => return Err(e),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `CREDSTORE_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Some(dir) = env::get_var(env::vars::CREDSTORE_STORE_DIR) {
            self.storage.dir = Some(paths::expand_tilde(&dir));
        }
    }

    /// Parse configuration from a string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        json5::from_str(content).map_err(|e| ConfigError::Json5(e.to_string()))
    }

    /// Save configuration to the default path.
    pub fn save_default(&self) -> Result<(), ConfigError> {
        let path = paths::config_file()?;
        self.save(&path)
    }

    /// Save configuration to a file path.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_json5()?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write atomically
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Serialize to JSON5 string.
    pub fn to_json5(&self) -> Result<String, ConfigError> {
        // json5 doesn't have a serializer, so we use serde_json with pretty print
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Resolved store directory.
    pub fn store_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.storage.dir {
            Some(dir) => Ok(dir.clone()),
            None => paths::store_dir(),
        }
    }

    /// Resolved database file path.
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.store_dir()?.join(&self.storage.database_file))
    }

    /// Resolved master key file path.
    pub fn key_path(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.store_dir()?.join(&self.storage.key_file))
    }

    /// Validate the configuration, collecting all errors before returning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        // 1. File names must be plain, distinct names
        for (label, name) in [
            ("database_file", &self.storage.database_file),
            ("key_file", &self.storage.key_file),
        ] {
            if name.is_empty() {
                errors.push(format!("storage.{} must not be empty", label));
            } else if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
                errors.push(format!(
                    "storage.{} must be a file name, got '{}'",
                    label, name
                ));
            }
        }
        if self.storage.database_file == self.storage.key_file {
            errors.push("storage.database_file and storage.key_file must differ".to_string());
        }

        // 2. Argon2 parameters
        let argon2 = &self.encryption.argon2;
        if argon2.iterations == 0 {
            errors.push("encryption.argon2.iterations must be greater than 0".to_string());
        }
        if argon2.parallelism == 0 {
            errors.push("encryption.argon2.parallelism must be greater than 0".to_string());
        }
        let min_memory_kib = argon2.parallelism.saturating_mul(8);
        if argon2.memory_kib < min_memory_kib {
            errors.push(format!(
                "encryption.argon2.memory_kib ({}) must be at least 8 * parallelism ({})",
                argon2.memory_kib, min_memory_kib
            ));
        }

        // 3. Recovery
        if self.recovery.max_password_attempts == 0 {
            errors.push("recovery.max_password_attempts must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KdfKind, KeyProtection};
    use tempfile::TempDir;

    #[test]
    fn test_parse_json5() {
        let config = Config::parse(
            r#"{
                // comments are allowed
                storage: { dir: "/tmp/creds", key_protection: "none" },
                encryption: { kdf: "argon2id", argon2: { memory_kib: 1024 } },
            }"#,
        )
        .unwrap();

        assert_eq!(config.storage.dir, Some(PathBuf::from("/tmp/creds")));
        assert_eq!(config.storage.key_protection, KeyProtection::None);
        assert_eq!(config.storage.database_file, "credentials.db");
        assert_eq!(config.encryption.kdf, KdfKind::Argon2id);
        assert_eq!(config.encryption.argon2.memory_kib, 1024);
        assert_eq!(config.encryption.argon2.iterations, 3);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!(
            Config::parse("not valid json"),
            Err(ConfigError::Json5(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("credstore.json5");

        let mut config = Config::default();
        config.storage.dir = Some(dir.path().join("store"));
        config.recovery.max_password_attempts = 5;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing() {
        let dir = TempDir::new().unwrap();
        let result = Config::load(&dir.path().join("missing.json5"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_or_default(Some(&dir.path().join("missing.json5"))).unwrap();
        assert_eq!(config.storage.key_file, "credentials.key");
    }

    #[test]
    fn test_resolved_paths() {
        let mut config = Config::default();
        config.storage.dir = Some(PathBuf::from("/srv/creds"));
        assert_eq!(
            config.database_path().unwrap(),
            PathBuf::from("/srv/creds/credentials.db")
        );
        assert_eq!(
            config.key_path().unwrap(),
            PathBuf::from("/srv/creds/credentials.key")
        );
    }

    #[test]
    fn test_validate_default_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut config = Config::default();
        config.storage.key_file = "../escape".to_string();
        config.encryption.argon2.iterations = 0;
        config.recovery.max_password_attempts = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("key_file"));
        assert!(err.contains("iterations"));
        assert!(err.contains("max_password_attempts"));
    }

    #[test]
    fn test_validate_huge_parallelism() {
        let mut config = Config::default();
        config.encryption.argon2.parallelism = u32::MAX;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("memory_kib"));
    }

    #[test]
    fn test_validate_same_file_names() {
        let mut config = Config::default();
        config.storage.key_file = config.storage.database_file.clone();
        assert!(config.validate().is_err());
    }
}
