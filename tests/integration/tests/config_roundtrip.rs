//! Config save/load roundtrip integration tests.
//!
//! These tests verify that configuration can be serialized, written to disk,
//! and loaded back with identical field values.

use credstore_core::config::{Config, KdfKind, KeyProtection};
use credstore_secrets::{EncryptionSpec, KdfParams, StoreLocation};
use std::path::Path;
use tempfile::TempDir;

#[test]
fn test_config_save_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credstore.json5");

    let config = Config::default();
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_config_modify_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credstore.json5");

    let mut config = Config::default();
    config.storage.key_protection = KeyProtection::None;
    config.encryption.kdf = KdfKind::Argon2id;
    config.recovery.max_password_attempts = 5;
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.storage.key_protection, KeyProtection::None);
    assert_eq!(loaded.encryption.kdf, KdfKind::Argon2id);
    assert_eq!(loaded.recovery.max_password_attempts, 5);
}

#[test]
fn test_config_load_nonexistent() {
    let result = Config::load(Path::new("/nonexistent/credstore.json5"));
    assert!(result.is_err());
}

#[test]
fn test_config_parse_invalid() {
    let result = Config::parse("not valid json");
    assert!(result.is_err());
}

#[test]
fn test_config_drives_store_location_and_spec() {
    let dir = TempDir::new().unwrap();
    let config = Config::parse(&format!(
        r#"{{
            // comments are fine in json5
            storage: {{ dir: {:?}, database_file: "vault.db", key_file: "vault.key" }},
            encryption: {{ kdf: "argon2id", argon2: {{ memory_kib: 1024, iterations: 2, parallelism: 1 }} }},
        }}"#,
        dir.path().display().to_string()
    ))
    .unwrap();
    config.validate().unwrap();

    let location = StoreLocation::from_config(&config).unwrap();
    assert_eq!(location.database_file, dir.path().join("vault.db"));
    assert_eq!(location.key_file, dir.path().join("vault.key"));

    let spec = EncryptionSpec::from_config(&config.encryption);
    assert_eq!(
        spec.kdf,
        KdfParams::Argon2id {
            memory_kib: 1024,
            iterations: 2,
            parallelism: 1
        }
    );
}
