//! Cross-component flows: store, master key rotation, and recovery working
//! on the same files.

use std::sync::Arc;

use credstore_core::SecretString;
use credstore_integration_tests::open_store;
use credstore_secrets::{
    ClearOutcome, CredentialAttributes, Credentials, EncryptionSpec, ImportOutcome, KdfParams,
    MasterKeyManager, PasswordReason, RecoveryManager, StdFileSystem, StoreError, StoreLocation,
};
use rand::rngs::OsRng;
use tempfile::TempDir;

fn cheap_passphrase_spec() -> EncryptionSpec {
    EncryptionSpec {
        kdf: KdfParams::Argon2id {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        },
        ..EncryptionSpec::default()
    }
}

fn recovery(location: &StoreLocation) -> RecoveryManager {
    RecoveryManager::new(location.clone(), Arc::new(StdFileSystem), Box::new(OsRng))
}

#[test]
fn test_lost_key_then_clear_then_reuse() {
    let dir = TempDir::new().unwrap();
    let location = StoreLocation::in_dir(dir.path());
    let attrs = CredentialAttributes::new("mail").with_user("me");

    let mut store = open_store(dir.path()).unwrap();
    store.set(&attrs, Some(Credentials::with_password("me", "pw")));
    store.save(&EncryptionSpec::default()).unwrap();
    drop(store);

    std::fs::remove_file(&location.key_file).unwrap();
    assert!(matches!(
        open_store(dir.path()),
        Err(StoreError::MissingMasterKey(_))
    ));

    assert_eq!(recovery(&location).clear().unwrap(), ClearOutcome::Reset);

    let mut store = open_store(dir.path()).unwrap();
    assert!(store.is_empty());
    store.set(&attrs, Some(Credentials::with_password("me", "fresh")));
    store.save(&EncryptionSpec::default()).unwrap();
    assert_eq!(
        open_store(dir.path()).unwrap().get_password(&attrs),
        Some(SecretString::new("fresh"))
    );
}

#[test]
fn test_foreign_key_then_clear_keeps_key() {
    let dir = TempDir::new().unwrap();
    let location = StoreLocation::in_dir(dir.path());

    let mut store = open_store(dir.path()).unwrap();
    store.set_password(&CredentialAttributes::new("a"), Some("1".into()));
    store.save(&EncryptionSpec::default()).unwrap();
    drop(store);

    MasterKeyManager::new(location.key_file.clone(), Arc::new(StdFileSystem))
        .generate(&mut OsRng, &EncryptionSpec::default(), true)
        .unwrap();
    let foreign_key = std::fs::read(&location.key_file).unwrap();
    assert!(matches!(
        open_store(dir.path()),
        Err(StoreError::IncorrectMasterPassword)
    ));

    assert_eq!(
        recovery(&location).clear().unwrap(),
        ClearOutcome::DatabaseRemoved
    );
    assert_eq!(recovery(&location).clear().unwrap(), ClearOutcome::Unchanged);
    assert!(!location.database_file.exists());
    assert_eq!(std::fs::read(&location.key_file).unwrap(), foreign_key);
    assert!(open_store(dir.path()).unwrap().is_empty());
}

#[test]
fn test_backup_protected_by_master_password_restores_elsewhere() {
    let laptop = TempDir::new().unwrap();
    let desktop = TempDir::new().unwrap();
    let attrs = CredentialAttributes::new("vpn").with_user("alice");

    let mut store = open_store(laptop.path()).unwrap();
    store.set(&attrs, Some(Credentials::with_password("alice", "tunnel")));
    store
        .set_master_password(&SecretString::new("open sesame"), &cheap_passphrase_spec())
        .unwrap();

    // Only the database travels; the key file stays behind.
    let backup_dir = TempDir::new().unwrap();
    let backup = backup_dir.path().join("credentials.db");
    std::fs::copy(laptop.path().join("credentials.db"), &backup).unwrap();

    let desktop_location = StoreLocation::in_dir(desktop.path());
    let mut manager = recovery(&desktop_location);
    let mut seen = Vec::new();
    let outcome = manager
        .import(&backup, |request| {
            seen.push(request.reason);
            Some(SecretString::new("open sesame"))
        })
        .unwrap();

    assert_eq!(outcome, ImportOutcome::Imported { credentials: 1 });
    assert_eq!(seen, vec![PasswordReason::KeyFileMissing]);

    let restored = open_store(desktop.path()).unwrap();
    assert_eq!(
        restored.get_password(&attrs),
        Some(SecretString::new("tunnel"))
    );
    assert_eq!(restored.master_key_is_auto_generated(), Some(false));
    assert_eq!(restored.stored_spec().unwrap(), Some(cheap_passphrase_spec()));
}

#[test]
fn test_cancelled_import_leaves_store_usable() {
    let source = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    let attrs = CredentialAttributes::new("keep");

    let mut src_store = open_store(source.path()).unwrap();
    src_store.set_password(&attrs, Some("x".into()));
    src_store
        .set_master_password(&SecretString::new("pw"), &cheap_passphrase_spec())
        .unwrap();
    std::fs::remove_file(source.path().join("credentials.key")).unwrap();

    let mut dest_store = open_store(dest.path()).unwrap();
    dest_store.set_password(&attrs, Some("mine".into()));
    dest_store.save(&EncryptionSpec::default()).unwrap();

    let mut manager = recovery(&StoreLocation::in_dir(dest.path()));
    let outcome = manager
        .import(&source.path().join("credentials.db"), |_| None)
        .unwrap();
    assert_eq!(outcome, ImportOutcome::Unsatisfied);
    assert!(manager.is_unsatisfied_master_password_request());

    dest_store.reload().unwrap();
    assert_eq!(
        dest_store.get_password(&attrs),
        Some(SecretString::new("mine"))
    );
}

#[test]
fn test_cancelled_import_into_empty_store_touches_nothing() {
    let source = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    let attrs = CredentialAttributes::new("svc").with_user("u");

    let mut src_store = open_store(source.path()).unwrap();
    src_store.set(&attrs, Some(Credentials::with_password("u", "original")));
    src_store.save(&EncryptionSpec::default()).unwrap();
    drop(src_store);

    let source_db = source.path().join("credentials.db");
    let source_key = source.path().join("credentials.key");
    let db_before = std::fs::read(&source_db).unwrap();
    let key_backup = std::fs::read(&source_key).unwrap();
    std::fs::remove_file(&source_key).unwrap();

    let destination = StoreLocation::in_dir(dest.path());
    let mut manager = recovery(&destination);
    let outcome = manager.import(&source_db, |_| None).unwrap();

    assert_eq!(outcome, ImportOutcome::Unsatisfied);
    assert!(manager.is_unsatisfied_master_password_request());
    assert!(!destination.database_file.exists());
    assert!(!destination.key_file.exists());
    assert_eq!(std::fs::read(&source_db).unwrap(), db_before);

    std::fs::write(&source_key, &key_backup).unwrap();
    let restored = open_store(source.path()).unwrap();
    assert_eq!(
        restored.get_password(&attrs),
        Some(SecretString::new("original"))
    );
}

#[test]
fn test_rotation_keeps_credentials_and_changes_key() {
    let dir = TempDir::new().unwrap();
    let location = StoreLocation::in_dir(dir.path());

    let mut store = open_store(dir.path()).unwrap();
    for (service, password) in [("a", "1"), ("b", "2"), ("c", "3")] {
        store.set_password(&CredentialAttributes::new(service), Some(password.into()));
    }
    store.save(&EncryptionSpec::default()).unwrap();
    let key_before = std::fs::read(&location.key_file).unwrap();

    store.rotate_master_key(&EncryptionSpec::default()).unwrap();

    assert_ne!(std::fs::read(&location.key_file).unwrap(), key_before);
    let reopened = open_store(dir.path()).unwrap();
    assert_eq!(reopened.services(), vec!["a", "b", "c"]);
    assert_eq!(reopened.master_key_is_auto_generated(), Some(true));
}
