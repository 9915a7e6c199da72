//! Recovery flows for a store whose key and database no longer match.
//!
//! [`RecoveryManager::clear`] resets the store to a consistent state, and
//! [`RecoveryManager::import`] replaces it with another database, asking the
//! caller for a master password when the source key file cannot open it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use credstore_core::config::KeyProtection;
use credstore_core::{Config, SecretString};
use rand::rngs::OsRng;
use tracing::{debug, info, warn};

use crate::crypto::RandomSource;
use crate::database::{self, CredentialMap};
use crate::error::{Result, StoreError};
use crate::fs::{FileSystem, StdFileSystem};
use crate::master_key::{MasterKey, MasterKeyManager};
use crate::store::StoreLocation;

/// Default number of master password prompts per import.
pub const DEFAULT_MAX_PASSWORD_ATTEMPTS: u32 = 3;

/// What [`RecoveryManager::clear`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    /// No key file: database and key file were both removed.
    Reset,
    /// The key did not open the database, which was removed. The key stays.
    DatabaseRemoved,
    /// The database was rewritten empty under the existing key.
    Emptied,
    /// Key file present and no database. Nothing was written.
    Unchanged,
}

/// What [`RecoveryManager::import`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    /// The source replaced the store.
    Imported { credentials: usize },
    /// The source is the store's own database. Nothing to do.
    SameFile,
    /// The password callback declined. Nothing was written.
    Unsatisfied,
}

/// Why a master password is being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordReason {
    /// No key file next to the source database.
    KeyFileMissing,
    /// The available key (file or earlier answer) did not open the source.
    IncorrectKey,
}

/// Passed to the import password callback.
#[derive(Debug, Clone)]
pub struct MasterPasswordRequest {
    pub source_db: PathBuf,
    pub reason: PasswordReason,
    /// 1-based prompt number.
    pub attempt: u32,
}

/// Clear and import operations over a store's files.
pub struct RecoveryManager {
    location: StoreLocation,
    keys: MasterKeyManager,
    fs: Arc<dyn FileSystem>,
    rng: Box<dyn RandomSource + Send>,
    max_password_attempts: u32,
    unsatisfied: bool,
}

impl RecoveryManager {
    pub fn new(
        location: StoreLocation,
        fs: Arc<dyn FileSystem>,
        rng: Box<dyn RandomSource + Send>,
    ) -> Self {
        let keys = MasterKeyManager::new(location.key_file.clone(), fs.clone());
        Self {
            location,
            keys,
            fs,
            rng,
            max_password_attempts: DEFAULT_MAX_PASSWORD_ATTEMPTS,
            unsatisfied: false,
        }
    }

    /// Manager for the store described by `config`, on the real file system.
    pub fn from_config(config: &Config) -> Result<Self> {
        let location = StoreLocation::from_config(config)?;
        let manager = Self::new(location, Arc::new(StdFileSystem), Box::new(OsRng))
            .with_protection(config.storage.key_protection)
            .with_max_password_attempts(config.recovery.max_password_attempts);
        Ok(manager)
    }

    /// Protection for key files this manager writes.
    pub fn with_protection(mut self, protection: KeyProtection) -> Self {
        self.keys = MasterKeyManager::new(self.location.key_file.clone(), self.fs.clone())
            .with_protection(protection);
        self
    }

    pub fn with_max_password_attempts(mut self, attempts: u32) -> Self {
        self.max_password_attempts = attempts.max(1);
        self
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    /// Whether the last `import` ended because the callback declined.
    pub fn is_unsatisfied_master_password_request(&self) -> bool {
        self.unsatisfied
    }

    /// Bring the store back to a consistent state.
    ///
    /// - no key file: remove the database and the key file;
    /// - key file present but it does not open the database (wrong, stale or
    ///   unreadable key): remove the database and keep the key file;
    /// - otherwise: rewrite the database as empty under the current key.
    ///
    /// A key file with no database next to it is left as is, so a second call
    /// after any branch ends in the same state as the first.
    pub fn clear(&mut self) -> Result<ClearOutcome> {
        let db_path = &self.location.database_file;
        let key = match self.keys.load() {
            Ok(Some(key)) => Some(key),
            Ok(None) => {
                self.fs.remove(db_path)?;
                self.keys.delete()?;
                info!(path = %db_path.display(), "cleared store: removed database and key");
                return Ok(ClearOutcome::Reset);
            }
            Err(StoreError::CorruptedKeyFile(reason)) => {
                warn!(path = %self.location.key_file.display(), "key file is unreadable: {reason}");
                None
            }
            Err(e) => return Err(e),
        };

        if !self.fs.exists(db_path) {
            debug!(path = %db_path.display(), "clear: key present and no database");
            return Ok(ClearOutcome::Unchanged);
        }

        let bytes = self.fs.read(db_path)?;
        let key = match key {
            Some(key) => match database::verify(&bytes, &key) {
                Ok(()) => key,
                Err(StoreError::IncorrectMasterPassword | StoreError::CorruptedDatabase(_)) => {
                    return self.remove_unreadable_database();
                }
                Err(e) => return Err(e),
            },
            None => return self.remove_unreadable_database(),
        };
        let spec = database::read_spec(&bytes)?;

        let bytes = database::encode(&CredentialMap::new(), &key, &spec, self.rng.as_mut())?;
        self.fs.write_atomic(db_path, &bytes)?;
        info!(path = %db_path.display(), "cleared store: wrote empty database");
        Ok(ClearOutcome::Emptied)
    }

    fn remove_unreadable_database(&self) -> Result<ClearOutcome> {
        self.fs.remove(&self.location.database_file)?;
        info!(
            path = %self.location.database_file.display(),
            "cleared store: key does not open database, removed database"
        );
        Ok(ClearOutcome::DatabaseRemoved)
    }

    /// Delete the database and key file unconditionally.
    pub fn reset(&mut self) -> Result<()> {
        let db_removed = self.fs.remove(&self.location.database_file)?;
        let key_removed = self.keys.delete()?;
        info!(db_removed, key_removed, "reset store");
        Ok(())
    }

    /// Replace the store with the database at `source_db`.
    ///
    /// The source key is read from a file with this store's key file name in
    /// the source directory. When it is missing or wrong, `request_password`
    /// is asked for the master password up to the configured number of
    /// attempts; returning `None` abandons the import without writing.
    pub fn import<F>(&mut self, source_db: &Path, mut request_password: F) -> Result<ImportOutcome>
    where
        F: FnMut(&MasterPasswordRequest) -> Option<SecretString>,
    {
        self.unsatisfied = false;

        if self.is_same_file(source_db) {
            debug!(path = %source_db.display(), "import source is the store itself");
            return Ok(ImportOutcome::SameFile);
        }

        let source_bytes = self.fs.read(source_db)?;
        let source_keys = MasterKeyManager::new(self.source_key_file(source_db), self.fs.clone());
        let source_key = match source_keys.load() {
            Ok(key) => key,
            Err(StoreError::CorruptedKeyFile(reason)) => {
                warn!(path = %source_keys.key_file().display(), "unreadable source key file: {reason}");
                None
            }
            Err(e) => return Err(e),
        };

        let mut reason = PasswordReason::KeyFileMissing;
        let mut opened: Option<(MasterKey, CredentialMap)> = None;
        if let Some(key) = source_key {
            match database::decode(&source_bytes, &key) {
                Ok(map) => opened = Some((key, map)),
                Err(StoreError::IncorrectMasterPassword) => reason = PasswordReason::IncorrectKey,
                Err(e) => return Err(e),
            }
        }

        let mut attempt = 0;
        let (key, map) = loop {
            if let Some(found) = opened.take() {
                break found;
            }
            if attempt >= self.max_password_attempts {
                warn!(path = %source_db.display(), attempts = attempt, "giving up on import");
                return Err(StoreError::IncorrectMasterPassword);
            }
            attempt += 1;

            let request = MasterPasswordRequest {
                source_db: source_db.to_path_buf(),
                reason,
                attempt,
            };
            let Some(password) = request_password(&request) else {
                self.unsatisfied = true;
                info!(path = %source_db.display(), "import cancelled: no master password given");
                return Ok(ImportOutcome::Unsatisfied);
            };

            let key = MasterKey::from_passphrase(&password);
            match database::decode(&source_bytes, &key) {
                Ok(map) => opened = Some((key, map)),
                Err(StoreError::IncorrectMasterPassword) => reason = PasswordReason::IncorrectKey,
                Err(e) => return Err(e),
            }
        };

        let previous = if self.fs.exists(&self.location.database_file) {
            Some(self.fs.read(&self.location.database_file)?)
        } else {
            None
        };
        self.keys.install(
            &self.location.database_file,
            &source_bytes,
            &key,
            previous.as_deref(),
            self.rng.as_mut(),
        )?;

        info!(
            source = %source_db.display(),
            destination = %self.location.database_file.display(),
            credentials = map.len(),
            "imported credential database"
        );
        Ok(ImportOutcome::Imported {
            credentials: map.len(),
        })
    }

    fn source_key_file(&self, source_db: &Path) -> PathBuf {
        source_db
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(self.location.key_file_name())
    }

    fn is_same_file(&self, source_db: &Path) -> bool {
        if source_db == self.location.database_file {
            return true;
        }
        match (
            self.fs.canonicalize(source_db),
            self.fs.canonicalize(&self.location.database_file),
        ) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}
