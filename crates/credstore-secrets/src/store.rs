//! Credential store backends.
//!
//! Defines the [`CredentialBackend`] trait and provides [`CredentialStore`],
//! an in-memory map of service name to [`Credentials`] that is persisted as a
//! single encrypted database file next to a master key file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use credstore_core::{Config, SecretString};
use rand::rngs::OsRng;
use tracing::{debug, info, warn};

use crate::crypto::RandomSource;
use crate::database::{self, CredentialMap};
use crate::error::{Result, StoreError};
use crate::fs::{FileSystem, StdFileSystem};
use crate::kdf::{EncryptionSpec, KdfParams};
use crate::master_key::{MasterKey, MasterKeyManager};
use crate::types::{CredentialAttributes, Credentials};

/// Default database file name.
pub const DEFAULT_DATABASE_FILE: &str = "credentials.db";

/// Default master key file name. Import looks for this name next to the
/// source database.
pub const DEFAULT_KEY_FILE: &str = "credentials.key";

/// Operations every credential backend offers.
///
/// Selection between backends (this file store, an OS keychain, ...) happens
/// at configuration time, outside this crate.
pub trait CredentialBackend {
    /// Look up the record for `attrs.service_name`.
    fn get(&self, attrs: &CredentialAttributes) -> Option<Credentials>;

    /// Replace (`Some`) or delete (`None`) the record for `attrs.service_name`.
    fn set(&mut self, attrs: &CredentialAttributes, credentials: Option<Credentials>);

    /// Persist pending changes.
    fn save(&mut self, spec: &EncryptionSpec) -> Result<()>;

    /// Discard pending changes and re-read persisted state.
    fn reload(&mut self) -> Result<()>;

    /// Drop every record in memory. Nothing is persisted until `save`.
    fn clear(&mut self);

    /// Remove all persisted state.
    fn delete_file_storage(&mut self) -> Result<()>;
}

/// Paths of a store's database and key file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLocation {
    pub database_file: PathBuf,
    pub key_file: PathBuf,
}

impl StoreLocation {
    pub fn new(database_file: impl Into<PathBuf>, key_file: impl Into<PathBuf>) -> Self {
        Self {
            database_file: database_file.into(),
            key_file: key_file.into(),
        }
    }

    /// Default file names inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(DEFAULT_DATABASE_FILE), dir.join(DEFAULT_KEY_FILE))
    }

    /// Paths from the `storage` config section.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config.database_path()?, config.key_path()?))
    }

    /// Name of the key file, used to find a key next to another database.
    pub fn key_file_name(&self) -> &std::ffi::OsStr {
        self.key_file
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new(DEFAULT_KEY_FILE))
    }
}

/// Encrypted file-backed credential store.
///
/// Mutations only touch memory until [`CredentialStore::save`]. The master key
/// is created lazily on the first save when none exists.
pub struct CredentialStore {
    location: StoreLocation,
    keys: MasterKeyManager,
    fs: Arc<dyn FileSystem>,
    rng: Box<dyn RandomSource + Send>,
    master_key: Option<MasterKey>,
    /// Whether the master key belongs in the key file. False for custom
    /// in-memory keys.
    persist_key: bool,
    db: CredentialMap,
    memory_only: HashMap<String, Credentials>,
    dirty: bool,
}

impl CredentialStore {
    /// Open the store at `location`, loading the key file and database if
    /// present.
    ///
    /// Fails with [`StoreError::MissingMasterKey`] when a database exists but
    /// the key file does not, and with [`StoreError::IncorrectMasterPassword`]
    /// when the key does not open the database. No file is modified either way.
    pub fn open(
        location: StoreLocation,
        fs: Arc<dyn FileSystem>,
        rng: Box<dyn RandomSource + Send>,
    ) -> Result<Self> {
        let keys = MasterKeyManager::new(location.key_file.clone(), fs.clone());
        Self::open_with_manager(location, keys, fs, rng)
    }

    /// Open with an explicit [`MasterKeyManager`] (e.g. non-default key
    /// protection).
    pub fn open_with_manager(
        location: StoreLocation,
        keys: MasterKeyManager,
        fs: Arc<dyn FileSystem>,
        rng: Box<dyn RandomSource + Send>,
    ) -> Result<Self> {
        let master_key = keys.load()?;
        let mut store = Self::new_unloaded(location, keys, fs, rng, master_key, true);
        store.load_database()?;
        Ok(store)
    }

    /// Open with a custom master key that is held only in memory.
    ///
    /// The key file is neither read nor written by this store.
    pub fn open_with_key(
        location: StoreLocation,
        key: MasterKey,
        fs: Arc<dyn FileSystem>,
        rng: Box<dyn RandomSource + Send>,
    ) -> Result<Self> {
        let keys = MasterKeyManager::new(location.key_file.clone(), fs.clone());
        let mut store = Self::new_unloaded(location, keys, fs, rng, Some(key), false);
        store.load_database()?;
        Ok(store)
    }

    /// Open the store described by `config` on the real file system.
    pub fn from_config(config: &Config) -> Result<Self> {
        let location = StoreLocation::from_config(config)?;
        let fs: Arc<dyn FileSystem> = Arc::new(StdFileSystem);
        let keys = MasterKeyManager::new(location.key_file.clone(), fs.clone())
            .with_protection(config.storage.key_protection);
        Self::open_with_manager(location, keys, fs, Box::new(OsRng))
    }

    fn new_unloaded(
        location: StoreLocation,
        keys: MasterKeyManager,
        fs: Arc<dyn FileSystem>,
        rng: Box<dyn RandomSource + Send>,
        master_key: Option<MasterKey>,
        persist_key: bool,
    ) -> Self {
        Self {
            location,
            keys,
            fs,
            rng,
            master_key,
            persist_key,
            db: CredentialMap::new(),
            memory_only: HashMap::new(),
            dirty: false,
        }
    }

    /// Replace the in-memory map with the database file's contents.
    fn load_database(&mut self) -> Result<()> {
        let path = &self.location.database_file;
        if !self.fs.exists(path) {
            self.db.clear();
            self.dirty = false;
            return Ok(());
        }

        let key = self
            .master_key
            .as_ref()
            .ok_or_else(|| StoreError::MissingMasterKey(self.location.key_file.clone()))?;
        let bytes = self.fs.read(path)?;
        self.db = database::decode(&bytes, key)?;
        self.dirty = false;
        debug!(path = %path.display(), entries = self.db.len(), "loaded credential database");
        Ok(())
    }

    /// Look up credentials by service name.
    ///
    /// Returns `None` when there is no record, when the record is empty, or
    /// when `attrs` names a user and the record belongs to a different one.
    pub fn get(&self, attrs: &CredentialAttributes) -> Option<Credentials> {
        let record = self
            .memory_only
            .get(&attrs.service_name)
            .or_else(|| self.db.get(&attrs.service_name))?;

        if record.is_empty() {
            return None;
        }
        if let (Some(wanted), Some(stored)) = (&attrs.user_name, &record.user_name) {
            if wanted != stored {
                return None;
            }
        }
        Some(record.clone())
    }

    /// Replace or delete the record for `attrs.service_name`.
    ///
    /// A new record replaces any previous one for the same service, whatever
    /// its user. Memory-only attributes never reach the database; setting one
    /// also drops a persisted record for that service.
    pub fn set(&mut self, attrs: &CredentialAttributes, credentials: Option<Credentials>) {
        let service = &attrs.service_name;
        match credentials.filter(|c| !c.is_empty()) {
            None => {
                self.memory_only.remove(service);
                if self.db.remove(service).is_some() {
                    self.dirty = true;
                }
            }
            Some(creds) if attrs.is_memory_only => {
                self.memory_only.insert(service.clone(), creds);
                if self.db.remove(service).is_some() {
                    self.dirty = true;
                }
            }
            Some(creds) => {
                self.memory_only.remove(service);
                self.db.insert(service.clone(), creds);
                self.dirty = true;
            }
        }
    }

    /// Set only the password; the user name comes from `attrs`.
    pub fn set_password(&mut self, attrs: &CredentialAttributes, password: Option<SecretString>) {
        let credentials = password.map(|p| Credentials::new(attrs.user_name.clone(), Some(p)));
        self.set(attrs, credentials);
    }

    /// The password stored for `attrs`, if any.
    pub fn get_password(&self, attrs: &CredentialAttributes) -> Option<SecretString> {
        self.get(attrs).and_then(|c| c.secret.clone())
    }

    /// Persist the in-memory map, creating the master key first if needed.
    pub fn save(&mut self, spec: &EncryptionSpec) -> Result<()> {
        let key = match self.master_key.take() {
            Some(key) => {
                if self.persist_key && !self.keys.exists() {
                    warn!(path = %self.keys.key_file().display(), "key file vanished, rewriting it");
                    if let Err(e) = self.keys.save(&key, self.rng.as_mut()) {
                        self.master_key = Some(key);
                        return Err(e);
                    }
                }
                key
            }
            None => self.keys.generate(self.rng.as_mut(), spec, true)?,
        };

        if !key.is_auto_generated() && spec.kdf == KdfParams::HkdfSha256 {
            warn!("saving a passphrase-protected database with HKDF; consider argon2id");
        }

        let result = database::encode(&self.db, &key, spec, self.rng.as_mut()).and_then(|bytes| {
            self.fs
                .write_atomic(&self.location.database_file, &bytes)
                .map_err(StoreError::from)
        });
        self.master_key = Some(key);
        result?;

        self.dirty = false;
        info!(
            path = %self.location.database_file.display(),
            entries = self.db.len(),
            "saved credential database"
        );
        Ok(())
    }

    /// Re-read the database under the current key, discarding unsaved changes.
    pub fn reload(&mut self) -> Result<()> {
        if self.master_key.is_none() && self.persist_key {
            self.master_key = self.keys.load()?;
        }
        self.load_database()
    }

    /// Drop every persisted record from memory.
    pub fn clear(&mut self) {
        if !self.db.is_empty() {
            self.dirty = true;
        }
        self.db.clear();
        self.memory_only.clear();
    }

    /// Delete the database and key files, and forget the in-memory state.
    pub fn delete_file_storage(&mut self) -> Result<()> {
        let db_removed = self.fs.remove(&self.location.database_file)?;
        let key_removed = self.keys.delete()?;
        info!(db_removed, key_removed, "deleted credential file storage");

        self.db.clear();
        self.memory_only.clear();
        self.dirty = false;
        if self.persist_key {
            self.master_key = None;
        }
        Ok(())
    }

    /// Switch to a passphrase master key, re-encrypting the database.
    pub fn set_master_password(
        &mut self,
        passphrase: &SecretString,
        spec: &EncryptionSpec,
    ) -> Result<()> {
        self.change_master_key(Some(passphrase), spec)
    }

    /// Switch to a freshly generated master key, re-encrypting the database.
    pub fn rotate_master_key(&mut self, spec: &EncryptionSpec) -> Result<()> {
        self.change_master_key(None, spec)
    }

    fn change_master_key(
        &mut self,
        passphrase: Option<&SecretString>,
        spec: &EncryptionSpec,
    ) -> Result<()> {
        spec.validate()?;
        if self.dirty && self.master_key.is_some() {
            self.save(spec)?;
        }

        let new_key = match &self.master_key {
            Some(current) => self.keys.rotate(
                &self.location.database_file,
                current,
                passphrase,
                spec,
                self.rng.as_mut(),
            )?,
            None => {
                let key = match passphrase {
                    Some(p) => MasterKey::from_passphrase(p),
                    None => MasterKey::generate(self.rng.as_mut()),
                };
                let bytes = database::encode(&self.db, &key, spec, self.rng.as_mut())?;
                self.keys.install(
                    &self.location.database_file,
                    &bytes,
                    &key,
                    None,
                    self.rng.as_mut(),
                )?;
                key
            }
        };

        self.master_key = Some(new_key);
        self.persist_key = true;
        self.dirty = false;
        Ok(())
    }

    /// Persisted service names, sorted.
    pub fn services(&self) -> Vec<&str> {
        self.db.keys().map(String::as_str).collect()
    }

    /// Number of persisted records.
    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    /// Whether there are changes not yet saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// `None` when no master key exists yet.
    pub fn master_key_is_auto_generated(&self) -> Option<bool> {
        self.master_key.as_ref().map(MasterKey::is_auto_generated)
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    /// Spec of the database on disk, if there is one.
    pub fn stored_spec(&self) -> Result<Option<EncryptionSpec>> {
        if !self.fs.exists(&self.location.database_file) {
            return Ok(None);
        }
        let bytes = self.fs.read(&self.location.database_file)?;
        Ok(Some(database::read_spec(&bytes)?))
    }
}

impl CredentialBackend for CredentialStore {
    fn get(&self, attrs: &CredentialAttributes) -> Option<Credentials> {
        CredentialStore::get(self, attrs)
    }

    fn set(&mut self, attrs: &CredentialAttributes, credentials: Option<Credentials>) {
        CredentialStore::set(self, attrs, credentials)
    }

    fn save(&mut self, spec: &EncryptionSpec) -> Result<()> {
        CredentialStore::save(self, spec)
    }

    fn reload(&mut self) -> Result<()> {
        CredentialStore::reload(self)
    }

    fn clear(&mut self) {
        CredentialStore::clear(self)
    }

    fn delete_file_storage(&mut self) -> Result<()> {
        CredentialStore::delete_file_storage(self)
    }
}
