//! Master key lifecycle: generation, key file persistence, verification and
//! rotation.
//!
//! Key file format (JSON):
//! ```json
//! { "version": 1, "protection": "builtin", "key": "<base64>", "nonce": "<hex>",
//!   "auto_generated": true, "created_at": "2026-01-01T00:00:00Z" }
//! ```
//! With `builtin` protection the key bytes are AES-GCM sealed under a key
//! compiled into the binary. That keeps the raw key out of casual view (backups,
//! `cat`), nothing more.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use credstore_core::config::KeyProtection;
use credstore_core::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use zeroize::{Zeroize, Zeroizing};

use crate::crypto::{self, RandomSource, NONCE_SIZE};
use crate::database::{self, CredentialMap};
use crate::error::{Result, StoreError};
use crate::fs::{discard_temp, FileSystem};
use crate::kdf::EncryptionSpec;

const KEY_FILE_VERSION: u32 = 1;

const BUILTIN_SEED: &[u8] = b"credstore built-in key file protection";
const BUILTIN_SALT: &[u8] = b"credstore-key-file";
const BUILTIN_INFO: &[u8] = b"credstore-key-file-v1";

/// Raw master key material. Zeroed on drop, never printed.
#[derive(Clone)]
pub struct MasterKey {
    bytes: Zeroizing<Vec<u8>>,
    auto_generated: bool,
}

impl MasterKey {
    /// Wrap existing key material.
    pub fn from_bytes(bytes: Vec<u8>, auto_generated: bool) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
            auto_generated,
        }
    }

    /// Use a human passphrase as key material.
    ///
    /// Databases protected by such keys should be written with an Argon2id
    /// [`EncryptionSpec`].
    pub fn from_passphrase(passphrase: &SecretString) -> Self {
        Self::from_bytes(passphrase.as_bytes().to_vec(), false)
    }

    /// Fresh random key material.
    pub fn generate(rng: &mut dyn RandomSource) -> Self {
        Self {
            bytes: crypto::generate_key_material(rng),
            auto_generated: true,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Whether the key was generated rather than chosen by a user.
    pub fn is_auto_generated(&self) -> bool {
        self.auto_generated
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"[REDACTED]")
            .field("auto_generated", &self.auto_generated)
            .finish()
    }
}

/// On-disk representation of a master key.
#[derive(Serialize, Deserialize)]
struct KeyFile {
    version: u32,
    protection: KeyProtection,
    /// Key bytes (sealed when `protection` is builtin), base64-encoded.
    key: String,
    /// Nonce for builtin protection, hex-encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nonce: Option<String>,
    auto_generated: bool,
    created_at: DateTime<Utc>,
}

impl Drop for KeyFile {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

fn builtin_key() -> Result<Zeroizing<[u8; crypto::KEY_SIZE]>> {
    crypto::hkdf_sha256(BUILTIN_SEED, BUILTIN_SALT, BUILTIN_INFO)
}

/// Owns the key file and the policy for writing it.
pub struct MasterKeyManager {
    key_file: PathBuf,
    fs: Arc<dyn FileSystem>,
    protection: KeyProtection,
}

impl MasterKeyManager {
    pub fn new(key_file: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            key_file: key_file.into(),
            fs,
            protection: KeyProtection::default(),
        }
    }

    /// Set the protection applied when writing the key file.
    pub fn with_protection(mut self, protection: KeyProtection) -> Self {
        self.protection = protection;
        self
    }

    pub fn key_file(&self) -> &Path {
        &self.key_file
    }

    pub fn exists(&self) -> bool {
        self.fs.exists(&self.key_file)
    }

    /// Read the key file. `Ok(None)` when it does not exist.
    pub fn load(&self) -> Result<Option<MasterKey>> {
        if !self.exists() {
            return Ok(None);
        }
        let data = Zeroizing::new(self.fs.read(&self.key_file)?);
        let key = decode_key_file(&data)?;
        debug!(path = %self.key_file.display(), "loaded master key");
        Ok(Some(key))
    }

    /// Create new key material.
    ///
    /// With `persist` the key is written to the key file; otherwise it only
    /// lives in memory (a custom key the caller keeps track of).
    pub fn generate(
        &self,
        rng: &mut dyn RandomSource,
        spec: &EncryptionSpec,
        persist: bool,
    ) -> Result<MasterKey> {
        spec.validate()?;
        let key = MasterKey::generate(rng);
        if persist {
            self.save(&key, rng)?;
        }
        info!(path = %self.key_file.display(), persist, "generated master key");
        Ok(key)
    }

    /// Atomically write `key` to the key file.
    pub fn save(&self, key: &MasterKey, rng: &mut dyn RandomSource) -> Result<()> {
        let data = Zeroizing::new(self.encode(key, rng)?);
        self.fs.write_atomic(&self.key_file, &data)?;
        debug!(path = %self.key_file.display(), "wrote master key file");
        Ok(())
    }

    /// Delete the key file. Absent files are not an error.
    pub fn delete(&self) -> Result<bool> {
        let removed = self.fs.remove(&self.key_file)?;
        if removed {
            info!(path = %self.key_file.display(), "deleted master key file");
        }
        Ok(removed)
    }

    /// Check that `key` opens `database_bytes`.
    pub fn verify(&self, database_bytes: &[u8], key: &MasterKey) -> Result<()> {
        database::verify(database_bytes, key)
    }

    /// Serialize `key` in key file format under this manager's protection.
    pub fn encode(&self, key: &MasterKey, rng: &mut dyn RandomSource) -> Result<Vec<u8>> {
        let (encoded, nonce) = match self.protection {
            KeyProtection::None => (BASE64.encode(key.as_bytes()), None),
            KeyProtection::Builtin => {
                let nonce: [u8; NONCE_SIZE] = crypto::random_array(rng);
                let sealed = crypto::seal(&*builtin_key()?, &nonce, key.as_bytes(), BUILTIN_INFO)?;
                (BASE64.encode(sealed), Some(hex::encode(nonce)))
            }
        };
        let file = KeyFile {
            version: KEY_FILE_VERSION,
            protection: self.protection,
            key: encoded,
            nonce,
            auto_generated: key.is_auto_generated(),
            created_at: Utc::now(),
        };
        Ok(serde_json::to_vec_pretty(&file)?)
    }

    /// Re-encrypt the whole database under a new key and replace both files.
    ///
    /// The new key comes from `new_passphrase`, or is generated when `None`.
    /// The database at `database_file` must open with `current`; a missing
    /// database rotates an empty one.
    pub fn rotate(
        &self,
        database_file: &Path,
        current: &MasterKey,
        new_passphrase: Option<&SecretString>,
        spec: &EncryptionSpec,
        rng: &mut dyn RandomSource,
    ) -> Result<MasterKey> {
        let previous = if self.fs.exists(database_file) {
            Some(self.fs.read(database_file)?)
        } else {
            None
        };
        let map = match &previous {
            Some(bytes) => database::decode(bytes, current)?,
            None => CredentialMap::new(),
        };

        let new_key = match new_passphrase {
            Some(passphrase) => MasterKey::from_passphrase(passphrase),
            None => MasterKey::generate(rng),
        };
        let encoded = database::encode(&map, &new_key, spec, rng)?;
        database::verify(&encoded, &new_key)?;

        self.install(database_file, &encoded, &new_key, previous.as_deref(), rng)?;
        info!(
            path = %self.key_file.display(),
            entries = map.len(),
            "rotated master key"
        );
        Ok(new_key)
    }

    /// Replace the database and the key file as a pair.
    ///
    /// Order: database temp, key temp, rename database, rename key. If the key
    /// rename fails after the database rename, `previous_database` (if any) is
    /// put back so the old pair stays readable.
    pub(crate) fn install(
        &self,
        database_file: &Path,
        database_bytes: &[u8],
        key: &MasterKey,
        previous_database: Option<&[u8]>,
        rng: &mut dyn RandomSource,
    ) -> Result<()> {
        let key_bytes = Zeroizing::new(self.encode(key, rng)?);

        let db_tmp = self.fs.write_temp(database_file, database_bytes)?;
        let key_tmp = match self.fs.write_temp(&self.key_file, &key_bytes) {
            Ok(tmp) => tmp,
            Err(e) => {
                discard_temp(self.fs.as_ref(), &db_tmp);
                return Err(e.into());
            }
        };

        if let Err(e) = self.fs.rename(&db_tmp, database_file) {
            discard_temp(self.fs.as_ref(), &db_tmp);
            discard_temp(self.fs.as_ref(), &key_tmp);
            return Err(e.into());
        }

        if let Err(e) = self.fs.rename(&key_tmp, &self.key_file) {
            discard_temp(self.fs.as_ref(), &key_tmp);
            let restored = match previous_database {
                Some(old) => self.fs.write_atomic(database_file, old),
                None => self.fs.remove(database_file).map(drop),
            };
            if let Err(restore_err) = restored {
                warn!(
                    path = %database_file.display(),
                    "could not restore previous database after failed key write: {restore_err}"
                );
            }
            return Err(e.into());
        }

        debug!(
            database = %database_file.display(),
            key = %self.key_file.display(),
            "installed database and master key"
        );
        Ok(())
    }
}

fn decode_key_file(data: &[u8]) -> Result<MasterKey> {
    let file: KeyFile = serde_json::from_slice(data)
        .map_err(|e| StoreError::CorruptedKeyFile(format!("invalid key file: {e}")))?;
    if file.version != KEY_FILE_VERSION {
        return Err(StoreError::CorruptedKeyFile(format!(
            "unsupported key file version {}",
            file.version
        )));
    }

    let raw = BASE64
        .decode(file.key.as_bytes())
        .map_err(|e| StoreError::CorruptedKeyFile(format!("key is not base64: {e}")))?;

    let bytes = match file.protection {
        KeyProtection::None => raw,
        KeyProtection::Builtin => {
            let nonce_hex = file.nonce.as_deref().ok_or_else(|| {
                StoreError::CorruptedKeyFile("builtin protection without nonce".to_string())
            })?;
            let nonce: [u8; NONCE_SIZE] = hex::decode(nonce_hex)
                .ok()
                .and_then(|v| v.try_into().ok())
                .ok_or_else(|| StoreError::CorruptedKeyFile("invalid nonce".to_string()))?;
            let opened = crypto::open(&*builtin_key()?, &nonce, &raw, BUILTIN_INFO)
                .ok_or_else(|| {
                    StoreError::CorruptedKeyFile("built-in protection check failed".to_string())
                })?;
            opened.to_vec()
        }
    };

    if bytes.is_empty() {
        return Err(StoreError::CorruptedKeyFile("empty key".to_string()));
    }
    Ok(MasterKey::from_bytes(bytes, file.auto_generated))
}
