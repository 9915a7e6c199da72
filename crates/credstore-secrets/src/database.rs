//! Encrypted database encoding.
//!
//! File layout (v1):
//! - magic: `CREDSDB1` (8 bytes)
//! - header length: u32, big-endian
//! - header: JSON [`DatabaseHeader`] (spec, salt, nonce)
//! - body: AES-256-GCM ciphertext of the JSON payload (ciphertext + tag)
//!
//! Magic and header bytes are the AEAD associated data, so a header that was
//! tampered with fails authentication like a wrong key would.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use credstore_core::SecretString;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::crypto::{self, RandomSource, NONCE_SIZE, SALT_SIZE};
use crate::error::{Result, StoreError};
use crate::kdf::EncryptionSpec;
use crate::master_key::MasterKey;
use crate::types::Credentials;

/// File magic (8 bytes).
pub const DATABASE_MAGIC: &[u8; 8] = b"CREDSDB1";

const FORMAT_VERSION: u32 = 1;
const PAYLOAD_VERSION: u32 = 1;

/// Upper bound for the JSON header; anything larger is not our file.
const MAX_HEADER_LEN: usize = 16 * 1024;

/// In-memory database: one record per service name.
pub type CredentialMap = BTreeMap<String, Credentials>;

/// Unencrypted database header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseHeader {
    pub version: u32,
    pub spec: EncryptionSpec,
    /// KDF salt, hex-encoded.
    pub salt: String,
    /// AEAD nonce, hex-encoded.
    pub nonce: String,
}

#[derive(Serialize, Deserialize)]
struct Payload {
    version: u32,
    entries: BTreeMap<String, StoredEntry>,
}

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct StoredEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_name: Option<String>,
    /// Secret bytes, base64-encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    secret: Option<String>,
}

/// A database split into its parts. Borrowed from the raw bytes.
struct RawDatabase<'a> {
    header: DatabaseHeader,
    /// Magic + length + header: the associated data.
    aad: &'a [u8],
    body: &'a [u8],
}

fn split(bytes: &[u8]) -> Result<RawDatabase<'_>> {
    let corrupted = |msg: &str| StoreError::CorruptedDatabase(msg.to_string());

    if bytes.len() < DATABASE_MAGIC.len() + 4 {
        return Err(corrupted("file too short"));
    }
    let (magic, rest) = bytes.split_at(DATABASE_MAGIC.len());
    if magic != DATABASE_MAGIC {
        return Err(corrupted("invalid magic"));
    }

    let (len_bytes, rest) = rest.split_at(4);
    let header_len = u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]])
        as usize;
    if header_len > MAX_HEADER_LEN || header_len > rest.len() {
        return Err(corrupted("invalid header length"));
    }

    let (header_bytes, body) = rest.split_at(header_len);
    let header: DatabaseHeader = serde_json::from_slice(header_bytes)
        .map_err(|e| StoreError::CorruptedDatabase(format!("invalid header: {e}")))?;
    if header.version != FORMAT_VERSION {
        return Err(StoreError::CorruptedDatabase(format!(
            "unsupported format version {}",
            header.version
        )));
    }
    // Header costs are unauthenticated until the body is opened.
    header.spec.validate().map_err(|e| match e {
        StoreError::InvalidSpec(msg) => StoreError::CorruptedDatabase(msg),
        other => other,
    })?;

    let aad_len = DATABASE_MAGIC.len() + 4 + header_len;
    Ok(RawDatabase {
        header,
        aad: &bytes[..aad_len],
        body,
    })
}

fn decode_hex<const N: usize>(field: &str, value: &str) -> Result<[u8; N]> {
    let bytes = hex::decode(value)
        .map_err(|e| StoreError::CorruptedDatabase(format!("{field} is not valid hex: {e}")))?;
    bytes.try_into().map_err(|v: Vec<u8>| {
        StoreError::CorruptedDatabase(format!(
            "{field} has wrong length: {} (expected {N})",
            v.len()
        ))
    })
}

/// Read the encryption spec a database was written with, without decrypting.
pub fn read_spec(bytes: &[u8]) -> Result<EncryptionSpec> {
    Ok(split(bytes)?.header.spec)
}

/// Encrypt `map` under `key` using `spec`.
pub fn encode(
    map: &CredentialMap,
    key: &MasterKey,
    spec: &EncryptionSpec,
    rng: &mut dyn RandomSource,
) -> Result<Vec<u8>> {
    spec.validate()?;

    let salt: [u8; SALT_SIZE] = crypto::random_array(rng);
    let nonce: [u8; NONCE_SIZE] = crypto::random_array(rng);
    let header = DatabaseHeader {
        version: FORMAT_VERSION,
        spec: *spec,
        salt: hex::encode(salt),
        nonce: hex::encode(nonce),
    };
    let header_bytes = serde_json::to_vec(&header)?;
    let header_len = u32::try_from(header_bytes.len())
        .map_err(|_| StoreError::EncryptionFailed("header too large".to_string()))?;

    let mut out = Vec::with_capacity(DATABASE_MAGIC.len() + 4 + header_bytes.len());
    out.extend_from_slice(DATABASE_MAGIC);
    out.extend_from_slice(&header_len.to_be_bytes());
    out.extend_from_slice(&header_bytes);

    let payload = Payload {
        version: PAYLOAD_VERSION,
        entries: map
            .iter()
            .map(|(service, creds)| {
                let entry = StoredEntry {
                    user_name: creds.user_name.clone(),
                    secret: creds.secret.as_ref().map(|s| BASE64.encode(s.as_bytes())),
                };
                (service.clone(), entry)
            })
            .collect(),
    };
    let plaintext = Zeroizing::new(serde_json::to_vec(&payload)?);

    let derived = spec.derive_key(key.as_bytes(), &salt)?;
    let ciphertext = crypto::seal(&derived, &nonce, &plaintext, &out)?;
    out.extend_from_slice(&ciphertext);

    debug!(entries = map.len(), bytes = out.len(), "encoded database");
    Ok(out)
}

/// Decrypt a database produced by [`encode`].
///
/// Structural damage is [`StoreError::CorruptedDatabase`]; an authentication
/// failure is [`StoreError::IncorrectMasterPassword`].
pub fn decode(bytes: &[u8], key: &MasterKey) -> Result<CredentialMap> {
    let raw = split(bytes)?;
    let salt: [u8; SALT_SIZE] = decode_hex("salt", &raw.header.salt)?;
    let nonce: [u8; NONCE_SIZE] = decode_hex("nonce", &raw.header.nonce)?;

    let derived = raw.header.spec.derive_key(key.as_bytes(), &salt)?;
    let plaintext = crypto::open(&derived, &nonce, raw.body, raw.aad)
        .ok_or(StoreError::IncorrectMasterPassword)?;

    let mut payload: Payload = serde_json::from_slice(&plaintext)
        .map_err(|e| StoreError::CorruptedDatabase(format!("invalid payload: {e}")))?;

    let mut map = CredentialMap::new();
    for (service, entry) in payload.entries.iter_mut() {
        let secret = match entry.secret.take() {
            Some(mut encoded) => {
                let decoded = BASE64.decode(encoded.as_bytes());
                encoded.zeroize();
                let bytes = decoded.map_err(|e| {
                    StoreError::CorruptedDatabase(format!("secret for '{service}' is not base64: {e}"))
                })?;
                Some(SecretString::from_utf8(bytes).ok_or_else(|| {
                    StoreError::CorruptedDatabase(format!("secret for '{service}' is not UTF-8"))
                })?)
            }
            None => None,
        };
        map.insert(
            service.clone(),
            Credentials::new(entry.user_name.take(), secret),
        );
    }

    debug!(entries = map.len(), "decoded database");
    Ok(map)
}

/// Check that `key` opens the database, discarding the contents.
pub fn verify(bytes: &[u8], key: &MasterKey) -> Result<()> {
    decode(bytes, key).map(drop)
}

/// Magic, length and `header` followed by a dummy body.
#[cfg(test)]
pub(crate) fn database_with_header(header: &str) -> Vec<u8> {
    let mut bytes = DATABASE_MAGIC.to_vec();
    bytes.extend_from_slice(&(header.len() as u32).to_be_bytes());
    bytes.extend_from_slice(header.as_bytes());
    bytes.extend_from_slice(&[0u8; 32]);
    bytes
}

/// A database whose header asks Argon2id for 256 GiB of memory.
#[cfg(test)]
pub(crate) fn oversized_argon2_database() -> Vec<u8> {
    let header = format!(
        r#"{{"version":1,"spec":{{"cipher":"aes256_gcm","kdf":{{"algorithm":"argon2id","memory_kib":268435455,"iterations":3,"parallelism":4}}}},"salt":"{}","nonce":"{}"}}"#,
        "00".repeat(SALT_SIZE),
        "00".repeat(NONCE_SIZE)
    );
    database_with_header(&header)
}
