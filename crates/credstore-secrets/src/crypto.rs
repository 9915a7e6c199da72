//! AES-256-GCM sealing and HKDF-SHA256 key derivation.
//!
//! Callers hand in an already-derived 256-bit key; the master key is never
//! used directly as a cipher key (see [`crate::kdf`]).

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use hkdf::Hkdf;
use rand::{CryptoRng, RngCore};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{Result, StoreError};

pub const NONCE_SIZE: usize = 12;
pub const SALT_SIZE: usize = 32;
pub const KEY_SIZE: usize = 32;

/// Source of cryptographically secure random bytes.
///
/// Passed explicitly to every call site that generates keys, salts or nonces.
/// Any `rand` RNG that is marked [`CryptoRng`] qualifies; production code uses
/// [`rand::rngs::OsRng`].
pub trait RandomSource {
    /// Fill `dest` with random bytes.
    fn fill(&mut self, dest: &mut [u8]);
}

impl<R: RngCore + CryptoRng + ?Sized> RandomSource for R {
    fn fill(&mut self, dest: &mut [u8]) {
        self.fill_bytes(dest);
    }
}

/// Draw `N` random bytes.
pub fn random_array<const N: usize>(rng: &mut dyn RandomSource) -> [u8; N] {
    let mut out = [0u8; N];
    rng.fill(&mut out);
    out
}

/// Generate fresh 256-bit key material.
pub fn generate_key_material(rng: &mut dyn RandomSource) -> Zeroizing<Vec<u8>> {
    let mut key = Zeroizing::new(vec![0u8; KEY_SIZE]);
    rng.fill(key.as_mut_slice());
    key
}

/// Derive a 256-bit key from `ikm` and `salt` via HKDF-SHA256.
pub fn hkdf_sha256(ikm: &[u8], salt: &[u8], info: &[u8]) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = Zeroizing::new([0u8; KEY_SIZE]);
    hk.expand(info, &mut okm[..])
        .map_err(|e| StoreError::EncryptionFailed(format!("HKDF expand failed: {e}")))?;
    Ok(okm)
}

/// Encrypt `plaintext` under `key`, authenticating `aad` alongside it.
///
/// `nonce` must be fresh for every call with the same key; callers draw it
/// with [`random_array`] so it can be recorded in authenticated headers.
pub fn seal(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| StoreError::EncryptionFailed(e.to_string()))?;

    cipher
        .encrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| StoreError::EncryptionFailed(e.to_string()))
}

/// Decrypt data produced by [`seal`].
///
/// Returns `None` when authentication fails: wrong key, tampered ciphertext
/// or mismatched `aad` are indistinguishable.
pub fn open(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    ciphertext: &[u8],
    aad: &[u8],
) -> Option<Zeroizing<Vec<u8>>> {
    let cipher = Aes256Gcm::new_from_slice(key).ok()?;
    cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .ok()
        .map(Zeroizing::new)
}
