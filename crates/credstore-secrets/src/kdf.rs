//! Encryption specs and derivation of database keys from master keys.
//!
//! The master key (random bytes or a human passphrase) is stretched into the
//! AES-256-GCM database key with either HKDF-SHA256 or Argon2id, salted with
//! the per-database salt stored in the database header.

use credstore_core::config::{EncryptionConfig, KdfKind};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::{self, KEY_SIZE};
use crate::error::{Result, StoreError};

/// HKDF info string used to domain-separate database keys.
const HKDF_INFO: &[u8] = b"credstore-database-v1";

/// Largest Argon2id memory cost accepted, in KiB (1 GiB).
pub const MAX_ARGON2_MEMORY_KIB: u32 = 1024 * 1024;
/// Largest Argon2id iteration count accepted.
pub const MAX_ARGON2_ITERATIONS: u32 = 64;
/// Largest Argon2id lane count accepted.
pub const MAX_ARGON2_PARALLELISM: u32 = 16;

/// Cipher used for the database body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CipherId {
    #[default]
    Aes256Gcm,
}

/// Key derivation function and its parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum KdfParams {
    /// HKDF-SHA256. Suitable only for high-entropy (generated) master keys.
    #[default]
    HkdfSha256,
    /// Argon2id (v0x13) with explicit cost parameters.
    Argon2id {
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    },
}

/// Everything needed, besides the master key, to encode or decode a database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionSpec {
    pub cipher: CipherId,
    pub kdf: KdfParams,
}

impl EncryptionSpec {
    /// Spec for passphrase-derived master keys (Argon2id, OWASP defaults).
    pub fn for_passphrase() -> Self {
        Self {
            cipher: CipherId::Aes256Gcm,
            kdf: KdfParams::Argon2id {
                memory_kib: 65536,
                iterations: 3,
                parallelism: 4,
            },
        }
    }

    /// Build a spec from the `encryption` config section.
    pub fn from_config(config: &EncryptionConfig) -> Self {
        let kdf = match config.kdf {
            KdfKind::Hkdf => KdfParams::HkdfSha256,
            KdfKind::Argon2id => KdfParams::Argon2id {
                memory_kib: config.argon2.memory_kib,
                iterations: config.argon2.iterations,
                parallelism: config.argon2.parallelism,
            },
        };
        Self {
            cipher: CipherId::Aes256Gcm,
            kdf,
        }
    }

    /// Argon2id spec using the configured cost parameters, whatever `kdf` says.
    ///
    /// Used when the master key becomes a passphrase.
    pub fn passphrase_from_config(config: &EncryptionConfig) -> Self {
        Self {
            cipher: CipherId::Aes256Gcm,
            kdf: KdfParams::Argon2id {
                memory_kib: config.argon2.memory_kib,
                iterations: config.argon2.iterations,
                parallelism: config.argon2.parallelism,
            },
        }
    }

    /// Reject parameter sets the KDF would refuse or that exceed the
    /// `MAX_ARGON2_*` cost limits.
    pub fn validate(&self) -> Result<()> {
        if let KdfParams::Argon2id { .. } = self.kdf {
            argon2_params(&self.kdf)?;
        }
        Ok(())
    }

    /// Derive the database cipher key from `master_key` and `salt`.
    pub fn derive_key(&self, master_key: &[u8], salt: &[u8]) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
        match self.kdf {
            KdfParams::HkdfSha256 => crypto::hkdf_sha256(master_key, salt, HKDF_INFO),
            KdfParams::Argon2id { .. } => {
                let params = argon2_params(&self.kdf)?;
                let argon2 =
                    argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

                let mut output = Zeroizing::new([0u8; KEY_SIZE]);
                argon2
                    .hash_password_into(master_key, salt, &mut output[..])
                    .map_err(|e| {
                        StoreError::EncryptionFailed(format!("Argon2id key derivation failed: {e}"))
                    })?;
                Ok(output)
            }
        }
    }
}

fn argon2_params(kdf: &KdfParams) -> Result<argon2::Params> {
    match *kdf {
        KdfParams::Argon2id {
            memory_kib,
            iterations,
            parallelism,
        } => {
            if memory_kib > MAX_ARGON2_MEMORY_KIB
                || iterations > MAX_ARGON2_ITERATIONS
                || parallelism > MAX_ARGON2_PARALLELISM
            {
                return Err(StoreError::InvalidSpec(format!(
                    "Argon2id cost too high (memory_kib={memory_kib}, iterations={iterations}, \
                     parallelism={parallelism}; limits {MAX_ARGON2_MEMORY_KIB}/\
                     {MAX_ARGON2_ITERATIONS}/{MAX_ARGON2_PARALLELISM})"
                )));
            }
            argon2::Params::new(memory_kib, iterations, parallelism, Some(KEY_SIZE))
                .map_err(|e| StoreError::InvalidSpec(format!("invalid Argon2id parameters: {e}")))
        }
        KdfParams::HkdfSha256 => Err(StoreError::InvalidSpec(
            "HKDF has no Argon2 parameters".to_string(),
        )),
    }
}

#[cfg(test)]
pub(crate) fn cheap_argon2_spec() -> EncryptionSpec {
    EncryptionSpec {
        cipher: CipherId::Aes256Gcm,
        kdf: KdfParams::Argon2id {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use credstore_core::config::Argon2Config;

    #[test]
    fn test_default_spec_is_hkdf() {
        let spec = EncryptionSpec::default();
        assert_eq!(spec.cipher, CipherId::Aes256Gcm);
        assert_eq!(spec.kdf, KdfParams::HkdfSha256);
    }

    #[test]
    fn test_from_config() {
        let config = EncryptionConfig {
            kdf: KdfKind::Argon2id,
            argon2: Argon2Config {
                memory_kib: 1024,
                iterations: 2,
                parallelism: 1,
            },
        };
        let spec = EncryptionSpec::from_config(&config);
        assert_eq!(
            spec.kdf,
            KdfParams::Argon2id {
                memory_kib: 1024,
                iterations: 2,
                parallelism: 1
            }
        );
    }

    #[test]
    fn test_passphrase_spec_ignores_kdf_kind() {
        let config = EncryptionConfig::default();
        let spec = EncryptionSpec::passphrase_from_config(&config);
        assert_eq!(spec, EncryptionSpec::for_passphrase());
    }

    #[test]
    fn test_spec_serializes_with_algorithm_tag() {
        let json = serde_json::to_value(cheap_argon2_spec()).unwrap();
        assert_eq!(json["cipher"], "aes256_gcm");
        assert_eq!(json["kdf"]["algorithm"], "argon2id");
        assert_eq!(json["kdf"]["memory_kib"], 64);
    }

    #[test]
    fn test_hkdf_derivation_is_deterministic() {
        let spec = EncryptionSpec::default();
        let a = spec.derive_key(b"master", &[7u8; 32]).unwrap();
        let b = spec.derive_key(b"master", &[7u8; 32]).unwrap();
        let c = spec.derive_key(b"other", &[7u8; 32]).unwrap();
        assert_eq!(*a, *b);
        assert_ne!(*a, *c);
    }

    #[test]
    fn test_argon2_derivation() {
        let spec = cheap_argon2_spec();
        let a = spec.derive_key(b"correct horse", &[1u8; 32]).unwrap();
        let b = spec.derive_key(b"correct horse", &[2u8; 32]).unwrap();
        assert_ne!(*a, *b);
    }

    #[test]
    fn test_validate_rejects_bad_argon2() {
        let spec = EncryptionSpec {
            cipher: CipherId::Aes256Gcm,
            kdf: KdfParams::Argon2id {
                memory_kib: 1,
                iterations: 0,
                parallelism: 1,
            },
        };
        assert!(matches!(spec.validate(), Err(StoreError::InvalidSpec(_))));
        assert!(EncryptionSpec::default().validate().is_ok());
    }

    #[test]
    fn test_argon2_cost_limits() {
        let within = EncryptionSpec {
            cipher: CipherId::Aes256Gcm,
            kdf: KdfParams::Argon2id {
                memory_kib: MAX_ARGON2_MEMORY_KIB,
                iterations: MAX_ARGON2_ITERATIONS,
                parallelism: MAX_ARGON2_PARALLELISM,
            },
        };
        assert!(within.validate().is_ok());
        assert!(EncryptionSpec::for_passphrase().validate().is_ok());

        for (memory_kib, iterations, parallelism) in [
            (268_435_455, 3, 4),
            (65536, MAX_ARGON2_ITERATIONS + 1, 4),
            (65536, 3, MAX_ARGON2_PARALLELISM + 1),
        ] {
            let spec = EncryptionSpec {
                cipher: CipherId::Aes256Gcm,
                kdf: KdfParams::Argon2id {
                    memory_kib,
                    iterations,
                    parallelism,
                },
            };
            assert!(matches!(spec.validate(), Err(StoreError::InvalidSpec(_))));
            // derive_key refuses before allocating anything
            assert!(matches!(
                spec.derive_key(b"master", &[0u8; 32]),
                Err(StoreError::InvalidSpec(_))
            ));
        }
    }
}
