//! Key material and key derivation.
//!
//! Uses Argon2id for deriving encryption keys from passphrases.

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::{Error, Result};

/// Size of encryption keys in bytes (256 bits for AES-256).
pub const KEY_SIZE: usize = 32;

/// Size of salt in bytes.
pub const SALT_SIZE: usize = 16;

/// A 256-bit encryption key, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    bytes: [u8; KEY_SIZE],
}

impl SecretKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Build a key from arbitrary bytes, which must be exactly [`KEY_SIZE`] long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| Error::InvalidKey {
            reason: format!("expected {KEY_SIZE} bytes, got {}", bytes.len()),
        })?;
        Ok(Self { bytes })
    }

    /// Decode a base64 key; the decoded material must be exactly 32 bytes.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let decoded = Zeroizing::new(STANDARD.decode(encoded.trim()).map_err(|e| {
            Error::InvalidKey {
                reason: format!("invalid base64: {e}"),
            }
        })?);
        Self::from_slice(&decoded)
    }

    /// Generates a random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfParams {
    /// Time cost (iterations).
    pub time: u32,
    /// Memory cost in KiB.
    pub memory: u32,
    /// Parallelism (lanes).
    pub threads: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        // RFC 9106 second recommended option
        Self {
            time: 3,
            memory: 64 * 1024,
            threads: 4,
        }
    }
}

/// Generates a random salt.
pub fn random_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

/// Derives an encryption key from a passphrase using Argon2id.
pub fn derive_key(passphrase: &str, salt: &[u8], params: &KdfParams) -> Result<SecretKey> {
    let argon2_params = Params::new(params.memory, params.time, params.threads, Some(KEY_SIZE))
        .map_err(|e| Error::KeyDerivation(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key_bytes = Zeroizing::new([0u8; KEY_SIZE]);
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut key_bytes[..])
        .map_err(|e| Error::KeyDerivation(e.to_string()))?;

    Ok(SecretKey::from_bytes(*key_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> KdfParams {
        KdfParams {
            time: 1,
            memory: 8192,
            threads: 1,
        }
    }

    #[test]
    fn test_derive_key_is_deterministic() {
        let salt = [7u8; SALT_SIZE];
        let a = derive_key("correct horse", &salt, &fast()).unwrap();
        let b = derive_key("correct horse", &salt, &fast()).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_derive_key_depends_on_salt_and_passphrase() {
        let a = derive_key("pass", &[1u8; SALT_SIZE], &fast()).unwrap();
        let b = derive_key("pass", &[2u8; SALT_SIZE], &fast()).unwrap();
        let c = derive_key("other", &[1u8; SALT_SIZE], &fast()).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
        assert_ne!(a.as_bytes(), c.as_bytes());
    }

    #[test]
    fn test_invalid_params_are_rejected() {
        let params = KdfParams {
            time: 0,
            memory: 8192,
            threads: 1,
        };
        assert!(matches!(
            derive_key("pass", &[0u8; SALT_SIZE], &params),
            Err(Error::KeyDerivation(_))
        ));
    }

    #[test]
    fn test_key_from_base64_requires_32_bytes() {
        let good = STANDARD.encode([9u8; KEY_SIZE]);
        assert!(SecretKey::from_base64(&good).is_ok());

        let short = STANDARD.encode([9u8; 16]);
        assert!(matches!(
            SecretKey::from_base64(&short),
            Err(Error::InvalidKey { .. })
        ));
        assert!(SecretKey::from_base64("not base64!").is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = SecretKey::generate();
        assert!(format!("{key:?}").contains("REDACTED"));
    }
}
