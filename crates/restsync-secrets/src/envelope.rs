//! On-disk secrets envelope
//!
//! The whole secret table is serialized to JSON, sealed with AES-256-GCM
//! and wrapped in a versioned envelope carrying the KDF and cipher
//! parameters needed to open it again:
//!
//! ```json
//! {
//!   "version": 1,
//!   "kdf": {"name": "argon2id", "salt": "...", "time": 3, "memory": 65536, "threads": 4, "key_len": 32},
//!   "cipher": {"name": "aes-256-gcm", "nonce": "..."},
//!   "data": "..."
//! }
//! ```

use std::collections::BTreeMap;

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use zeroize::{Zeroize, Zeroizing};

use crate::kdf::{KEY_SIZE, KdfParams, SALT_SIZE, SecretKey};
use crate::{Error, Result};

pub const ENVELOPE_VERSION: u32 = 1;
pub const CIPHER_AES_256_GCM: &str = "aes-256-gcm";
pub const KDF_ARGON2ID: &str = "argon2id";
pub const KDF_NONE: &str = "none";

/// Size of the AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;

/// Decrypted contents: resource path -> key -> value.
///
/// Values keep their JSON type, so a numeric secret comes back as a number.
pub type SecretTable = BTreeMap<String, BTreeMap<String, Value>>;

/// Overwrite the plaintext held by a secret value, leaving `null`.
pub fn scrub(value: &mut Value) {
    match value {
        Value::String(text) => text.zeroize(),
        Value::Array(items) => items.iter_mut().for_each(scrub),
        Value::Object(map) => map.values_mut().for_each(scrub),
        _ => {}
    }
    *value = Value::Null;
}

/// [`scrub`] every value, then empty the table.
pub fn scrub_table(table: &mut SecretTable) {
    for entries in table.values_mut() {
        entries.values_mut().for_each(scrub);
    }
    table.clear();
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u32,
    pub kdf: KdfHeader,
    pub cipher: CipherHeader,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfHeader {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<u32>,
    pub key_len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherHeader {
    pub name: String,
    pub nonce: String,
}

impl KdfHeader {
    /// Header for a raw key used as-is.
    pub fn none() -> Self {
        Self {
            name: KDF_NONE.to_string(),
            salt: None,
            time: None,
            memory: None,
            threads: None,
            key_len: KEY_SIZE,
        }
    }

    /// Header for an Argon2id-derived key.
    pub fn argon2id(salt: &[u8], params: &KdfParams) -> Self {
        Self {
            name: KDF_ARGON2ID.to_string(),
            salt: Some(STANDARD.encode(salt)),
            time: Some(params.time),
            memory: Some(params.memory),
            threads: Some(params.threads),
            key_len: KEY_SIZE,
        }
    }

    pub fn is_passphrase(&self) -> bool {
        self.name == KDF_ARGON2ID
    }

    /// Salt and cost parameters recorded for an Argon2id header.
    pub fn argon2_inputs(&self) -> Result<(Vec<u8>, KdfParams)> {
        if !self.is_passphrase() {
            return Err(Error::UnsupportedKdf(self.name.clone()));
        }
        let salt = self
            .salt
            .as_deref()
            .ok_or_else(|| Error::malformed("kdf.salt is missing"))?;
        let salt = STANDARD
            .decode(salt)
            .map_err(|e| Error::malformed(format!("kdf.salt is not base64: {e}")))?;
        if salt.len() != SALT_SIZE {
            return Err(Error::malformed(format!(
                "kdf.salt must be {SALT_SIZE} bytes, got {}",
                salt.len()
            )));
        }
        let (Some(time), Some(memory), Some(threads)) = (self.time, self.memory, self.threads)
        else {
            return Err(Error::malformed("kdf cost parameters are missing"));
        };
        Ok((
            salt,
            KdfParams {
                time,
                memory,
                threads,
            },
        ))
    }

    fn check(&self) -> Result<()> {
        if self.name != KDF_ARGON2ID && self.name != KDF_NONE {
            return Err(Error::UnsupportedKdf(self.name.clone()));
        }
        if self.key_len != KEY_SIZE {
            return Err(Error::malformed(format!(
                "kdf.key_len must be {KEY_SIZE}, got {}",
                self.key_len
            )));
        }
        Ok(())
    }
}

impl Envelope {
    /// Parse envelope JSON. Structural problems are reported as
    /// [`Error::MalformedEnvelope`].
    pub fn from_json(content: &[u8]) -> Result<Self> {
        serde_json::from_slice(content).map_err(|e| Error::malformed(e.to_string()))
    }

    /// Indented JSON form written to disk.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject envelopes this build cannot open.
    pub fn check(&self) -> Result<()> {
        if self.version != ENVELOPE_VERSION {
            return Err(Error::UnsupportedVersion(self.version));
        }
        if self.cipher.name != CIPHER_AES_256_GCM {
            return Err(Error::UnsupportedCipher(self.cipher.name.clone()));
        }
        self.kdf.check()
    }
}

/// Serialize and encrypt `table` under `key` with a fresh nonce.
pub fn seal(key: &SecretKey, kdf: KdfHeader, table: &SecretTable) -> Result<Envelope> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| Error::Encryption(e.to_string()))?;

    let plaintext = Zeroizing::new(serde_json::to_vec(table)?);

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from(nonce_bytes);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_slice())
        .map_err(|e| Error::Encryption(e.to_string()))?;

    Ok(Envelope {
        version: ENVELOPE_VERSION,
        kdf,
        cipher: CipherHeader {
            name: CIPHER_AES_256_GCM.to_string(),
            nonce: STANDARD.encode(nonce_bytes),
        },
        data: STANDARD.encode(ciphertext),
    })
}

/// Decrypt an envelope back into its table.
///
/// Any failure (version, algorithm names, encoding, authentication) is an
/// error; there is no partial result.
pub fn open(key: &SecretKey, envelope: &Envelope) -> Result<SecretTable> {
    envelope.check()?;

    let nonce_bytes = STANDARD
        .decode(&envelope.cipher.nonce)
        .map_err(|e| Error::malformed(format!("cipher.nonce is not base64: {e}")))?;
    let nonce_bytes: [u8; NONCE_SIZE] = nonce_bytes.as_slice().try_into().map_err(|_| {
        Error::malformed(format!(
            "cipher.nonce must be {NONCE_SIZE} bytes, got {}",
            nonce_bytes.len()
        ))
    })?;
    let ciphertext = STANDARD
        .decode(&envelope.data)
        .map_err(|e| Error::malformed(format!("data is not base64: {e}")))?;

    let cipher =
        Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| Error::Decryption)?;
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(&Nonce::from(nonce_bytes), ciphertext.as_slice())
            .map_err(|_| Error::Decryption)?,
    );

    serde_json::from_slice(&plaintext)
        .map_err(|e| Error::malformed(format!("decrypted table is not valid: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table() -> SecretTable {
        let mut table = SecretTable::new();
        table
            .entry("/realms/x/clients/y".to_string())
            .or_default()
            .insert("secret".to_string(), Value::from("s3cr3t"));
        table
            .entry("/realms/x".to_string())
            .or_default()
            .insert("pin".to_string(), Value::from(1234));
        table
    }

    #[test]
    fn test_seal_then_open() {
        let key = SecretKey::generate();
        let envelope = seal(&key, KdfHeader::none(), &table()).unwrap();
        assert_eq!(envelope.version, 1);
        assert_eq!(envelope.cipher.name, "aes-256-gcm");
        assert_eq!(open(&key, &envelope).unwrap(), table());
    }

    #[test]
    fn test_scrub_table_empties_it() {
        let mut table = table();
        scrub_table(&mut table);
        assert!(table.is_empty());

        let mut value = serde_json::json!({"a": ["x", 1]});
        scrub(&mut value);
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn test_fresh_nonce_per_seal() {
        let key = SecretKey::generate();
        let a = seal(&key, KdfHeader::none(), &table()).unwrap();
        let b = seal(&key, KdfHeader::none(), &table()).unwrap();
        assert_ne!(a.cipher.nonce, b.cipher.nonce);
        assert_ne!(a.data, b.data);
    }

    #[test]
    fn test_wrong_key_fails_closed() {
        let envelope = seal(&SecretKey::generate(), KdfHeader::none(), &table()).unwrap();
        assert!(matches!(
            open(&SecretKey::generate(), &envelope),
            Err(Error::Decryption)
        ));
    }

    #[test]
    fn test_tampered_data_fails_closed() {
        let key = SecretKey::generate();
        let mut envelope = seal(&key, KdfHeader::none(), &table()).unwrap();
        let mut raw = STANDARD.decode(&envelope.data).unwrap();
        raw[0] ^= 0xff;
        envelope.data = STANDARD.encode(raw);
        assert!(matches!(open(&key, &envelope), Err(Error::Decryption)));
    }

    #[test]
    fn test_unknown_names_are_rejected() {
        let key = SecretKey::generate();
        let envelope = seal(&key, KdfHeader::none(), &table()).unwrap();

        let mut bad_version = envelope.clone();
        bad_version.version = 2;
        assert!(matches!(
            open(&key, &bad_version),
            Err(Error::UnsupportedVersion(2))
        ));

        let mut bad_cipher = envelope.clone();
        bad_cipher.cipher.name = "chacha20-poly1305".into();
        assert!(matches!(
            open(&key, &bad_cipher),
            Err(Error::UnsupportedCipher(_))
        ));

        let mut bad_kdf = envelope;
        bad_kdf.kdf.name = "scrypt".into();
        assert!(matches!(open(&key, &bad_kdf), Err(Error::UnsupportedKdf(_))));
    }

    #[test]
    fn test_raw_key_header_omits_kdf_parameters() {
        let json = serde_json::to_value(KdfHeader::none()).unwrap();
        assert_eq!(json, serde_json::json!({"name": "none", "key_len": 32}));
    }

    #[test]
    fn test_argon2_inputs_round_trip_through_header() {
        let params = KdfParams {
            time: 1,
            memory: 8192,
            threads: 1,
        };
        let header = KdfHeader::argon2id(&[5u8; SALT_SIZE], &params);
        let (salt, parsed) = header.argon2_inputs().unwrap();
        assert_eq!(salt, vec![5u8; SALT_SIZE]);
        assert_eq!(parsed, params);
    }
}
