//! Secret store configuration

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::kdf::{KdfParams, SecretKey};
use crate::{Error, Result};

/// Configuration of a file-backed secret store.
///
/// Exactly one of `key`, `key_file`, `passphrase` and `passphrase_file`
/// must be set.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecretStoreConfig {
    /// Location of the encrypted secrets file
    pub path: PathBuf,

    /// Base64-encoded 32-byte key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// File holding the base64-encoded key (or the 32 raw bytes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase_file: Option<PathBuf>,

    /// Argon2id costs used when a new passphrase-protected file is created
    #[serde(default)]
    pub kdf: KdfParams,
}

impl fmt::Debug for SecretStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |set: bool| if set { Some("[REDACTED]") } else { None };
        f.debug_struct("SecretStoreConfig")
            .field("path", &self.path)
            .field("key", &redact(self.key.is_some()))
            .field("key_file", &self.key_file)
            .field("passphrase", &redact(self.passphrase.is_some()))
            .field("passphrase_file", &self.passphrase_file)
            .field("kdf", &self.kdf)
            .finish()
    }
}

/// Where the store's key material comes from.
#[derive(Clone)]
pub enum KeySource {
    Key(Zeroizing<String>),
    KeyFile(PathBuf),
    Passphrase(Zeroizing<String>),
    PassphraseFile(PathBuf),
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(_) => f.write_str("Key([REDACTED])"),
            Self::KeyFile(path) => f.debug_tuple("KeyFile").field(path).finish(),
            Self::Passphrase(_) => f.write_str("Passphrase([REDACTED])"),
            Self::PassphraseFile(path) => f.debug_tuple("PassphraseFile").field(path).finish(),
        }
    }
}

/// Key material after the source has been read.
pub(crate) enum KeyMaterial {
    Raw(SecretKey),
    Passphrase(Zeroizing<String>),
}

impl SecretStoreConfig {
    /// Configuration protected by a passphrase.
    pub fn with_passphrase(path: impl Into<PathBuf>, passphrase: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            passphrase: Some(passphrase.into()),
            ..Self::default()
        }
    }

    /// Configuration protected by a raw base64 key.
    pub fn with_key(path: impl Into<PathBuf>, key_base64: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: Some(key_base64.into()),
            ..Self::default()
        }
    }

    pub fn kdf_params(mut self, params: KdfParams) -> Self {
        self.kdf = params;
        self
    }

    /// The single configured key source.
    ///
    /// Fails with [`Error::NotConfigured`] when the file path is empty or
    /// when zero or several key sources are set.
    pub fn key_source(&self) -> Result<KeySource> {
        if self.path.as_os_str().is_empty() {
            return Err(Error::not_configured("secrets file path is empty"));
        }

        let mut sources = Vec::new();
        if let Some(key) = &self.key {
            sources.push(KeySource::Key(Zeroizing::new(key.clone())));
        }
        if let Some(path) = &self.key_file {
            sources.push(KeySource::KeyFile(path.clone()));
        }
        if let Some(passphrase) = &self.passphrase {
            sources.push(KeySource::Passphrase(Zeroizing::new(passphrase.clone())));
        }
        if let Some(path) = &self.passphrase_file {
            sources.push(KeySource::PassphraseFile(path.clone()));
        }

        match sources.len() {
            1 => Ok(sources.remove(0)),
            0 => Err(Error::not_configured(
                "one of key, key_file, passphrase or passphrase_file is required",
            )),
            _ => Err(Error::not_configured(
                "only one of key, key_file, passphrase or passphrase_file may be set",
            )),
        }
    }

    pub(crate) fn key_material(&self) -> Result<KeyMaterial> {
        match self.key_source()? {
            KeySource::Key(encoded) => Ok(KeyMaterial::Raw(SecretKey::from_base64(&encoded)?)),
            KeySource::KeyFile(path) => {
                let bytes = Zeroizing::new(read_source_file(&path)?);
                let key = match std::str::from_utf8(&bytes) {
                    Ok(text) if !text.trim().is_empty() => SecretKey::from_base64(text)
                        .or_else(|e| SecretKey::from_slice(&bytes).map_err(|_| e))?,
                    _ => SecretKey::from_slice(&bytes)?,
                };
                Ok(KeyMaterial::Raw(key))
            }
            KeySource::Passphrase(passphrase) => Ok(KeyMaterial::Passphrase(passphrase)),
            KeySource::PassphraseFile(path) => {
                let bytes = Zeroizing::new(read_source_file(&path)?);
                let text = std::str::from_utf8(&bytes).map_err(|_| {
                    Error::not_configured(format!(
                        "passphrase file {} is not valid UTF-8",
                        path.display()
                    ))
                })?;
                let passphrase = text.trim();
                if passphrase.is_empty() {
                    return Err(Error::not_configured(format!(
                        "passphrase file {} is empty",
                        path.display()
                    )));
                }
                Ok(KeyMaterial::Passphrase(Zeroizing::new(passphrase.to_string())))
            }
        }
    }
}

fn read_source_file(path: &Path) -> Result<Vec<u8>> {
    restsync_fs::io::read_bytes(path).map_err(|e| {
        Error::not_configured(format!("cannot read key source {}: {e}", path.display()))
    })
}
