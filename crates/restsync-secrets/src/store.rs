//! Encrypted secret store
//!
//! Secrets are scoped by `(resource path, key)`. The decrypted table
//! lives in memory behind a lock; every mutation re-seals the whole table
//! and replaces the file atomically with owner-only permissions.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use restsync_fs::{OWNER_ONLY, io};
use restsync_resource::LogicalPath;
use serde_json::Value;
use zeroize::Zeroize;

use crate::config::{KeyMaterial, SecretStoreConfig};
use crate::envelope::{self, Envelope, KdfHeader, SecretTable, scrub, scrub_table};
use crate::kdf::{SecretKey, derive_key, random_salt};
use crate::{Error, Result};

/// Key/value secret storage scoped by resource path.
///
/// Resource paths are logical paths and are normalized before use, so
/// `teams/a` and `/teams/a/` address the same entries.
pub trait SecretStore: Send + Sync {
    /// Open the backing storage, creating it when absent.
    fn init(&self) -> Result<()>;

    /// Drop key material and decrypted contents.
    fn close(&self);

    /// Secret as text; non-string values come back as their JSON text.
    fn get_secret(&self, path: &str, key: &str) -> Result<String> {
        Ok(secret_text(&self.get_secret_value(path, key)?))
    }

    /// Secret with the JSON type it was stored with.
    fn get_secret_value(&self, path: &str, key: &str) -> Result<Value>;

    /// Insert or replace a string secret.
    fn create_secret(&self, path: &str, key: &str, value: &str) -> Result<()> {
        self.create_secret_value(path, key, Value::String(value.to_string()))
    }

    /// Insert or replace a secret of any JSON type.
    fn create_secret_value(&self, path: &str, key: &str, value: Value) -> Result<()>;

    /// Replace an existing secret; fails with [`Error::SecretNotFound`] when absent.
    fn update_secret(&self, path: &str, key: &str, value: &str) -> Result<()>;

    fn delete_secret(&self, path: &str, key: &str) -> Result<()>;

    /// Keys stored for one resource, sorted.
    fn list_keys(&self, path: &str) -> Result<Vec<String>>;

    /// Resource paths that hold at least one secret, sorted.
    fn list_resources(&self) -> Result<Vec<String>>;
}

#[derive(Default)]
struct StoreState {
    key: Option<SecretKey>,
    kdf: Option<KdfHeader>,
    table: SecretTable,
}

impl StoreState {
    fn opened(&self) -> Result<(&SecretKey, &KdfHeader)> {
        match (&self.key, &self.kdf) {
            (Some(key), Some(kdf)) => Ok((key, kdf)),
            _ => Err(Error::NotInitialized),
        }
    }

    fn wipe(&mut self) {
        if let Some(mut key) = self.key.take() {
            key.zeroize();
        }
        self.kdf = None;
        scrub_table(&mut self.table);
    }
}

/// [`SecretStore`] backed by a single encrypted envelope file.
pub struct FileSecretStore {
    config: SecretStoreConfig,
    state: Mutex<StoreState>,
}

impl FileSecretStore {
    pub fn new(config: SecretStoreConfig) -> Self {
        Self {
            config,
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Build and initialize a store in one step.
    pub fn open(config: SecretStoreConfig) -> Result<Self> {
        let store = Self::new(config);
        store.init()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().key.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open_existing(&self, material: KeyMaterial) -> Result<StoreState> {
        let path = &self.config.path;
        io::tighten_permissions(path, OWNER_ONLY)?;

        let content = io::read_bytes(path)?;
        let envelope = Envelope::from_json(&content)?;
        envelope.check()?;

        let key = match (material, envelope.kdf.is_passphrase()) {
            (KeyMaterial::Raw(key), false) => key,
            (KeyMaterial::Passphrase(passphrase), true) => {
                let (salt, params) = envelope.kdf.argon2_inputs()?;
                derive_key(&passphrase, &salt, &params)?
            }
            (KeyMaterial::Raw(_), true) => {
                return Err(Error::InvalidKey {
                    reason: "secrets file is passphrase-protected but a raw key is configured"
                        .into(),
                });
            }
            (KeyMaterial::Passphrase(_), false) => {
                return Err(Error::InvalidKey {
                    reason: "secrets file uses a raw key but a passphrase is configured".into(),
                });
            }
        };

        let table = envelope::open(&key, &envelope)?;
        tracing::info!(
            path = %path.display(),
            resources = table.len(),
            kdf = %envelope.kdf.name,
            "Opened secret store"
        );

        Ok(StoreState {
            key: Some(key),
            kdf: Some(envelope.kdf),
            table,
        })
    }

    fn create_new(&self, material: KeyMaterial) -> Result<StoreState> {
        let (key, kdf) = match material {
            KeyMaterial::Raw(key) => (key, KdfHeader::none()),
            KeyMaterial::Passphrase(passphrase) => {
                let salt = random_salt();
                let key = derive_key(&passphrase, &salt, &self.config.kdf)?;
                (key, KdfHeader::argon2id(&salt, &self.config.kdf))
            }
        };

        let table = SecretTable::new();
        persist(&self.config.path, &key, &kdf, &table)?;
        tracing::info!(
            path = %self.config.path.display(),
            kdf = %kdf.name,
            "Created secret store"
        );

        Ok(StoreState {
            key: Some(key),
            kdf: Some(kdf),
            table,
        })
    }

    /// Apply `change` to a copy of the table, persist it, then swap it in.
    ///
    /// The in-memory table only changes once the file write succeeded.
    /// Whichever table is discarded is scrubbed.
    fn mutate<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut SecretTable) -> Result<()>,
    {
        let mut state = self.lock();
        let (key, kdf) = state.opened()?;
        let mut next = state.table.clone();
        let outcome = change(&mut next).and_then(|()| persist(&self.config.path, key, kdf, &next));
        match outcome {
            Ok(()) => {
                let mut previous = std::mem::replace(&mut state.table, next);
                scrub_table(&mut previous);
                Ok(())
            }
            Err(e) => {
                scrub_table(&mut next);
                Err(e)
            }
        }
    }
}

impl SecretStore for FileSecretStore {
    fn init(&self) -> Result<()> {
        let mut state = self.lock();
        if state.key.is_some() {
            return Ok(());
        }

        let material = self.config.key_material()?;
        let exists = self
            .config
            .path
            .try_exists()
            .map_err(|e| restsync_fs::Error::io(&self.config.path, e))?;

        *state = if exists {
            self.open_existing(material)?
        } else {
            self.create_new(material)?
        };
        Ok(())
    }

    fn close(&self) {
        self.lock().wipe();
        tracing::debug!(path = %self.config.path.display(), "Closed secret store");
    }

    fn get_secret_value(&self, path: &str, key: &str) -> Result<Value> {
        let resource = resource_key(path)?;
        let state = self.lock();
        state.opened()?;
        state
            .table
            .get(&resource)
            .and_then(|entries| entries.get(key))
            .cloned()
            .ok_or_else(|| Error::SecretNotFound {
                path: resource,
                key: key.to_string(),
            })
    }

    fn create_secret_value(&self, path: &str, key: &str, value: Value) -> Result<()> {
        let resource = resource_key(path)?;
        check_key(key)?;
        self.mutate(|table| {
            let replaced = table
                .entry(resource.clone())
                .or_default()
                .insert(key.to_string(), value);
            if let Some(mut replaced) = replaced {
                scrub(&mut replaced);
            }
            Ok(())
        })?;
        tracing::debug!(path = %resource, key, "Stored secret");
        Ok(())
    }

    fn update_secret(&self, path: &str, key: &str, value: &str) -> Result<()> {
        let resource = resource_key(path)?;
        check_key(key)?;
        self.mutate(|table| {
            let slot = table
                .get_mut(&resource)
                .and_then(|entries| entries.get_mut(key))
                .ok_or_else(|| Error::SecretNotFound {
                    path: resource.clone(),
                    key: key.to_string(),
                })?;
            scrub(slot);
            *slot = Value::String(value.to_string());
            Ok(())
        })?;
        tracing::debug!(path = %resource, key, "Updated secret");
        Ok(())
    }

    fn delete_secret(&self, path: &str, key: &str) -> Result<()> {
        let resource = resource_key(path)?;
        check_key(key)?;
        self.mutate(|table| {
            let entries = table
                .get_mut(&resource)
                .filter(|entries| entries.contains_key(key))
                .ok_or_else(|| Error::SecretNotFound {
                    path: resource.clone(),
                    key: key.to_string(),
                })?;
            if let Some(mut removed) = entries.remove(key) {
                scrub(&mut removed);
            }
            if entries.is_empty() {
                table.remove(&resource);
            }
            Ok(())
        })?;
        tracing::debug!(path = %resource, key, "Deleted secret");
        Ok(())
    }

    fn list_keys(&self, path: &str) -> Result<Vec<String>> {
        let resource = resource_key(path)?;
        let state = self.lock();
        state.opened()?;
        Ok(state
            .table
            .get(&resource)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn list_resources(&self) -> Result<Vec<String>> {
        let state = self.lock();
        state.opened()?;
        Ok(state.table.keys().cloned().collect())
    }
}

impl Drop for FileSecretStore {
    fn drop(&mut self) {
        self.lock().wipe();
    }
}

impl std::fmt::Debug for FileSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSecretStore")
            .field("path", &self.config.path)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

/// Text form of a stored value: strings as-is, anything else as JSON.
pub fn secret_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn resource_key(path: &str) -> Result<String> {
    Ok(LogicalPath::parse(path)?.key())
}

fn check_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(Error::EmptySecretKey);
    }
    Ok(())
}

fn persist(path: &Path, key: &SecretKey, kdf: &KdfHeader, table: &SecretTable) -> Result<()> {
    let envelope = envelope::seal(key, kdf.clone(), table)?;
    let json = envelope.to_json()?;
    io::write_atomic(path, json.as_bytes(), Some(OWNER_ONLY))?;
    tracing::debug!(
        path = %path.display(),
        resources = table.len(),
        "Persisted secret store"
    );
    Ok(())
}
