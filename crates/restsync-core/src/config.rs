//! Context configuration
//!
//! A context names the local repository, the metadata file describing
//! the remote API, and optionally the secret store:
//!
//! ```toml
//! metadata = "metadata.toml"
//!
//! [repository]
//! root = "resources"
//!
//! [secret_store]
//! path = "secrets.json"
//! passphrase_file = "~/.restsync/passphrase"
//! ```
//!
//! Relative paths are taken relative to the directory of the context file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use restsync_fs::ConfigStore;
use restsync_metadata::MetadataTree;
use restsync_secrets::{FileSecretStore, SecretStoreConfig};
use serde::{Deserialize, Serialize};

use crate::engine::Reconciler;
use crate::repository::FsRepository;
use crate::{Error, Result};

/// Application directory name under the user config dir.
pub const APP_DIR: &str = "restsync";

/// Default context file name.
pub const CONTEXT_FILE: &str = "context.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Directory of the filesystem repository
    pub root: PathBuf,
}

/// Everything needed to build a [`Reconciler`] except the transport.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContextConfig {
    pub repository: RepositoryConfig,

    /// Metadata tree file (TOML, JSON or YAML)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_store: Option<SecretStoreConfig>,
}

impl ContextConfig {
    /// `<config dir>/restsync/context.toml`
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join(CONTEXT_FILE))
            .ok_or_else(|| Error::NotConfigured("no user configuration directory on this platform".into()))
    }

    /// Load a context file; a missing file is [`Error::NotConfigured`].
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::NotConfigured(format!(
                "context file {} does not exist",
                path.display()
            )));
        }
        let mut config: Self = ConfigStore::new().load(path)?;
        if let Some(base) = path.parent() {
            config.anchor(base);
        }
        tracing::debug!(path = %path.display(), "Loaded context configuration");
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        ConfigStore::new().save(path, self)?;
        Ok(())
    }

    /// Make every relative path absolute against `base`.
    pub fn anchor(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        join(&mut self.repository.root);
        if let Some(metadata) = self.metadata.as_mut() {
            join(metadata);
        }
        if let Some(store) = self.secret_store.as_mut() {
            join(&mut store.path);
            if let Some(file) = store.key_file.as_mut() {
                join(file);
            }
            if let Some(file) = store.passphrase_file.as_mut() {
                join(file);
            }
        }
    }

    /// Build an engine over the configured repository, metadata and
    /// secret store. The secret store is opened here.
    pub fn build_reconciler(&self) -> Result<Reconciler> {
        let repository = Arc::new(FsRepository::new(&self.repository.root));
        let tree = match &self.metadata {
            Some(path) => MetadataTree::load(path)?,
            None => MetadataTree::new(),
        };

        let mut reconciler = Reconciler::new(repository, Arc::new(tree));
        if let Some(store) = &self.secret_store {
            let store = FileSecretStore::open(store.clone())?;
            reconciler = reconciler.with_secret_store(Arc::new(store));
        }
        Ok(reconciler)
    }
}
