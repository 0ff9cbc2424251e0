//! Ready-made metadata and secret store setups.

use std::sync::Arc;

use restsync_core::Reconciler;
use restsync_metadata::{MetadataTree, OperationMetadata, ResourceInfo, ResourceMetadata};
use restsync_secrets::{FileSecretStore, KdfParams, SecretStoreConfig};
use tempfile::TempDir;

use crate::{FakeServer, MemoryRepository};

/// Argon2id costs small enough for tests.
pub fn fast_kdf() -> KdfParams {
    KdfParams {
        time: 1,
        memory: 8192,
        threads: 1,
    }
}

/// Passphrase-protected store config writing into `dir`.
pub fn passphrase_store_config(dir: &TempDir, passphrase: &str) -> SecretStoreConfig {
    SecretStoreConfig::with_passphrase(dir.path().join("secrets.json"), passphrase).kdf_params(fast_kdf())
}

/// Opened passphrase store in `dir`.
pub fn open_store(dir: &TempDir) -> Arc<FileSecretStore> {
    Arc::new(FileSecretStore::open(passphrase_store_config(dir, "correct horse")).unwrap())
}

pub fn info(id: &str, alias: &str, secrets: &[&str]) -> ResourceInfo {
    ResourceInfo {
        id_from_attribute: Some(id.to_string()),
        alias_from_attribute: Some(alias.to_string()),
        secret_in_attributes: Some(secrets.iter().map(|s| s.to_string()).collect()),
    }
}

/// Teams addressed by `name`, identified remotely by `id`, with a secret
/// `token`; team members addressed by `login`.
pub fn teams_tree() -> MetadataTree {
    MetadataTree::new()
        .with(
            "/teams/_",
            ResourceMetadata {
                resource_info: Some(info("id", "name", &["token"])),
                ..Default::default()
            },
        )
        .unwrap()
        .with(
            "/teams/_/members/_",
            ResourceMetadata {
                resource_info: Some(info("id", "login", &[])),
                ..Default::default()
            },
        )
        .unwrap()
}

/// Operation metadata that only sets a list filter.
pub fn list_filter(filter: &str) -> OperationMetadata {
    OperationMetadata {
        filter: Some(filter.to_string()),
        ..Default::default()
    }
}

/// Repository, server and engine wired over `tree`.
pub struct Harness {
    pub repository: MemoryRepository,
    pub server: FakeServer,
    pub engine: Reconciler,
}

impl Harness {
    pub fn new(tree: MetadataTree) -> Self {
        let repository = MemoryRepository::new();
        let server = FakeServer::default().with_id_prefix("t");
        let engine = Reconciler::new(Arc::new(repository.clone()), Arc::new(tree))
            .with_server(Arc::new(server.clone()));
        Self {
            repository,
            server,
            engine,
        }
    }

    pub fn teams() -> Self {
        Self::new(teams_tree())
    }

    pub fn with_secret_store(self, store: Arc<FileSecretStore>) -> Self {
        Self {
            engine: self.engine.with_secret_store(store),
            ..self
        }
    }
}
