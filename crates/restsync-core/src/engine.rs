//! Remote reconciliation engine
//!
//! The [`Reconciler`] ties the collaborators together: it reads desired
//! state from a [`ResourceRepository`], turns logical paths into remote
//! requests with the help of a [`RecordResolver`], and applies them to a
//! [`ManagedServer`]. Secret placeholders are resolved through a
//! [`SecretStore`] before anything is sent.
//!
//! Saving follows a create-or-update decision table:
//!
//! | Probe result                          | Action                          |
//! |---------------------------------------|---------------------------------|
//! | exists at the resolved path           | update there                    |
//! | update answers not found              | fall back to create             |
//! | does not exist                        | create in the owning collection |
//! | create answers conflict               | find by alias and update, else fail |

use std::sync::Arc;

use restsync_metadata::{OperationSpec, RecordResolver, ResourceRecord, Verb};
use restsync_resource::{LogicalPath, Resource};
use restsync_secrets::SecretStore;
use serde_json::Value;

use crate::alias::ResolvedPath;
use crate::cache::CollectionCache;
use crate::diff::{DiffReport, compare_resources};
use crate::repository::{RepositoryCapabilities, ResourceRepository, SyncOutcome};
use crate::server::{ManagedServer, RequestSpec};
use crate::transform::{AttributePayloadEngine, PayloadEngine};
use crate::{Error, Result};

/// Result of a remote delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Nothing matched remotely; the delete was a no-op
    AlreadyAbsent,
}

/// Engine reconciling local resources with a managed server.
pub struct Reconciler {
    pub(crate) repository: Arc<dyn ResourceRepository>,
    pub(crate) records: Arc<dyn RecordResolver>,
    server: Option<Arc<dyn ManagedServer>>,
    secrets: Option<Arc<dyn SecretStore>>,
    pub(crate) payload: Arc<dyn PayloadEngine>,
    capabilities: RepositoryCapabilities,
    pub(crate) cache: CollectionCache,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("server", &self.server.is_some())
            .field("secrets", &self.secrets.is_some())
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Create an engine over a repository and a record resolver.
    ///
    /// Repository capabilities are probed once here. A managed server and
    /// a secret store are attached with [`with_server`](Self::with_server)
    /// and [`with_secret_store`](Self::with_secret_store); operations
    /// needing a missing one fail with [`Error::NotConfigured`].
    pub fn new(repository: Arc<dyn ResourceRepository>, records: Arc<dyn RecordResolver>) -> Self {
        let capabilities = repository.capabilities();
        Self {
            repository,
            records,
            server: None,
            secrets: None,
            payload: Arc::new(AttributePayloadEngine),
            capabilities,
            cache: CollectionCache::new(),
        }
    }

    pub fn with_server(mut self, server: Arc<dyn ManagedServer>) -> Self {
        self.server = Some(server);
        self
    }

    pub fn with_secret_store(mut self, store: Arc<dyn SecretStore>) -> Self {
        self.secrets = Some(store);
        self
    }

    /// Replace the default [`AttributePayloadEngine`].
    pub fn with_payload_engine(mut self, engine: Arc<dyn PayloadEngine>) -> Self {
        self.payload = engine;
        self
    }

    pub fn capabilities(&self) -> RepositoryCapabilities {
        self.capabilities
    }

    pub(crate) fn server(&self) -> Result<&dyn ManagedServer> {
        self.server
            .as_deref()
            .ok_or_else(|| Error::NotConfigured("no managed server is configured".into()))
    }

    fn secret_store(&self) -> Result<&dyn SecretStore> {
        self.secrets
            .as_deref()
            .ok_or_else(|| Error::NotConfigured("no secret store is configured".into()))
    }

    // ------------------------------------------------------------------
    // Remote resources
    // ------------------------------------------------------------------

    /// Fetch a resource, or the items of a collection path, from the server.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when the server does not have the resource,
    /// [`Error::OperationUndefined`] when the record disables reads.
    pub fn get_remote_resource(&self, path: &str) -> Result<Resource> {
        let path = LogicalPath::parse(path)?;
        let _scope = self.cache.enter();
        self.server()?;

        if path.is_collection() {
            let items = self.list_items(&path)?;
            return Ok(Resource::new(Value::Array(
                items.into_iter().map(Resource::into_value).collect(),
            )));
        }
        self.fetch_remote(&path)
    }

    /// Items of a remote collection after the list payload transform.
    pub fn list_remote_resources(&self, path: &str) -> Result<Vec<Resource>> {
        let path = LogicalPath::parse(path)?;
        let _scope = self.cache.enter();
        self.server()?;
        self.list_items(&path)
    }

    /// Desired body stored in the local repository.
    pub fn get_local_resource(&self, path: &str) -> Result<Resource> {
        let path = LogicalPath::parse(path)?;
        self.local_resource(&path)
    }

    /// Remote address of `path`, with the aliases that were replaced.
    pub fn resolve_remote_path(&self, path: &str) -> Result<ResolvedPath> {
        let path = LogicalPath::parse(path)?;
        let _scope = self.cache.enter();
        self.resolve_path(&path, None)
    }

    /// Create or update `body` on the server.
    ///
    /// On a collection path `body` must be an array; each item is saved
    /// at the collection's path extended with its alias (or id), and all
    /// items share one collection cache. The answer is the server's body
    /// (an array of them for collections).
    pub fn save_remote_resource(&self, path: &str, body: &Resource) -> Result<Resource> {
        let path = LogicalPath::parse(path)?;
        let _scope = self.cache.enter();
        self.server()?;

        if !path.is_collection() {
            return self.save_one(&path, body);
        }

        let items = body.as_array().ok_or_else(|| {
            Error::Validation(format!("saving collection {path} needs an array body"))
        })?;
        let record = self.item_record(&path)?;
        let mut saved = Vec::with_capacity(items.len());
        for item in items {
            let item = Resource::new(item.clone());
            let mut segment = None;
            for attr in [record.alias_attribute(), record.id_attribute()].into_iter().flatten() {
                segment = item.attribute_string(attr)?;
                if segment.is_some() {
                    break;
                }
            }
            let segment = segment.ok_or_else(|| {
                Error::Validation(format!(
                    "item of {path} has no alias or id attribute to address it by"
                ))
            })?;
            saved.push(self.save_one(&path.child(&segment)?, &item)?.into_value());
        }
        tracing::info!(path = %path, items = saved.len(), "Saved collection");
        Ok(Resource::new(Value::Array(saved)))
    }

    /// Create `body` on the server; an existing resource is a conflict.
    pub fn create_remote_resource(&self, path: &str, body: &Resource) -> Result<Resource> {
        let path = self.resource_path(path)?;
        let _scope = self.cache.enter();
        self.server()?;

        let record = self.records.get_resource_record(&path)?;
        let resolved = self.resolve_path(&path, Some(body))?;
        let outgoing = self.resolve_secrets_for_send(&path, body)?;
        self.send_create(&record, &resolved, &outgoing)
    }

    /// Update an existing resource; never falls back to create.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when neither the resolved path nor an alias
    /// lookup finds the resource.
    pub fn update_remote_resource(&self, path: &str, body: &Resource) -> Result<Resource> {
        let path = self.resource_path(path)?;
        let _scope = self.cache.enter();
        self.server()?;

        let record = self.records.get_resource_record(&path)?;
        let resolved = self.resolve_path(&path, Some(body))?;
        let outgoing = self.resolve_secrets_for_send(&path, body)?;

        match self.send_update(&record, &resolved.remote, &outgoing) {
            Err(e) if e.is_not_found() => {
                let term = alias_term(&record, Some(body), &path)?;
                match self.locate_by_alias(&resolved.collection, &record, &term)? {
                    Some(found) if found != resolved.remote => {
                        tracing::info!(path = %path, remote = %found, "Update target found by alias");
                        self.send_update(&record, &found, &outgoing)
                    }
                    _ => Err(e),
                }
            }
            other => other,
        }
    }

    /// Delete a resource on the server.
    ///
    /// A resource that cannot be found, directly or by alias, is already
    /// deleted. Any other failure propagates.
    pub fn delete_remote_resource(&self, path: &str) -> Result<DeleteOutcome> {
        let path = self.resource_path(path)?;
        let _scope = self.cache.enter();
        self.server()?;

        let record = self.records.get_resource_record(&path)?;
        let resolved = self.resolve_path(&path, None)?;

        if self.send_delete(&record, &resolved.remote)? == DeleteOutcome::Deleted {
            return Ok(DeleteOutcome::Deleted);
        }

        let local = self.repository.get_resource(&path)?;
        let term = alias_term(&record, local.as_ref(), &path)?;
        match self.locate_by_alias(&resolved.collection, &record, &term)? {
            Some(found) if found != resolved.remote => {
                tracing::info!(path = %path, remote = %found, "Delete target found by alias");
                self.send_delete(&record, &found)
            }
            _ => {
                tracing::info!(path = %path, "Resource already absent remotely");
                Ok(DeleteOutcome::AlreadyAbsent)
            }
        }
    }

    /// Compare the local body with the remote one.
    pub fn diff_resource(&self, path: &str) -> Result<DiffReport> {
        let path = self.resource_path(path)?;
        let _scope = self.cache.enter();
        self.server()?;

        let local = self.local_resource(&path)?;
        let remote = self.fetch_remote(&path)?;
        let record = self.records.get_resource_record(&path)?;
        compare_resources(&path, &record, self.payload.as_ref(), &remote, &local)
    }

    // ------------------------------------------------------------------
    // Secrets
    // ------------------------------------------------------------------

    /// Secret attribute paths configured for `path` (for a collection
    /// path, those of its items).
    pub fn secret_paths_for(&self, path: &str) -> Result<Vec<String>> {
        let path = LogicalPath::parse(path)?;
        Ok(self.governing_record(&path)?.secret_attributes().to_vec())
    }

    /// Replace secret attributes of `body` with placeholders, storing the
    /// plaintext values first when `persist` is set.
    pub fn mask_resource_secrets(&self, path: &str, body: &Resource, persist: bool) -> Result<Resource> {
        let path = LogicalPath::parse(path)?;
        let record = self.governing_record(&path)?;
        Ok(restsync_secrets::mask(
            body,
            &path,
            record.secret_attributes(),
            self.secrets.as_deref(),
            persist,
        )?)
    }

    /// Substitute every placeholder in `body` with its stored value.
    pub fn resolve_resource_secrets(&self, path: &str, body: &Resource) -> Result<Resource> {
        let path = LogicalPath::parse(path)?;
        self.resolve_secrets_for_send(&path, body)
    }

    pub fn get_secret(&self, path: &str, key: &str) -> Result<String> {
        Ok(self.secret_store()?.get_secret(path, key)?)
    }

    /// Store a secret, replacing any previous value.
    pub fn set_secret(&self, path: &str, key: &str, value: &str) -> Result<()> {
        Ok(self.secret_store()?.create_secret(path, key, value)?)
    }

    pub fn delete_secret(&self, path: &str, key: &str) -> Result<()> {
        Ok(self.secret_store()?.delete_secret(path, key)?)
    }

    pub fn list_secret_keys(&self, path: &str) -> Result<Vec<String>> {
        Ok(self.secret_store()?.list_keys(path)?)
    }

    pub fn list_secret_resources(&self) -> Result<Vec<String>> {
        Ok(self.secret_store()?.list_resources()?)
    }

    // ------------------------------------------------------------------
    // Repository synchronization
    // ------------------------------------------------------------------

    pub fn push_repository(&self) -> Result<SyncOutcome> {
        if !self.capabilities.push {
            return Ok(SyncOutcome::Unsupported);
        }
        self.repository.push()?;
        Ok(SyncOutcome::Completed)
    }

    pub fn pull_repository(&self) -> Result<SyncOutcome> {
        if !self.capabilities.pull {
            return Ok(SyncOutcome::Unsupported);
        }
        self.repository.pull()?;
        Ok(SyncOutcome::Completed)
    }

    pub fn reset_repository(&self) -> Result<SyncOutcome> {
        if !self.capabilities.reset {
            return Ok(SyncOutcome::Unsupported);
        }
        self.repository.reset()?;
        Ok(SyncOutcome::Completed)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn resource_path(&self, raw: &str) -> Result<LogicalPath> {
        let path = LogicalPath::parse(raw)?;
        if path.is_collection() || path.is_root() {
            return Err(Error::Validation(format!("{path} is not a resource path")));
        }
        Ok(path)
    }

    fn local_resource(&self, path: &LogicalPath) -> Result<Resource> {
        self.repository
            .get_resource(path)?
            .ok_or_else(|| Error::NotFound(format!("{path} is not in the local repository")))
    }

    fn fetch_remote(&self, path: &LogicalPath) -> Result<Resource> {
        let record = self.records.get_resource_record(path)?;
        let get = require(&record, Verb::Get)?;
        let resolved = self.resolve_path(path, None)?;
        let spec = RequestSpec::for_operation(get, &resolved.remote);
        let body = self
            .server()?
            .get_resource(&spec)
            .map_err(|e| Error::remote("get", path, e))?;
        self.payload.apply(&body, &get.payload)
    }

    fn save_one(&self, path: &LogicalPath, body: &Resource) -> Result<Resource> {
        let record = self.records.get_resource_record(path)?;
        let resolved = self.resolve_path(path, Some(body))?;
        let outgoing = self.resolve_secrets_for_send(path, body)?;

        if self.exists(&record, &resolved.remote)? {
            match self.send_update(&record, &resolved.remote, &outgoing) {
                Err(e) if e.is_not_found() => {
                    tracing::info!(path = %path, "Update target disappeared, creating instead");
                }
                other => return other,
            }
        }

        match self.send_create(&record, &resolved, &outgoing) {
            Err(e) if e.is_conflict() => {
                let term = alias_term(&record, Some(body), path)?;
                match self.locate_by_alias(&resolved.collection, &record, &term)? {
                    Some(found) => {
                        tracing::info!(path = %path, remote = %found, "Create conflicted, updating existing resource");
                        self.send_update(&record, &found, &outgoing)
                    }
                    None => Err(e),
                }
            }
            other => other,
        }
    }

    /// Existence probe; an undefined read operation reports `false`.
    fn exists(&self, record: &ResourceRecord, remote: &LogicalPath) -> Result<bool> {
        let Some(get) = record.operation(Verb::Get) else {
            return Ok(false);
        };
        let spec = RequestSpec::for_operation(get, remote);
        self.server()?
            .resource_exists(&spec)
            .map_err(|e| Error::remote("get", remote, e))
    }

    fn resolve_secrets_for_send(&self, path: &LogicalPath, body: &Resource) -> Result<Resource> {
        let record = self.governing_record(path)?;
        Ok(restsync_secrets::resolve(
            body,
            path,
            record.secret_attributes(),
            self.secrets.as_deref(),
        )?)
    }

    fn send_create(&self, record: &ResourceRecord, resolved: &ResolvedPath, body: &Resource) -> Result<Resource> {
        let create = require(record, Verb::Create)?;
        let spec = RequestSpec::for_operation(create, &resolved.collection);
        let payload = self.payload.apply(body, &create.payload)?;
        let answer = self
            .server()?
            .create_resource(&payload, &spec)
            .map_err(|e| Error::remote("create", &resolved.logical, e))?;
        tracing::info!(path = %resolved.logical, remote = %resolved.collection, "Created remote resource");
        self.incoming(record, &answer)
    }

    fn send_update(&self, record: &ResourceRecord, remote: &LogicalPath, body: &Resource) -> Result<Resource> {
        let update = require(record, Verb::Update)?;
        let spec = RequestSpec::for_operation(update, remote);
        let payload = self.payload.apply(body, &update.payload)?;
        let answer = self
            .server()?
            .update_resource(&payload, &spec)
            .map_err(|e| Error::remote("update", &record.path, e))?;
        tracing::info!(path = %record.path, remote = %remote, "Updated remote resource");
        self.incoming(record, &answer)
    }

    fn send_delete(&self, record: &ResourceRecord, remote: &LogicalPath) -> Result<DeleteOutcome> {
        let delete = require(record, Verb::Delete)?;
        let spec = RequestSpec::for_operation(delete, remote);
        match self.server()?.delete_resource(&spec) {
            Ok(()) => {
                tracing::info!(path = %record.path, remote = %remote, "Deleted remote resource");
                Ok(DeleteOutcome::Deleted)
            }
            Err(crate::server::ServerError::NotFound(_)) => Ok(DeleteOutcome::AlreadyAbsent),
            Err(e) => Err(Error::remote("delete", &record.path, e)),
        }
    }

    /// Bodies answered by the server get the read transform.
    fn incoming(&self, record: &ResourceRecord, body: &Resource) -> Result<Resource> {
        match record.operation(Verb::Get) {
            Some(get) => self.payload.apply(body, &get.payload),
            None => Ok(body.clone()),
        }
    }
}

fn require(record: &ResourceRecord, verb: Verb) -> Result<&OperationSpec> {
    record.operation(verb).ok_or_else(|| Error::OperationUndefined {
        operation: verb.to_string(),
        path: record.path.to_string(),
    })
}

/// Alias value of `body`, else the last segment of `path`.
fn alias_term(record: &ResourceRecord, body: Option<&Resource>, path: &LogicalPath) -> Result<String> {
    if let (Some(body), Some(alias)) = (body, record.alias_attribute())
        && let Some(value) = body.attribute_string(alias)?
    {
        return Ok(value);
    }
    Ok(path.last_segment().unwrap_or_default().to_string())
}
