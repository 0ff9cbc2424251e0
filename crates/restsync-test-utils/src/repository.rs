//! In-memory [`ResourceRepository`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use restsync_core::{RepositoryCapabilities, ResourceRepository, Result};
use restsync_resource::{LogicalPath, Resource};
use serde_json::Value;

/// Repository backed by a shared map; clones see the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    resources: Arc<Mutex<BTreeMap<LogicalPath, Resource>>>,
    capabilities: RepositoryCapabilities,
    syncs: Arc<AtomicUsize>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advertise push/pull/reset support.
    pub fn with_capabilities(mut self, capabilities: RepositoryCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Store `body` at `path`, panicking on an invalid path.
    pub fn insert(&self, path: &str, body: Value) {
        let path = LogicalPath::parse(path).unwrap();
        self.resources.lock().unwrap().insert(path, Resource::new(body));
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        let path = LogicalPath::parse(path).unwrap();
        self.resources
            .lock()
            .unwrap()
            .get(&path)
            .map(|r| r.value().clone())
    }

    /// Number of push/pull/reset calls that reached the repository.
    pub fn sync_calls(&self) -> usize {
        self.syncs.load(Ordering::SeqCst)
    }
}

impl ResourceRepository for MemoryRepository {
    fn get_resource(&self, path: &LogicalPath) -> Result<Option<Resource>> {
        let resources = self.resources.lock().unwrap();
        if !path.is_collection() {
            return Ok(resources.get(path).cloned());
        }
        let children: Vec<Value> = resources
            .iter()
            .filter(|(p, _)| p.depth() == path.depth() + 1 && p.segments().starts_with(path.segments()))
            .map(|(_, r)| r.value().clone())
            .collect();
        Ok(Some(Resource::new(Value::Array(children))))
    }

    fn apply_resource(&self, path: &LogicalPath, resource: &Resource) -> Result<()> {
        self.resources
            .lock()
            .unwrap()
            .insert(path.as_resource(), resource.clone());
        Ok(())
    }

    fn delete_resource(&self, path: &LogicalPath) -> Result<()> {
        self.resources.lock().unwrap().remove(&path.as_resource());
        Ok(())
    }

    fn list_resource_paths(&self) -> Result<Vec<LogicalPath>> {
        Ok(self.resources.lock().unwrap().keys().cloned().collect())
    }

    fn capabilities(&self) -> RepositoryCapabilities {
        self.capabilities
    }

    fn push(&self) -> Result<()> {
        self.syncs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn pull(&self) -> Result<()> {
        self.syncs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        self.syncs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
