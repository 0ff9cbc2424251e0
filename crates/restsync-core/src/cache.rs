//! Per-operation collection cache
//!
//! A top-level engine call opens a [`CacheScope`]; nested calls made
//! while serving it (alias resolution, existence probes, conflict
//! fallback) open their own scopes and share the same entries. Entries
//! are allocated when the depth goes 0 -> 1 and dropped at 1 -> 0,
//! whether the call succeeded or not.
//!
//! Writes made during an operation do not invalidate entries, so a
//! batch that creates several resources keeps seeing the listing fetched
//! before the first create.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use restsync_resource::Resource;

use crate::server::RequestSpec;

/// Identity of a collection fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    method: String,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    filter: Option<String>,
}

impl CacheKey {
    /// Key for `spec` with the list `filter` applied after fetching.
    pub fn new(spec: &RequestSpec, filter: Option<&str>) -> Self {
        // BTreeMap iteration is already sorted by key
        Self {
            method: spec.method.clone(),
            path: spec.path.clone(),
            query: spec
                .query
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            headers: spec
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            filter: filter.map(str::to_string),
        }
    }
}

#[derive(Debug, Default)]
struct CacheState {
    depth: usize,
    entries: Option<HashMap<CacheKey, Vec<Resource>>>,
}

/// Depth-counted collection cache owned by one engine instance.
#[derive(Debug, Default)]
pub struct CollectionCache {
    state: Mutex<CacheState>,
}

impl CollectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enter a call; the returned guard leaves it on drop.
    pub fn enter(&self) -> CacheScope<'_> {
        let mut state = self.lock();
        state.depth += 1;
        if state.depth == 1 {
            state.entries = Some(HashMap::new());
            tracing::trace!("Collection cache opened");
        }
        CacheScope { cache: self }
    }

    fn leave(&self) {
        let mut state = self.lock();
        state.depth = state.depth.saturating_sub(1);
        if state.depth == 0 {
            state.entries = None;
            tracing::trace!("Collection cache discarded");
        }
    }

    /// Cached items for `key`; always `None` outside a scope.
    pub fn get(&self, key: &CacheKey) -> Option<Vec<Resource>> {
        self.lock().entries.as_ref()?.get(key).cloned()
    }

    /// Remember items for `key`; ignored outside a scope.
    pub fn insert(&self, key: CacheKey, items: Vec<Resource>) {
        if let Some(entries) = self.lock().entries.as_mut() {
            entries.insert(key, items);
        }
    }

    pub fn depth(&self) -> usize {
        self.lock().depth
    }

    pub fn is_active(&self) -> bool {
        self.lock().entries.is_some()
    }
}

/// RAII guard for one level of [`CollectionCache`] nesting.
#[must_use = "the cache scope ends when the guard is dropped"]
pub struct CacheScope<'a> {
    cache: &'a CollectionCache,
}

impl Drop for CacheScope<'_> {
    fn drop(&mut self) {
        self.cache.leave();
    }
}
