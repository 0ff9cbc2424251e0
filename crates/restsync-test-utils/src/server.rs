//! In-memory [`ManagedServer`] that records every call.
//!
//! Collections are keyed by their remote path without trailing slash
//! (`/teams`). Items are addressed as `<collection>/<id>`, where the id
//! is read from the configured id attribute. Creating an item whose alias
//! attribute matches an existing item answers with a conflict. Listing an
//! item's address fails the way a transport decoding an object would.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use restsync_core::{ManagedServer, RequestSpec, ServerError, ServerResult};
use restsync_resource::Resource;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Get,
    List,
    Create,
    Update,
    Delete,
}

/// One call received by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub kind: CallKind,
    pub spec: RequestSpec,
    /// Body sent with create and update
    pub body: Option<Value>,
}

#[derive(Debug)]
struct State {
    id_attribute: String,
    alias_attribute: Option<String>,
    id_prefix: String,
    next_id: usize,
    collections: BTreeMap<String, Vec<Value>>,
    calls: Vec<Call>,
    failures: HashMap<CallKind, ServerError>,
}

/// Fake REST server; clones share state.
#[derive(Debug, Clone)]
pub struct FakeServer {
    state: Arc<Mutex<State>>,
}

impl Default for FakeServer {
    fn default() -> Self {
        Self::new("id", Some("name"))
    }
}

impl FakeServer {
    /// Server reading ids from `id_attribute` and detecting duplicate
    /// creates on `alias_attribute`.
    pub fn new(id_attribute: &str, alias_attribute: Option<&str>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                id_attribute: id_attribute.to_string(),
                alias_attribute: alias_attribute.map(str::to_string),
                id_prefix: "r".to_string(),
                next_id: 1,
                collections: BTreeMap::new(),
                calls: Vec::new(),
                failures: HashMap::new(),
            })),
        }
    }

    /// Generated ids look like `<prefix>-<n>`.
    pub fn with_id_prefix(self, prefix: &str) -> Self {
        self.state.lock().unwrap().id_prefix = prefix.to_string();
        self
    }

    /// Declare an (empty) collection so listing it succeeds.
    pub fn add_collection(&self, collection: &str) {
        self.state
            .lock()
            .unwrap()
            .collections
            .entry(collection.trim_end_matches('/').to_string())
            .or_default();
    }

    /// Seed an item without recording a call.
    pub fn seed(&self, collection: &str, item: Value) {
        self.state
            .lock()
            .unwrap()
            .collections
            .entry(collection.trim_end_matches('/').to_string())
            .or_default()
            .push(item);
    }

    pub fn items(&self, collection: &str) -> Vec<Value> {
        self.state
            .lock()
            .unwrap()
            .collections
            .get(collection.trim_end_matches('/'))
            .cloned()
            .unwrap_or_default()
    }

    /// Answer every call of `kind` with `error` from now on.
    pub fn fail_on(&self, kind: CallKind, error: ServerError) {
        self.state.lock().unwrap().failures.insert(kind, error);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, kind: CallKind) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.kind == kind)
            .count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    fn record(&self, kind: CallKind, spec: &RequestSpec, body: Option<&Resource>) -> ServerResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call {
            kind,
            spec: spec.clone(),
            body: body.map(|b| b.value().clone()),
        });
        match state.failures.get(&kind) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

fn split_item(path: &str) -> ServerResult<(&str, &str)> {
    path.rsplit_once('/')
        .filter(|(_, id)| !id.is_empty())
        .ok_or_else(|| ServerError::NotFound(path.to_string()))
}

fn text(value: &Value, attribute: &str) -> Option<String> {
    match value.get(attribute)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl State {
    fn position(&self, path: &str) -> ServerResult<(String, usize)> {
        let (collection, id) = split_item(path)?;
        let position = self
            .collections
            .get(collection)
            .and_then(|items| {
                items
                    .iter()
                    .position(|item| text(item, &self.id_attribute).as_deref() == Some(id))
            })
            .ok_or_else(|| ServerError::NotFound(path.to_string()))?;
        Ok((collection.to_string(), position))
    }
}

impl ManagedServer for FakeServer {
    fn get_resource(&self, spec: &RequestSpec) -> ServerResult<Resource> {
        self.record(CallKind::Get, spec, None)?;
        let state = self.state.lock().unwrap();
        let (collection, position) = state.position(&spec.path)?;
        Ok(Resource::new(state.collections[&collection][position].clone()))
    }

    fn get_resource_collection(&self, spec: &RequestSpec) -> ServerResult<Vec<Resource>> {
        self.record(CallKind::List, spec, None)?;
        let state = self.state.lock().unwrap();
        if let Some(items) = state.collections.get(&spec.path) {
            return Ok(items.iter().cloned().map(Resource::new).collect());
        }
        // An item answers with an object, which no list decodes
        if state.position(&spec.path).is_ok() {
            return Err(ServerError::other(
                Some(200),
                format!("expected an array at {}, got an object", spec.path),
            ));
        }
        Err(ServerError::NotFound(spec.path.clone()))
    }

    fn create_resource(&self, body: &Resource, spec: &RequestSpec) -> ServerResult<Resource> {
        self.record(CallKind::Create, spec, Some(body))?;
        let mut state = self.state.lock().unwrap();
        let mut item = body.value().clone();

        if let Some(alias) = state.alias_attribute.clone()
            && let Some(wanted) = text(&item, &alias)
            && state
                .collections
                .get(&spec.path)
                .is_some_and(|items| items.iter().any(|i| text(i, &alias).as_deref() == Some(wanted.as_str())))
        {
            return Err(ServerError::Conflict(format!("{alias} '{wanted}' already exists")));
        }

        if text(&item, &state.id_attribute).is_none() {
            let id = format!("{}-{}", state.id_prefix, state.next_id);
            state.next_id += 1;
            let id_attribute = state.id_attribute.clone();
            if let Value::Object(map) = &mut item {
                map.insert(id_attribute, Value::String(id));
            }
        }

        state
            .collections
            .entry(spec.path.clone())
            .or_default()
            .push(item.clone());
        Ok(Resource::new(item))
    }

    fn update_resource(&self, body: &Resource, spec: &RequestSpec) -> ServerResult<Resource> {
        self.record(CallKind::Update, spec, Some(body))?;
        let mut state = self.state.lock().unwrap();
        let (collection, position) = state.position(&spec.path)?;
        let id_attribute = state.id_attribute.clone();
        let slot = &mut state.collections.get_mut(&collection).unwrap()[position];

        let id = slot.get(&id_attribute).cloned();
        let mut item = body.value().clone();
        if let (Value::Object(map), Some(id)) = (&mut item, id) {
            map.insert(id_attribute, id);
        }
        *slot = item.clone();
        Ok(Resource::new(item))
    }

    fn delete_resource(&self, spec: &RequestSpec) -> ServerResult<()> {
        self.record(CallKind::Delete, spec, None)?;
        let mut state = self.state.lock().unwrap();
        let (collection, position) = state.position(&spec.path)?;
        state.collections.get_mut(&collection).unwrap().remove(position);
        Ok(())
    }
}
