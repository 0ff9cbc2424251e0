//! Collection fetch and item lookup

use restsync_metadata::{OperationSpec, ResourceRecord, Verb};
use restsync_resource::{LogicalPath, Resource};

use crate::alias::item_identifier;
use crate::cache::CacheKey;
use crate::engine::Reconciler;
use crate::server::{RequestSpec, ServerError};
use crate::{Error, Result};

impl Reconciler {
    /// Fetch the items of a remote collection, before payload transform.
    ///
    /// Items are filtered with `filter` when given. Within one top-level
    /// call the same fetch is served from the collection cache. A
    /// collection the server does not know yet is empty.
    pub(crate) fn fetch_collection(
        &self,
        collection: &LogicalPath,
        list: &OperationSpec,
        filter: Option<&str>,
    ) -> Result<Vec<Resource>> {
        let spec = RequestSpec::for_operation(list, collection);
        let key = CacheKey::new(&spec, filter);
        if let Some(items) = self.cache.get(&key) {
            tracing::debug!(path = %collection, items = items.len(), "Collection cache hit");
            return Ok(items);
        }

        let server = self.server()?;
        let fetched = match server.get_resource_collection(&spec) {
            Ok(items) => items,
            Err(ServerError::NotFound(_)) => {
                tracing::debug!(path = %collection, "Remote collection not found, treating as empty");
                Vec::new()
            }
            Err(e) => return Err(Error::remote("list", collection, e)),
        };

        let items = match filter {
            Some(filter) => {
                let mut kept = Vec::with_capacity(fetched.len());
                for item in fetched {
                    if self.payload.matches(&item, filter)? {
                        kept.push(item);
                    }
                }
                kept
            }
            None => fetched,
        };

        tracing::debug!(path = %collection, items = items.len(), filtered = filter.is_some(), "Fetched remote collection");
        self.cache.insert(key, items.clone());
        Ok(items)
    }

    /// Find the item of `collection` whose id or alias equals `term`.
    ///
    /// A configured list filter is tried first; without a match the
    /// collection is searched again unfiltered, since display filters can
    /// hide the item being looked for. Returns `None` when the record has
    /// no list operation.
    pub(crate) fn find_in_collection(
        &self,
        collection: &LogicalPath,
        record: &ResourceRecord,
        term: &str,
    ) -> Result<Option<Resource>> {
        let Some(list) = record.operation(Verb::List) else {
            tracing::debug!(path = %collection, "No list operation, skipping alias scan");
            return Ok(None);
        };

        if let Some(filter) = list.filter.as_deref() {
            let items = self.fetch_collection(collection, list, Some(filter))?;
            if let Some(found) = find_match(&items, record, term)? {
                return Ok(Some(found));
            }
            tracing::debug!(path = %collection, term, "No match with list filter, retrying unfiltered");
        }

        let items = self.fetch_collection(collection, list, None)?;
        find_match(&items, record, term)
    }

    /// Locate an existing remote resource by alias after a create conflict
    /// or an update/delete miss.
    pub(crate) fn locate_by_alias(
        &self,
        collection: &LogicalPath,
        record: &ResourceRecord,
        term: &str,
    ) -> Result<Option<LogicalPath>> {
        let Some(item) = self.find_in_collection(collection, record, term)? else {
            return Ok(None);
        };
        match item_identifier(record, &item)? {
            Some(id) => Ok(Some(collection.child(&id)?)),
            None => Ok(None),
        }
    }

    /// Items of a collection for display, after the list payload transform.
    pub(crate) fn list_items(&self, path: &LogicalPath) -> Result<Vec<Resource>> {
        let collection = path.as_collection();
        let record = self.item_record(&collection)?;
        let list = record.operation(Verb::List).ok_or_else(|| Error::OperationUndefined {
            operation: Verb::List.to_string(),
            path: collection.to_string(),
        })?;

        let resolved = self.resolve_path(&collection, None)?;
        let items = self.fetch_collection(&resolved.remote, list, list.filter.as_deref())?;
        items
            .iter()
            .map(|item| self.payload.apply(item, &list.payload))
            .collect()
    }
}

fn find_match(items: &[Resource], record: &ResourceRecord, term: &str) -> Result<Option<Resource>> {
    for item in items {
        for attribute in [record.id_attribute(), record.alias_attribute()].into_iter().flatten() {
            if item.attribute_string(attribute)?.as_deref() == Some(term) {
                return Ok(Some(item.clone()));
            }
        }
    }
    Ok(None)
}
