//! Path and alias resolution
//!
//! Logical paths use human aliases (`/teams/team-a`) where the remote
//! server wants its own identifiers (`/teams/t-1`). Resolution walks the
//! path one prefix at a time, left to right, so each segment's owning
//! collection is rendered with the identifiers already resolved for its
//! parents.

use std::collections::BTreeMap;

use restsync_metadata::{ResourceRecord, WILDCARD};
use restsync_resource::{LogicalPath, Resource};

use crate::Result;
use crate::engine::Reconciler;

/// Outcome of resolving a logical path against the remote server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub logical: LogicalPath,
    /// Remote address of the resource (or of the collection, for
    /// collection paths)
    pub remote: LogicalPath,
    /// Remote collection a resource is created in
    pub collection: LogicalPath,
    /// Literal segment to remote identifier, for segments that changed
    pub replacements: BTreeMap<String, String>,
}

impl ResolvedPath {
    pub fn is_aliased(&self) -> bool {
        !self.replacements.is_empty()
    }
}

fn attribute_of(data: Option<&Resource>, attribute: Option<&str>) -> Result<Option<String>> {
    match (data, attribute) {
        (Some(data), Some(attribute)) => Ok(data.attribute_string(attribute)?),
        _ => Ok(None),
    }
}

/// Identifier of a collection item: its id, else its alias.
pub(crate) fn item_identifier(record: &ResourceRecord, item: &Resource) -> Result<Option<String>> {
    if let Some(id) = attribute_of(Some(item), record.id_attribute())? {
        return Ok(Some(id));
    }
    attribute_of(Some(item), record.alias_attribute())
}

impl Reconciler {
    /// Record governing the items of `collection`.
    pub(crate) fn item_record(&self, collection: &LogicalPath) -> Result<ResourceRecord> {
        Ok(self
            .records
            .get_resource_record(&collection.as_collection().child(WILDCARD)?)?)
    }

    /// Record for a resource path, or for the items of a collection path.
    pub(crate) fn governing_record(&self, path: &LogicalPath) -> Result<ResourceRecord> {
        if path.is_collection() {
            self.item_record(path)
        } else {
            Ok(self.records.get_resource_record(path)?)
        }
    }

    /// Resolve `path` to its remote address.
    ///
    /// `body` is the caller's version of the target resource; it is only
    /// consulted for the final segment of a resource path. Every other
    /// prefix is looked up in the local repository.
    pub(crate) fn resolve_path(&self, path: &LogicalPath, body: Option<&Resource>) -> Result<ResolvedPath> {
        let logical = path.segments();
        let depth = logical.len();
        // The last segment of a collection path names the collection itself
        let resolvable = if path.is_collection() { depth.saturating_sub(1) } else { depth };

        let mut resolved: Vec<String> = Vec::with_capacity(depth);
        let mut replacements = BTreeMap::new();

        for i in 1..=resolvable {
            let literal = &logical[i - 1];
            let prefix = path.prefix(i).as_resource();
            let record = self.records.get_resource_record(&prefix)?;

            let local;
            let data = match body {
                Some(body) if i == depth && !body.is_collection() => Some(body),
                _ => {
                    local = self
                        .repository
                        .get_resource(&prefix)?
                        .filter(|r| !r.is_collection());
                    local.as_ref()
                }
            };

            let scan = self.records.describes(&prefix)?;
            let segment = self.resolve_segment(&record, literal, data, scan, &logical[..i], &resolved)?;
            if segment != *literal {
                tracing::debug!(path = %prefix, alias = %literal, id = %segment, "Resolved alias");
                replacements.insert(literal.clone(), segment.clone());
            }
            resolved.push(segment);
        }
        resolved.extend(logical[resolvable..].iter().cloned());

        let (remote, collection) = if path.is_collection() {
            let record = self.item_record(path)?;
            let collection = record.render_collection_path(logical, &resolved)?;
            (collection.clone(), collection)
        } else if depth == 0 {
            (LogicalPath::root(), LogicalPath::root())
        } else {
            let record = self.records.get_resource_record(path)?;
            let collection = record.render_collection_path(logical, &resolved)?;
            (collection.child(&resolved[depth - 1])?, collection)
        };

        Ok(ResolvedPath {
            logical: path.clone(),
            remote,
            collection,
            replacements,
        })
    }

    fn resolve_segment(
        &self,
        record: &ResourceRecord,
        literal: &str,
        data: Option<&Resource>,
        scan: bool,
        logical: &[String],
        resolved: &[String],
    ) -> Result<String> {
        if let Some(id) = attribute_of(data, record.id_attribute())? {
            return Ok(id);
        }
        let alias = attribute_of(data, record.alias_attribute())?;

        // Intermediate collection names have no owning collection to scan
        if scan && record.resolves_aliases() {
            let term = alias.as_deref().unwrap_or(literal);
            let collection = record.render_collection_path(logical, resolved)?;
            if let Some(item) = self.find_in_collection(&collection, record, term)?
                && let Some(id) = item_identifier(record, &item)?
            {
                return Ok(id);
            }
        }

        Ok(alias.unwrap_or_else(|| literal.to_string()))
    }
}
