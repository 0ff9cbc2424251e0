//! In-memory metadata tree
//!
//! Metadata is registered against path templates such as
//! `/realms/_/clients`, where `_` matches any segment. Every template
//! matching a prefix of a path contributes to that path's metadata,
//! merged from the root downwards so the deepest definition wins. At the
//! same depth a template with more literal segments is merged last.
//!
//! `collection_path` is the exception: it is taken only from templates as
//! deep as the path, since a parent's collection is never its child's.

use std::collections::BTreeMap;
use std::path::Path;

use restsync_fs::ConfigStore;
use restsync_resource::LogicalPath;
use serde::{Deserialize, Serialize};

use crate::metadata::ResourceMetadata;
use crate::record::{ResourceRecord, WILDCARD};
use crate::{Error, Result};

/// Source of resource records for logical paths.
pub trait RecordResolver: Send + Sync {
    /// Merged, defaults-filled record for `path`.
    fn get_resource_record(&self, path: &LogicalPath) -> Result<ResourceRecord> {
        ResourceRecord::build(path, &self.get_merged_metadata(path)?)
    }

    /// Raw merged metadata for `path`, without defaults.
    fn get_merged_metadata(&self, path: &LogicalPath) -> Result<ResourceMetadata>;

    /// Whether a template as deep as `path` matches it.
    ///
    /// Segments without such a template, like the `members` in
    /// `/teams/a/members/b`, only inherit from their ancestors and name
    /// no remote item of their own.
    fn describes(&self, path: &LogicalPath) -> Result<bool>;
}

#[derive(Debug, Clone)]
struct Entry {
    template: Vec<String>,
    metadata: ResourceMetadata,
}

impl Entry {
    fn matches(&self, path: &[String]) -> bool {
        self.template.len() <= path.len()
            && self
                .template
                .iter()
                .zip(path)
                .all(|(t, s)| t == WILDCARD || t == s)
    }

    fn literal_count(&self) -> usize {
        self.template.iter().filter(|t| *t != WILDCARD).count()
    }
}

/// Metadata keyed by path template.
///
/// Serializes as a map from template to [`ResourceMetadata`], which is
/// also the layout of a metadata file loaded with [`MetadataTree::load`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, ResourceMetadata>", into = "BTreeMap<String, ResourceMetadata>")]
pub struct MetadataTree {
    entries: Vec<Entry>,
}

impl MetadataTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a tree from a TOML, JSON or YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let tree: Self = ConfigStore::new().load(path)?;
        tracing::debug!(path = %path.display(), templates = tree.len(), "Loaded metadata tree");
        Ok(tree)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        ConfigStore::new().save(path, self)?;
        Ok(())
    }

    /// Register metadata for a template, merging into any existing entry
    /// for the same template.
    pub fn insert(&mut self, template: &str, metadata: ResourceMetadata) -> Result<()> {
        let parsed = LogicalPath::parse(template)
            .map_err(|e| Error::invalid_template(template, e.to_string()))?;
        let segments = parsed.segments().to_vec();

        match self.entries.iter_mut().find(|e| e.template == segments) {
            Some(existing) => existing.metadata.merge(&metadata),
            None => self.entries.push(Entry {
                template: segments,
                metadata,
            }),
        }
        Ok(())
    }

    /// Builder form of [`MetadataTree::insert`].
    pub fn with(mut self, template: &str, metadata: ResourceMetadata) -> Result<Self> {
        self.insert(template, metadata)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Templates matching `path`, least specific first.
    fn matching(&self, path: &LogicalPath) -> Vec<&Entry> {
        let mut matches: Vec<&Entry> = self
            .entries
            .iter()
            .filter(|e| e.matches(path.segments()))
            .collect();
        matches.sort_by_key(|e| (e.template.len(), e.literal_count()));
        matches
    }
}

impl RecordResolver for MetadataTree {
    fn get_merged_metadata(&self, path: &LogicalPath) -> Result<ResourceMetadata> {
        let mut merged = ResourceMetadata::default();
        let matches = self.matching(path);
        for entry in &matches {
            merged.merge(&entry.metadata);
        }
        // A collection path only describes paths at its own depth
        merged.collection_path = matches
            .iter()
            .filter(|e| e.template.len() == path.depth())
            .filter_map(|e| e.metadata.collection_path.clone())
            .last();
        tracing::trace!(path = %path, levels = matches.len(), "Merged metadata");
        Ok(merged)
    }

    fn describes(&self, path: &LogicalPath) -> Result<bool> {
        Ok(self
            .entries
            .iter()
            .any(|e| e.template.len() == path.depth() && e.matches(path.segments())))
    }
}

impl TryFrom<BTreeMap<String, ResourceMetadata>> for MetadataTree {
    type Error = Error;

    fn try_from(map: BTreeMap<String, ResourceMetadata>) -> Result<Self> {
        let mut tree = Self::new();
        for (template, metadata) in map {
            tree.insert(&template, metadata)?;
        }
        Ok(tree)
    }
}

impl From<MetadataTree> for BTreeMap<String, ResourceMetadata> {
    fn from(tree: MetadataTree) -> Self {
        tree.entries
            .into_iter()
            .map(|e| (format!("/{}", e.template.join("/")), e.metadata))
            .collect()
    }
}
