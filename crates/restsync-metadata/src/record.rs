//! Resolved resource records
//!
//! A [`ResourceRecord`] is the fully merged metadata for one logical
//! path, with defaults filled in. It is built fresh for every call and
//! never mutated afterwards.

use std::collections::BTreeMap;
use std::fmt;

use restsync_resource::LogicalPath;
use serde::Serialize;

use crate::metadata::{OperationMetadata, PayloadTransform, ResourceInfo, ResourceMetadata};
use crate::{Error, Result};

/// Template segment matching any concrete segment.
pub const WILDCARD: &str = "_";

/// The operations a record can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Get,
    Create,
    Update,
    Delete,
    List,
}

impl Verb {
    pub const ALL: [Verb; 5] = [
        Verb::Get,
        Verb::Create,
        Verb::Update,
        Verb::Delete,
        Verb::List,
    ];

    pub fn default_method(self) -> &'static str {
        match self {
            Verb::Get | Verb::List => "GET",
            Verb::Create => "POST",
            Verb::Update => "PUT",
            Verb::Delete => "DELETE",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::Create => "create",
            Verb::Update => "update",
            Verb::Delete => "delete",
            Verb::List => "list",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully specified operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationSpec {
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub payload: PayloadTransform,
    /// List filter expression (only meaningful for `list`)
    pub filter: Option<String>,
}

impl OperationSpec {
    fn from_metadata(verb: Verb, meta: Option<&OperationMetadata>) -> Option<Self> {
        let meta = meta.cloned().unwrap_or_default();
        if meta.enabled == Some(false) {
            return None;
        }
        Some(Self {
            method: meta
                .method
                .filter(|m| !m.trim().is_empty())
                .map(|m| m.to_ascii_uppercase())
                .unwrap_or_else(|| verb.default_method().to_string()),
            headers: meta.headers.unwrap_or_default(),
            query: meta.query.unwrap_or_default(),
            payload: meta.payload.unwrap_or_default(),
            filter: meta.filter.filter(|f| !f.trim().is_empty()),
        })
    }
}

/// Merged metadata for one logical path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceRecord {
    /// Path the record was resolved for
    pub path: LogicalPath,
    /// Template of the owning collection
    pub collection_path: String,
    pub resource_info: Option<ResourceInfo>,
    pub get: Option<OperationSpec>,
    pub create: Option<OperationSpec>,
    pub update: Option<OperationSpec>,
    pub delete: Option<OperationSpec>,
    pub list: Option<OperationSpec>,
    pub compare: PayloadTransform,
}

impl ResourceRecord {
    /// Build a record from merged metadata, filling in defaults.
    ///
    /// Without an explicit `collection_path`, a resource belongs to its
    /// parent collection and a collection path is its own collection.
    pub fn build(path: &LogicalPath, merged: &ResourceMetadata) -> Result<Self> {
        let collection_path = match &merged.collection_path {
            Some(template) => {
                let parsed = LogicalPath::parse(template)
                    .map_err(|e| Error::invalid_template(template, e.to_string()))?;
                parsed.as_collection().to_string()
            }
            None if path.is_collection() => path.to_string(),
            None => path.parent_collection().to_string(),
        };

        Ok(Self {
            path: path.clone(),
            collection_path,
            resource_info: merged.resource_info.clone(),
            get: OperationSpec::from_metadata(Verb::Get, merged.get.as_ref()),
            create: OperationSpec::from_metadata(Verb::Create, merged.create.as_ref()),
            update: OperationSpec::from_metadata(Verb::Update, merged.update.as_ref()),
            delete: OperationSpec::from_metadata(Verb::Delete, merged.delete.as_ref()),
            list: OperationSpec::from_metadata(Verb::List, merged.list.as_ref()),
            compare: merged.compare.clone().unwrap_or_default(),
        })
    }

    /// Operation for `verb`, or `None` when it is disabled.
    pub fn operation(&self, verb: Verb) -> Option<&OperationSpec> {
        match verb {
            Verb::Get => self.get.as_ref(),
            Verb::Create => self.create.as_ref(),
            Verb::Update => self.update.as_ref(),
            Verb::Delete => self.delete.as_ref(),
            Verb::List => self.list.as_ref(),
        }
    }

    pub fn id_attribute(&self) -> Option<&str> {
        self.resource_info.as_ref().and_then(ResourceInfo::id_attribute)
    }

    pub fn alias_attribute(&self) -> Option<&str> {
        self.resource_info
            .as_ref()
            .and_then(ResourceInfo::alias_attribute)
    }

    pub fn secret_attributes(&self) -> &[String] {
        self.resource_info
            .as_ref()
            .map(ResourceInfo::secret_attributes)
            .unwrap_or_default()
    }

    pub fn resolves_aliases(&self) -> bool {
        self.resource_info
            .as_ref()
            .is_some_and(ResourceInfo::resolves_aliases)
    }

    /// Render the collection template for a concrete path.
    ///
    /// `logical` is the path the caller typed and `resolved` the same
    /// segments after alias resolution (at least as many as the template
    /// has). A template segment that is `_`, or that equals the logical
    /// segment at its position, takes the resolved segment; any other
    /// literal is kept.
    pub fn render_collection_path(&self, logical: &[String], resolved: &[String]) -> Result<LogicalPath> {
        render_template(&self.collection_path, logical, resolved)
    }
}

/// Render a `_`-wildcard template against logical and resolved segments.
pub fn render_template(template: &str, logical: &[String], resolved: &[String]) -> Result<LogicalPath> {
    let parsed =
        LogicalPath::parse(template).map_err(|e| Error::invalid_template(template, e.to_string()))?;

    let segments = parsed
        .segments()
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            let matches_logical = logical.get(i).is_some_and(|l| l == segment);
            if segment == WILDCARD || matches_logical {
                resolved.get(i).cloned().ok_or_else(|| {
                    Error::invalid_template(
                        template,
                        format!("no resolved segment for position {i}"),
                    )
                })
            } else {
                Ok(segment.clone())
            }
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(LogicalPath::from_segments(segments, parsed.is_collection()))
}
