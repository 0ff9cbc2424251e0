//! Partial resource metadata and inheritance merge
//!
//! Metadata is attached to path templates and inherited by every path
//! below them. Each level only states what it changes: every field is
//! optional, and [`ResourceMetadata::merge`] lets the more specific level
//! win field by field.
//!
//! List and map valued fields (`secret_in_attributes`, `headers`, `query`,
//! payload `filter`/`suppress`) are replaced as a whole when redefined,
//! never unioned with the inherited value.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Copy `other` over `base` when it is set.
fn override_with<T: Clone>(base: &mut Option<T>, other: &Option<T>) {
    if other.is_some() {
        base.clone_from(other);
    }
}

/// Merge a nested optional section field by field.
fn merge_section<T: Clone + Merge>(base: &mut Option<T>, other: &Option<T>) {
    match (base.as_mut(), other) {
        (Some(base), Some(other)) => base.merge(other),
        (None, Some(other)) => *base = Some(other.clone()),
        (_, None) => {}
    }
}

trait Merge {
    fn merge(&mut self, other: &Self);
}

/// How identifiers, aliases and secrets are read out of a resource body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResourceInfo {
    /// Attribute holding the server-assigned identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_from_attribute: Option<String>,

    /// Attribute holding the human-chosen alias used in logical paths
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias_from_attribute: Option<String>,

    /// Attribute paths (`a.b[0].c`) whose values are secrets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_in_attributes: Option<Vec<String>>,
}

impl ResourceInfo {
    pub fn id_attribute(&self) -> Option<&str> {
        self.id_from_attribute.as_deref().filter(|s| !s.is_empty())
    }

    pub fn alias_attribute(&self) -> Option<&str> {
        self.alias_from_attribute.as_deref().filter(|s| !s.is_empty())
    }

    pub fn secret_attributes(&self) -> &[String] {
        self.secret_in_attributes.as_deref().unwrap_or_default()
    }

    /// Alias scanning only makes sense when both attributes are set and
    /// differ; otherwise the path segment already is the identifier.
    pub fn resolves_aliases(&self) -> bool {
        match (self.id_attribute(), self.alias_attribute()) {
            (Some(id), Some(alias)) => id != alias,
            _ => false,
        }
    }
}

impl Merge for ResourceInfo {
    fn merge(&mut self, other: &Self) {
        override_with(&mut self.id_from_attribute, &other.id_from_attribute);
        override_with(&mut self.alias_from_attribute, &other.alias_from_attribute);
        override_with(&mut self.secret_in_attributes, &other.secret_in_attributes);
    }
}

/// Attribute-level rewrite applied to bodies entering or leaving the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PayloadTransform {
    /// Keep only these attribute paths
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Vec<String>>,

    /// Drop these attribute paths
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suppress: Option<Vec<String>>,

    /// Projection expression handed to the payload engine
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<String>,
}

impl PayloadTransform {
    pub fn filter_attributes(&self) -> &[String] {
        self.filter.as_deref().unwrap_or_default()
    }

    pub fn suppress_attributes(&self) -> &[String] {
        self.suppress.as_deref().unwrap_or_default()
    }

    /// True when applying the transform would not change anything.
    pub fn is_identity(&self) -> bool {
        self.filter.is_none() && self.suppress_attributes().is_empty() && self.projection.is_none()
    }
}

impl Merge for PayloadTransform {
    fn merge(&mut self, other: &Self) {
        override_with(&mut self.filter, &other.filter);
        override_with(&mut self.suppress, &other.suppress);
        override_with(&mut self.projection, &other.projection);
    }
}

/// Partial description of one HTTP operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OperationMetadata {
    /// `false` removes the operation for this subtree
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<BTreeMap<String, String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<PayloadTransform>,

    /// Filter expression applied to list responses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl Merge for OperationMetadata {
    fn merge(&mut self, other: &Self) {
        override_with(&mut self.enabled, &other.enabled);
        override_with(&mut self.method, &other.method);
        override_with(&mut self.headers, &other.headers);
        override_with(&mut self.query, &other.query);
        merge_section(&mut self.payload, &other.payload);
        override_with(&mut self.filter, &other.filter);
    }
}

/// Metadata attached to one path template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResourceMetadata {
    /// Template of the owning collection, `_` marking wildcard segments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_info: Option<ResourceInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<OperationMetadata>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub create: Option<OperationMetadata>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<OperationMetadata>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<OperationMetadata>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub list: Option<OperationMetadata>,

    /// Rules applied to both sides before diffing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compare: Option<PayloadTransform>,
}

impl ResourceMetadata {
    /// Merge a more specific level into this one.
    ///
    /// Fields set in `closer` win; nested sections merge field by field.
    pub fn merge(&mut self, closer: &ResourceMetadata) {
        override_with(&mut self.collection_path, &closer.collection_path);
        merge_section(&mut self.resource_info, &closer.resource_info);
        merge_section(&mut self.get, &closer.get);
        merge_section(&mut self.create, &closer.create);
        merge_section(&mut self.update, &closer.update);
        merge_section(&mut self.delete, &closer.delete);
        merge_section(&mut self.list, &closer.list);
        merge_section(&mut self.compare, &closer.compare);
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
