//! Payload transforms and list filters
//!
//! The engine runs every body it fetches or sends through a
//! [`PayloadEngine`] without interpreting the transform itself. The
//! default [`AttributePayloadEngine`] understands attribute filter and
//! suppress lists, and list filters of the form
//!
//! ```text
//! protocol == "openid-connect" && has(attributes.owner) && enabled != false
//! ```
//!
//! Projection expressions need a richer engine plugged in through
//! [`Reconciler::with_payload_engine`](crate::Reconciler::with_payload_engine).

use std::sync::LazyLock;

use regex::Regex;
use restsync_metadata::PayloadTransform;
use restsync_resource::attribute::{get_at_path, parse_attribute_path, remove_at_path, set_at_path};
use restsync_resource::Resource;
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Applies payload transforms and list filters.
pub trait PayloadEngine: Send + Sync {
    /// Transform a body; arrays are transformed item by item.
    fn apply(&self, resource: &Resource, transform: &PayloadTransform) -> Result<Resource>;

    /// Whether a collection item passes a list filter expression.
    fn matches(&self, item: &Resource, filter: &str) -> Result<bool>;
}

/// Default engine: attribute filter/suppress and simple list filters.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributePayloadEngine;

impl AttributePayloadEngine {
    fn apply_value(value: &Value, transform: &PayloadTransform) -> Result<Value> {
        if let Value::Array(items) = value {
            return items
                .iter()
                .map(|item| Self::apply_value(item, transform))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array);
        }

        let mut out = match &transform.filter {
            Some(keep) => {
                let mut kept = Value::Object(Map::new());
                for attr in keep {
                    let segments = parse_attribute_path(attr)?;
                    if let Some(found) = get_at_path(value, &segments) {
                        set_at_path(&mut kept, &segments, found.clone());
                    }
                }
                kept
            }
            None => value.clone(),
        };

        for attr in transform.suppress_attributes() {
            remove_at_path(&mut out, &parse_attribute_path(attr)?);
        }
        Ok(out)
    }
}

impl PayloadEngine for AttributePayloadEngine {
    fn apply(&self, resource: &Resource, transform: &PayloadTransform) -> Result<Resource> {
        if let Some(projection) = &transform.projection {
            return Err(Error::UnsupportedTransform(format!(
                "projection '{projection}' requires a payload engine with expression support"
            )));
        }
        if transform.is_identity() {
            return Ok(resource.clone());
        }
        Ok(Resource::new(Self::apply_value(resource.value(), transform)?))
    }

    fn matches(&self, item: &Resource, filter: &str) -> Result<bool> {
        for clause in split_clauses(filter)? {
            if !Clause::parse(clause)?.holds(item)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

static COMPARISON_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_\-]+(?:\.[A-Za-z0-9_\-]+|\[\d+\])*)\s*(==|!=)\s*(.+)$").unwrap()
});

static HAS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^has\(\s*([^)\s]+)\s*\)$").unwrap());

enum Clause {
    Has(String),
    Equals { attr: String, value: Value, negate: bool },
}

impl Clause {
    fn parse(clause: &str) -> Result<Self> {
        if let Some(captures) = HAS_PATTERN.captures(clause) {
            return Ok(Self::Has(captures[1].to_string()));
        }
        if let Some(captures) = COMPARISON_PATTERN.captures(clause) {
            let literal = captures[3].trim();
            // Bare words that are not JSON literals compare as strings
            let value = serde_json::from_str(literal)
                .unwrap_or_else(|_| Value::String(literal.to_string()));
            return Ok(Self::Equals {
                attr: captures[1].to_string(),
                value,
                negate: &captures[2] == "!=",
            });
        }
        Err(Error::Validation(format!("invalid filter clause '{clause}'")))
    }

    fn holds(&self, item: &Resource) -> Result<bool> {
        match self {
            Self::Has(attr) => Ok(item.attribute(attr)?.is_some_and(|v| !v.is_null())),
            Self::Equals {
                attr,
                value,
                negate,
            } => {
                let equal = item.attribute(attr)? == Some(value);
                Ok(equal != *negate)
            }
        }
    }
}

/// Split on `&&` outside double-quoted strings.
fn split_clauses(filter: &str) -> Result<Vec<&str>> {
    let mut clauses = Vec::new();
    let mut start = 0;
    let mut in_string = false;
    let mut escaped = false;
    let bytes = filter.as_bytes();

    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
        } else if b == b'"' {
            in_string = true;
        } else if b == b'&' && bytes.get(i + 1) == Some(&b'&') {
            clauses.push(filter[start..i].trim());
            i += 2;
            start = i;
            continue;
        }
        i += 1;
    }
    if in_string {
        return Err(Error::Validation(format!(
            "unterminated string in filter '{filter}'"
        )));
    }
    clauses.push(filter[start..].trim());

    if clauses.iter().any(|c| c.is_empty()) {
        return Err(Error::Validation(format!("empty clause in filter '{filter}'")));
    }
    Ok(clauses)
}
