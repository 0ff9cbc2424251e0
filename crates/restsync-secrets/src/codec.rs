//! Secret placeholder codec
//!
//! Moves secret attribute values between resource bodies and the
//! [`SecretStore`]:
//!
//! - [`mask`] replaces secret attributes with `{{secret .}}`, optionally
//!   persisting the plaintext first
//! - [`resolve`] substitutes every placeholder in a body with its stored value
//! - [`normalize_for_diff`] rewrites secret attributes to a single token so
//!   a placeholder and the plaintext it stands for compare equal

use std::collections::BTreeMap;

use restsync_resource::attribute::get_at_path_mut;
use restsync_resource::{
    LogicalPath, PathSegment, Resource, format_path, get_at_path, parse_attribute_path, set_at_path,
};
use serde_json::Value;

use crate::placeholder::{CANONICAL_PLACEHOLDER, Placeholder};
use crate::store::SecretStore;
use crate::{Error, Result};

/// Parse every secret attribute path up front so a malformed entry is
/// rejected before any store access.
fn parse_all(secret_attrs: &[String]) -> Result<Vec<Vec<PathSegment>>> {
    secret_attrs
        .iter()
        .map(|attr| parse_attribute_path(attr).map_err(Error::from))
        .collect()
}

/// Replace secret attributes with the canonical placeholder.
///
/// Attributes that are missing, `null`, or already a placeholder are left
/// as they are. With `persist`, each plaintext value is written to `store`
/// under `(path, canonical attribute path)` before it is replaced, keeping
/// its JSON type for [`resolve`].
/// Persisting for an array body fails with [`Error::CollectionSecrets`].
pub fn mask(
    resource: &Resource,
    path: &LogicalPath,
    secret_attrs: &[String],
    store: Option<&dyn SecretStore>,
    persist: bool,
) -> Result<Resource> {
    if secret_attrs.is_empty() {
        return Ok(resource.clone());
    }
    if persist && resource.is_collection() {
        return Err(Error::CollectionSecrets {
            path: path.to_string(),
        });
    }

    let attrs = parse_all(secret_attrs)?;
    let mut masked = resource.clone();
    let mut stored = 0usize;

    for segments in &attrs {
        let Some(current) = get_at_path(masked.value(), segments) else {
            continue;
        };
        if current.is_null() {
            continue;
        }
        if let Value::String(text) = current
            && Placeholder::parse(text)?.is_some()
        {
            continue;
        }

        if persist {
            let store = store.ok_or_else(|| {
                Error::not_configured("a secret store is required to persist secret attributes")
            })?;
            store.create_secret_value(&path.key(), &format_path(segments), current.clone())?;
            stored += 1;
        }

        set_at_path(
            masked.value_mut(),
            segments,
            Value::String(CANONICAL_PLACEHOLDER.to_string()),
        );
    }

    if stored > 0 {
        tracing::debug!(path = %path, stored, "Masked secret attributes");
    }
    Ok(masked)
}

/// A placeholder found while walking a body.
struct Site {
    segments: Vec<PathSegment>,
    placeholder: Placeholder,
}

/// Whether `segments` addresses one of `attrs`, directly or inside an
/// item of an array body.
fn is_secret_attribute(segments: &[PathSegment], attrs: &[Vec<PathSegment>]) -> bool {
    let within_item = match segments.first() {
        Some(PathSegment::Index(_)) => &segments[1..],
        _ => segments,
    };
    attrs
        .iter()
        .any(|attr| attr.as_slice() == segments || attr.as_slice() == within_item)
}

/// Walk `value` collecting placeholders. A malformed placeholder is an
/// error inside a secret attribute and ordinary text anywhere else.
fn collect_sites(
    value: &Value,
    attrs: &[Vec<PathSegment>],
    segments: &mut Vec<PathSegment>,
    sites: &mut Vec<Site>,
) -> Result<()> {
    match value {
        Value::String(text) => match Placeholder::parse(text) {
            Ok(Some(placeholder)) => sites.push(Site {
                segments: segments.clone(),
                placeholder,
            }),
            Ok(None) => {}
            Err(e) if is_secret_attribute(segments, attrs) => return Err(e),
            Err(_) => {}
        },
        Value::Object(map) => {
            for (key, child) in map {
                segments.push(PathSegment::Key(key.clone()));
                collect_sites(child, attrs, segments, sites)?;
                segments.pop();
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                segments.push(PathSegment::Index(index));
                collect_sites(child, attrs, segments, sites)?;
                segments.pop();
            }
        }
        _ => {}
    }
    Ok(())
}

/// Substitute every placeholder in `resource` with its stored value.
///
/// A body without placeholders is returned unchanged and the store is
/// not consulted. Placeholders with no store configured fail with
/// [`Error::NotConfigured`] instead of leaking the literal token.
/// Placeholder-like text that does not parse is rejected only in
/// `secret_attrs`; in free-text attributes it is left alone.
pub fn resolve(
    resource: &Resource,
    path: &LogicalPath,
    secret_attrs: &[String],
    store: Option<&dyn SecretStore>,
) -> Result<Resource> {
    let attrs = parse_all(secret_attrs)?;
    let mut sites = Vec::new();
    collect_sites(resource.value(), &attrs, &mut Vec::new(), &mut sites)?;
    if sites.is_empty() {
        return Ok(resource.clone());
    }

    let store = store.ok_or_else(|| {
        Error::not_configured(format!(
            "{path} contains secret placeholders but no secret store is configured"
        ))
    })?;

    let resource_key = path.key();
    let mut resolved = resource.clone();
    for site in &sites {
        let key = site.placeholder.key_for(&format_path(&site.segments));
        let secret = store.get_secret_value(&resource_key, &key)?;
        if let Some(slot) = get_at_path_mut(resolved.value_mut(), &site.segments) {
            *slot = secret;
        }
    }

    tracing::debug!(path = %path, resolved = sites.len(), "Resolved secret placeholders");
    Ok(resolved)
}

/// Replace the current value of every present secret attribute with a
/// placeholder token.
///
/// `overrides` maps canonical attribute paths to a previously observed
/// placeholder literal (see [`collect_placeholders`]); other attributes get
/// [`CANONICAL_PLACEHOLDER`].
pub fn normalize_for_diff(
    resource: &Resource,
    secret_attrs: &[String],
    overrides: &BTreeMap<String, String>,
) -> Result<Resource> {
    let attrs = parse_all(secret_attrs)?;
    let mut normalized = resource.clone();
    for segments in &attrs {
        let Some(slot) = get_at_path_mut(normalized.value_mut(), segments) else {
            continue;
        };
        let token = overrides
            .get(&format_path(segments))
            .map(String::as_str)
            .unwrap_or(CANONICAL_PLACEHOLDER);
        *slot = Value::String(token.to_string());
    }
    Ok(normalized)
}

/// Placeholder literals held by secret attributes, keyed by canonical
/// attribute path.
pub fn collect_placeholders(
    resource: &Resource,
    secret_attrs: &[String],
) -> Result<BTreeMap<String, String>> {
    let mut found = BTreeMap::new();
    for segments in parse_all(secret_attrs)? {
        if let Some(Value::String(text)) = get_at_path(resource.value(), &segments)
            && Placeholder::parse(text)?.is_some()
        {
            found.insert(format_path(&segments), text.clone());
        }
    }
    Ok(found)
}

/// True when any string in the body is a well-formed placeholder.
pub fn has_placeholders(resource: &Resource) -> bool {
    fn walk(value: &Value) -> bool {
        match value {
            Value::String(text) => Placeholder::is_placeholder(text),
            Value::Object(map) => map.values().any(walk),
            Value::Array(items) => items.iter().any(walk),
            _ => false,
        }
    }
    walk(resource.value())
}
