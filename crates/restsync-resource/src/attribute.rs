//! Attribute path parsing and traversal
//!
//! Attribute paths address values inside a resource body using
//! dot-separated keys with array indexing support.
//!
//! # Path Syntax
//!
//! - Dot-separated keys: `credentials.password`
//! - Array indexing: `members[1].login`
//! - Both: `spec.listeners[0].tls.key`
//!
//! # Examples
//!
//! ```
//! use restsync_resource::attribute::{parse_attribute_path, PathSegment, get_at_path};
//! use serde_json::json;
//!
//! let path = parse_attribute_path("spec.listeners[0].port").unwrap();
//! assert_eq!(path, vec![
//!     PathSegment::Key("spec".into()),
//!     PathSegment::Key("listeners".into()),
//!     PathSegment::Index(0),
//!     PathSegment::Key("port".into()),
//! ]);
//!
//! let body = json!({"spec": {"listeners": [{"port": 8443}]}});
//! assert_eq!(get_at_path(&body, &path), Some(&json!(8443)));
//! ```

use serde_json::Value;

use crate::{Error, Result};

/// One step of an attribute path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Object member, `password` in `credentials.password`
    Key(String),
    /// Array position, `1` in `members[1]`
    Index(usize),
}

/// Parse an attribute path string into segments.
///
/// Malformed paths (empty keys, unclosed or empty brackets, non-numeric
/// indices, text directly after a closing bracket) are rejected rather
/// than silently skipped, since a secret attribute that fails to match
/// would leave its plaintext in the stored body.
pub fn parse_attribute_path(path: &str) -> Result<Vec<PathSegment>> {
    if path.trim().is_empty() {
        return Err(Error::invalid_attribute(path, "path is empty"));
    }

    let mut segments = Vec::new();
    let mut current_key = String::new();
    let mut chars = path.chars().peekable();
    // True right after `]`, where only `.`, `[` or end of input may follow.
    let mut after_index = false;

    while let Some(ch) = chars.next() {
        match ch {
            '.' => {
                if current_key.is_empty() && !after_index {
                    return Err(Error::invalid_attribute(path, "empty key before '.'"));
                }
                if !current_key.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut current_key)));
                }
                after_index = false;
                if chars.peek().is_none_or(|c| *c == '.' || *c == '[') {
                    return Err(Error::invalid_attribute(path, "empty key after '.'"));
                }
            }
            '[' => {
                if !current_key.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut current_key)));
                }
                let mut index_str = String::new();
                let mut closed = false;
                for ch in chars.by_ref() {
                    if ch == ']' {
                        closed = true;
                        break;
                    }
                    index_str.push(ch);
                }
                if !closed {
                    return Err(Error::invalid_attribute(path, "unclosed '['"));
                }
                let index = index_str.trim().parse::<usize>().map_err(|_| {
                    Error::invalid_attribute(path, format!("'{index_str}' is not an array index"))
                })?;
                segments.push(PathSegment::Index(index));
                after_index = true;
            }
            ']' => {
                return Err(Error::invalid_attribute(path, "unexpected ']'"));
            }
            _ => {
                if after_index {
                    return Err(Error::invalid_attribute(
                        path,
                        "expected '.' or '[' after index",
                    ));
                }
                current_key.push(ch);
            }
        }
    }

    if !current_key.is_empty() {
        segments.push(PathSegment::Key(current_key));
    }

    Ok(segments)
}

/// Render segments back into canonical text form (`a.b[0].c`).
pub fn format_path(segments: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            PathSegment::Key(key) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(key);
            }
            PathSegment::Index(idx) => {
                out.push('[');
                out.push_str(&idx.to_string());
                out.push(']');
            }
        }
    }
    out
}

/// Get a reference to the value at the given path.
///
/// Returns `None` if the path doesn't exist.
pub fn get_at_path<'a>(value: &'a Value, segments: &[PathSegment]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(value, |current, segment| match segment {
            PathSegment::Key(key) => current.as_object()?.get(key),
            PathSegment::Index(idx) => current.as_array()?.get(*idx),
        })
}

/// Get a mutable reference to the value at the given path.
pub fn get_at_path_mut<'a>(value: &'a mut Value, segments: &[PathSegment]) -> Option<&'a mut Value> {
    segments
        .iter()
        .try_fold(value, |current, segment| match segment {
            PathSegment::Key(key) => current.as_object_mut()?.get_mut(key),
            PathSegment::Index(idx) => current.as_array_mut()?.get_mut(*idx),
        })
}

/// Set a value at the given path.
///
/// Returns `true` if the value was set. Missing intermediate objects are
/// created for object keys; array indices must already exist.
///
/// # Examples
///
/// ```
/// use restsync_resource::attribute::{parse_attribute_path, set_at_path, get_at_path};
/// use serde_json::json;
///
/// let mut value = json!({"config": {"host": "old"}});
/// let path = parse_attribute_path("config.host").unwrap();
/// assert!(set_at_path(&mut value, &path, json!("new")));
/// assert_eq!(get_at_path(&value, &path), Some(&json!("new")));
/// ```
pub fn set_at_path(value: &mut Value, segments: &[PathSegment], new_value: Value) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        *value = new_value;
        return true;
    };

    match first {
        PathSegment::Key(key) => {
            let Value::Object(map) = value else {
                return false;
            };
            if rest.is_empty() {
                map.insert(key.clone(), new_value);
                return true;
            }
            let child = map
                .entry(key.clone())
                .or_insert_with(|| Value::Object(Default::default()));
            set_at_path(child, rest, new_value)
        }
        PathSegment::Index(idx) => match value.as_array_mut().and_then(|arr| arr.get_mut(*idx)) {
            Some(child) => set_at_path(child, rest, new_value),
            None => false,
        },
    }
}

/// Remove a value at the given path.
///
/// Returns the removed value if the path existed, `None` otherwise.
pub fn remove_at_path(value: &mut Value, segments: &[PathSegment]) -> Option<Value> {
    let (last, parent_path) = segments.split_last()?;
    let parent = get_at_path_mut(value, parent_path)?;

    match last {
        PathSegment::Key(key) => parent.as_object_mut()?.remove(key),
        PathSegment::Index(idx) => {
            let arr = parent.as_array_mut()?;
            (*idx < arr.len()).then(|| arr.remove(*idx))
        }
    }
}
