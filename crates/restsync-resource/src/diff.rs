//! Ordered patch computation between resource bodies
//!
//! [`diff`] walks two JSON values and emits the operations that turn the
//! first into the second. Paths are JSON Pointers (RFC 6901), so a patch
//! can be replayed with [`apply_patch`] one operation at a time.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use similar::TextDiff;

use crate::{Error, Result};

/// Maximum recursion depth for diff operations
const MAX_DIFF_DEPTH: usize = 128;

/// A single patch operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    /// Insert a value (object key or array position)
    Add { path: String, value: Value },
    /// Remove the value at path
    Remove { path: String },
    /// Replace the existing value at path
    Replace { path: String, value: Value },
}

impl PatchOperation {
    pub fn path(&self) -> &str {
        match self {
            Self::Add { path, .. } | Self::Remove { path } | Self::Replace { path, .. } => path,
        }
    }
}

/// Compute the ordered patch turning `from` into `to`.
///
/// Within an object, removals and nested changes come in key order of
/// `from`, followed by additions in key order of `to`. Within an array,
/// shared positions are compared element by element, extra elements are
/// added in increasing index order, and surplus elements are removed from
/// the highest index down, so the patch stays valid when applied in order.
pub fn diff(from: &Value, to: &Value) -> Vec<PatchOperation> {
    let mut ops = Vec::new();
    diff_values(from, to, &mut String::new(), &mut ops, 0);
    ops
}

fn diff_values(
    from: &Value,
    to: &Value,
    path: &mut String,
    ops: &mut Vec<PatchOperation>,
    depth: usize,
) {
    // Depth limit: treat deeply nested differences as a single replacement
    if depth > MAX_DIFF_DEPTH {
        if from != to {
            ops.push(PatchOperation::Replace {
                path: path.clone(),
                value: to.clone(),
            });
        }
        return;
    }

    match (from, to) {
        (Value::Object(from_obj), Value::Object(to_obj)) => {
            for (key, from_value) in from_obj {
                let len = path.len();
                push_token(path, key);
                match to_obj.get(key) {
                    Some(to_value) => diff_values(from_value, to_value, path, ops, depth + 1),
                    None => ops.push(PatchOperation::Remove { path: path.clone() }),
                }
                path.truncate(len);
            }

            for (key, to_value) in to_obj {
                if !from_obj.contains_key(key) {
                    let len = path.len();
                    push_token(path, key);
                    ops.push(PatchOperation::Add {
                        path: path.clone(),
                        value: to_value.clone(),
                    });
                    path.truncate(len);
                }
            }
        }

        (Value::Array(from_arr), Value::Array(to_arr)) => {
            let shared = from_arr.len().min(to_arr.len());
            for i in 0..shared {
                let len = path.len();
                push_token(path, &i.to_string());
                diff_values(&from_arr[i], &to_arr[i], path, ops, depth + 1);
                path.truncate(len);
            }

            for (i, to_value) in to_arr.iter().enumerate().skip(shared) {
                ops.push(PatchOperation::Add {
                    path: format!("{path}/{i}"),
                    value: to_value.clone(),
                });
            }

            for i in (shared..from_arr.len()).rev() {
                ops.push(PatchOperation::Remove {
                    path: format!("{path}/{i}"),
                });
            }
        }

        // Different types or scalar values - compare directly
        _ => {
            if from != to {
                ops.push(PatchOperation::Replace {
                    path: path.clone(),
                    value: to.clone(),
                });
            }
        }
    }
}

fn push_token(path: &mut String, token: &str) {
    path.push('/');
    path.push_str(&token.replace('~', "~0").replace('/', "~1"));
}

fn parse_pointer(pointer: &str) -> Result<Vec<String>> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = pointer.strip_prefix('/') else {
        return Err(Error::patch(pointer, "pointer must start with '/'"));
    };
    Ok(rest
        .split('/')
        .map(|token| token.replace("~1", "/").replace("~0", "~"))
        .collect())
}

/// Apply a patch to a copy of `target`.
///
/// Operations are applied in order; the first one that cannot be applied
/// aborts with [`Error::PatchFailed`].
pub fn apply_patch(target: &Value, patch: &[PatchOperation]) -> Result<Value> {
    let mut doc = target.clone();
    for op in patch {
        apply_operation(&mut doc, op)?;
    }
    Ok(doc)
}

fn apply_operation(doc: &mut Value, op: &PatchOperation) -> Result<()> {
    let pointer = op.path();
    let tokens = parse_pointer(pointer)?;

    let Some((last, parent_tokens)) = tokens.split_last() else {
        // Root pointer
        return match op {
            PatchOperation::Add { value, .. } | PatchOperation::Replace { value, .. } => {
                *doc = value.clone();
                Ok(())
            }
            PatchOperation::Remove { .. } => Err(Error::patch(pointer, "cannot remove the root")),
        };
    };

    let mut parent = &mut *doc;
    for token in parent_tokens {
        parent = match parent {
            Value::Object(map) => map.get_mut(token),
            Value::Array(arr) => token.parse::<usize>().ok().and_then(|i| arr.get_mut(i)),
            _ => None,
        }
        .ok_or_else(|| Error::patch(pointer, format!("missing parent segment '{token}'")))?;
    }

    match parent {
        Value::Object(map) => match op {
            PatchOperation::Add { value, .. } => {
                map.insert(last.clone(), value.clone());
            }
            PatchOperation::Replace { value, .. } => {
                let slot = map
                    .get_mut(last)
                    .ok_or_else(|| Error::patch(pointer, "no value to replace"))?;
                *slot = value.clone();
            }
            PatchOperation::Remove { .. } => {
                map.remove(last)
                    .ok_or_else(|| Error::patch(pointer, "no value to remove"))?;
            }
        },
        Value::Array(arr) => {
            let index = if last == "-" {
                arr.len()
            } else {
                last.parse::<usize>()
                    .map_err(|_| Error::patch(pointer, format!("'{last}' is not an array index")))?
            };
            match op {
                PatchOperation::Add { value, .. } => {
                    if index > arr.len() {
                        return Err(Error::patch(pointer, "index out of bounds"));
                    }
                    arr.insert(index, value.clone());
                }
                PatchOperation::Replace { value, .. } => {
                    let slot = arr
                        .get_mut(index)
                        .ok_or_else(|| Error::patch(pointer, "index out of bounds"))?;
                    *slot = value.clone();
                }
                PatchOperation::Remove { .. } => {
                    if index >= arr.len() {
                        return Err(Error::patch(pointer, "index out of bounds"));
                    }
                    arr.remove(index);
                }
            }
        }
        _ => return Err(Error::patch(pointer, "parent is not a container")),
    }
    Ok(())
}

/// Similarity ratio (0.0 to 1.0) between two JSON values.
///
/// Serializes both values to canonical JSON and uses
/// `similar::TextDiff::ratio()` for a quick estimate.
pub fn similarity(a: &Value, b: &Value) -> f64 {
    if a == b {
        return 1.0;
    }

    let a_str = serde_json::to_string(a).unwrap_or_default();
    let b_str = serde_json::to_string(b).unwrap_or_default();

    TextDiff::from_chars(&a_str, &b_str).ratio() as f64
}
