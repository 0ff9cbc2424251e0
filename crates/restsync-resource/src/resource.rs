//! Resource bodies

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Result;
use crate::attribute::{get_at_path, parse_attribute_path};

/// An opaque JSON-like resource body.
///
/// Cloning is a deep copy; callers that need to edit a body clone it
/// first so the original value is never mutated behind their back.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource(Value);

impl Resource {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn value_mut(&mut self) -> &mut Value {
        &mut self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        self.0.as_object()
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        self.0.as_array()
    }

    /// True when the body is collection-shaped (a JSON array).
    pub fn is_collection(&self) -> bool {
        self.0.is_array()
    }

    /// Look up an attribute by dot/bracket path.
    pub fn attribute(&self, path: &str) -> Result<Option<&Value>> {
        let segments = parse_attribute_path(path)?;
        Ok(get_at_path(&self.0, &segments))
    }

    /// Attribute rendered as an identifier string.
    ///
    /// Strings are returned as-is, numbers and booleans in their JSON
    /// text form; anything else (missing, null, objects, arrays) is `None`.
    pub fn attribute_string(&self, path: &str) -> Result<Option<String>> {
        Ok(self.attribute(path)?.and_then(scalar_to_string))
    }
}

/// Render a scalar JSON value as a plain string.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl From<Value> for Resource {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl From<Resource> for Value {
    fn from(resource: Resource) -> Self {
        resource.0
    }
}

impl AsRef<Value> for Resource {
    fn as_ref(&self) -> &Value {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_string_renders_scalars() {
        let resource = Resource::new(json!({"id": 42, "name": "team-a", "tags": ["x"]}));
        assert_eq!(resource.attribute_string("id").unwrap(), Some("42".into()));
        assert_eq!(
            resource.attribute_string("name").unwrap(),
            Some("team-a".into())
        );
        assert_eq!(resource.attribute_string("tags").unwrap(), None);
        assert_eq!(resource.attribute_string("missing").unwrap(), None);
    }

    #[test]
    fn test_attribute_rejects_malformed_path() {
        let resource = Resource::new(json!({}));
        assert!(resource.attribute("a..b").is_err());
    }

    #[test]
    fn test_clone_is_deep() {
        let original = Resource::new(json!({"nested": {"v": 1}}));
        let mut copy = original.clone();
        copy.value_mut()["nested"]["v"] = json!(2);
        assert_eq!(original.value()["nested"]["v"], json!(1));
    }

    #[test]
    fn test_serde_is_transparent() {
        let resource: Resource = serde_json::from_str(r#"[{"a":1}]"#).unwrap();
        assert!(resource.is_collection());
        assert_eq!(serde_json::to_string(&resource).unwrap(), r#"[{"a":1}]"#);
    }
}
