//! Stored objects
//!
//! Objects are schema-less JSON maps tagged with their type. References hold
//! the referenced object's id, collections hold an array of ids and embedded
//! properties hold a nested JSON object.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::auth::Sharing;

/// An object as held by an object store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GistObject {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub values: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharing: Option<Sharing>,
}

impl GistObject {
    pub fn new(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
            values: Map::new(),
            sharing: None,
        }
    }

    /// Create an object with a generated id
    pub fn generated(type_name: impl Into<String>) -> Self {
        Self::new(type_name, Uuid::new_v4().simple().to_string())
    }

    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn with_reference(self, name: impl Into<String>, id: impl Into<String>) -> Self {
        self.with_value(name, Value::String(id.into()))
    }

    pub fn with_collection<I, S>(self, name: impl Into<String>, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<Value> = ids.into_iter().map(|id| Value::String(id.into())).collect();
        self.with_value(name, Value::Array(ids))
    }

    pub fn with_sharing(mut self, sharing: Sharing) -> Self {
        self.sharing = Some(sharing);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Id held by a reference property
    pub fn reference(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    /// Ids held by a collection property, in stored order
    pub fn collection(&self, name: &str) -> Vec<&str> {
        collection_ids(self.values.get(name))
    }
}

/// Ids of a collection value; anything that is not an id string is skipped
pub fn collection_ids(value: Option<&Value>) -> Vec<&str> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(id) => Some(id.as_str()),
                Value::Object(map) => map.get("id").and_then(Value::as_str),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_helpers() {
        let object = GistObject::new("userGroup", "g1")
            .with_value("name", "Admins")
            .with_reference("createdBy", "u1")
            .with_collection("users", ["u1", "u2"]);

        assert_eq!(object.get("name"), Some(&json!("Admins")));
        assert_eq!(object.reference("createdBy"), Some("u1"));
        assert_eq!(object.collection("users"), vec!["u1", "u2"]);
        assert!(object.collection("missing").is_empty());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = GistObject::generated("user");
        let b = GistObject::generated("user");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_collection_accepts_id_objects() {
        let value = json!([{"id": "a"}, "b", 3]);
        assert_eq!(collection_ids(Some(&value)), vec!["a", "b"]);
    }
}
