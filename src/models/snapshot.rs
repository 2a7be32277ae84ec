//! Snapshots of an object's state at one point in time

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::value::FieldValue;
use crate::error::{OplogError, OplogResult};

/// Separator joining nested field names, e.g. `owner>email`
pub const FIELD_SEPARATOR: &str = ">";

/// Read-only mapping from field name to value
///
/// Nested objects are flattened so every key addresses a single leaf field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    fields: BTreeMap<String, FieldValue>,
}

impl Snapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set a field value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into().normalized());
    }

    /// Get a field value; `None` means the field is absent
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    /// Build a snapshot from a JSON object, flattening nested objects
    pub fn from_json(value: &Value) -> OplogResult<Self> {
        let Value::Object(obj) = value else {
            return Err(OplogError::Validation(format!(
                "Snapshot must be a JSON object, got {}",
                json_kind(value)
            )));
        };

        let mut snapshot = Self::new();
        flatten_into(&mut snapshot.fields, obj, "");
        Ok(snapshot)
    }

    /// Build a snapshot from any serializable value
    pub fn from_serialize<T: Serialize>(value: &T) -> OplogResult<Self> {
        let json = serde_json::to_value(value)?;
        Self::from_json(&json)
    }
}

impl FromIterator<(String, FieldValue)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(name, value)| (name, value.normalized()))
                .collect(),
        }
    }
}

fn flatten_into(
    out: &mut BTreeMap<String, FieldValue>,
    obj: &serde_json::Map<String, Value>,
    parent: &str,
) {
    for (key, value) in obj {
        let name = if parent.is_empty() {
            key.clone()
        } else {
            format!("{}{}{}", parent, FIELD_SEPARATOR, key)
        };

        match value {
            Value::Object(nested) => flatten_into(out, nested, &name),
            other => {
                out.insert(name, FieldValue::from_json(other.clone()));
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder() {
        let snapshot = Snapshot::new().with("status", "draft").with("views", 10);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("status"), Some(&FieldValue::from("draft")));
        assert!(snapshot.get("missing").is_none());
    }

    #[test]
    fn test_from_json_flattens_nested_objects() {
        let snapshot = Snapshot::from_json(&json!({
            "title": "Hello",
            "owner": {"name": "ann", "address": {"city": "Oslo"}},
            "tags": ["a", "b"]
        }))
        .unwrap();

        assert_eq!(snapshot.get("owner>name"), Some(&FieldValue::from("ann")));
        assert_eq!(snapshot.get("owner>address>city"), Some(&FieldValue::from("Oslo")));
        assert!(!snapshot.contains("owner"));
        assert!(matches!(snapshot.get("tags"), Some(FieldValue::List(_))));
    }

    #[test]
    fn test_null_is_present() {
        let snapshot = Snapshot::from_json(&json!({"notes": null})).unwrap();
        assert!(snapshot.contains("notes"));
        assert_eq!(snapshot.get("notes"), Some(&FieldValue::Null));
    }

    #[test]
    fn test_non_finite_numbers_are_null() {
        let snapshot = Snapshot::new()
            .with("ratio", f64::NAN)
            .with("limit", FieldValue::Decimal(f64::INFINITY));
        assert_eq!(snapshot.get("ratio"), Some(&FieldValue::Null));
        assert_eq!(snapshot.get("limit"), Some(&FieldValue::Null));
    }

    #[test]
    fn test_from_json_rejects_non_objects() {
        let err = Snapshot::from_json(&json!([1, 2])).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_from_serialize() {
        #[derive(Serialize)]
        struct Article {
            id: u32,
            status: String,
        }

        let snapshot = Snapshot::from_serialize(&Article {
            id: 1,
            status: "draft".into(),
        })
        .unwrap();
        assert_eq!(snapshot.get("id"), Some(&FieldValue::Integer(1)));
        assert_eq!(snapshot.get("status"), Some(&FieldValue::from("draft")));
    }
}
