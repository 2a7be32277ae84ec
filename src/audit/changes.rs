//! Change sets: the delta between two snapshots

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::FieldValue;

/// Before/after pair for one field
///
/// `None` on either side means the field was absent from that snapshot,
/// which is distinct from `Some(FieldValue::Null)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<FieldValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<FieldValue>,
}

impl FieldChange {
    /// A value that changed in place
    pub fn changed(old: impl Into<FieldValue>, new: impl Into<FieldValue>) -> Self {
        Self {
            old: Some(old.into()),
            new: Some(new.into()),
        }
    }

    /// A field that only exists after the operation
    pub fn added(new: impl Into<FieldValue>) -> Self {
        Self {
            old: None,
            new: Some(new.into()),
        }
    }

    /// A field that only existed before the operation
    pub fn removed(old: impl Into<FieldValue>) -> Self {
        Self {
            old: Some(old.into()),
            new: None,
        }
    }

    /// Whether the two sides actually differ
    pub fn differs(&self) -> bool {
        self.old != self.new
    }

    /// A masked sensitive field: it changed, but its values are withheld
    pub fn is_hidden(&self) -> bool {
        let substitute = || Some(FieldValue::from(super::CLEANED_SUBSTITUTE));
        self.old == substitute() && self.new == substitute()
    }
}

/// Mapping from field name to before/after pair
///
/// Every key present differs between its old and new side, except masked
/// sensitive fields, which carry the substitute on both sides. Such a pair
/// means "changed, value hidden"; see [`FieldChange::is_hidden`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet {
    changes: BTreeMap<String, FieldChange>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change; pairs whose sides are equal are dropped
    pub fn insert(&mut self, field: impl Into<String>, change: FieldChange) -> bool {
        if !change.differs() {
            return false;
        }
        self.changes.insert(field.into(), change);
        true
    }

    /// Builder-style insert
    pub fn with(mut self, field: impl Into<String>, change: FieldChange) -> Self {
        self.insert(field, change);
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldChange> {
        self.changes.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.changes.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldChange)> {
        self.changes.iter()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &String> {
        self.changes.keys()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut FieldChange)> {
        self.changes.iter_mut()
    }

    /// One-line human-readable summary, `None` when nothing changed
    pub fn summary(&self) -> Option<String> {
        if self.changes.is_empty() {
            return None;
        }

        let parts: Vec<String> = self
            .changes
            .iter()
            .map(|(field, change)| format!("{}: {}", field, describe_change(change)))
            .collect();

        Some(parts.join(", "))
    }
}

/// `old -> new`, with `(added)`/`(removed)` standing in for absent sides
pub(crate) fn describe_change(change: &FieldChange) -> String {
    let side = |v: &Option<FieldValue>, absent: &str| match v {
        Some(value) => value.to_string(),
        None => absent.to_string(),
    };
    format!(
        "{} -> {}",
        side(&change.old, "(added)"),
        side(&change.new, "(removed)")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_pairs_are_dropped() {
        let mut changes = ChangeSet::new();
        assert!(!changes.insert("status", FieldChange::changed("draft", "draft")));
        assert!(changes.is_empty());
        assert!(changes.insert("status", FieldChange::changed("draft", "published")));
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn test_absent_differs_from_null() {
        let change = FieldChange {
            old: None,
            new: Some(FieldValue::Null),
        };
        assert!(change.differs());
    }

    #[test]
    fn test_summary() {
        let changes = ChangeSet::new()
            .with("balance", FieldChange::changed(1000, 1500))
            .with("name", FieldChange::changed("Old", "New"))
            .with("memo", FieldChange::added("hi"))
            .with("legacy", FieldChange::removed(true));

        let summary = changes.summary().unwrap();
        assert!(summary.contains("balance: 1000 -> 1500"));
        assert!(summary.contains("name: \"Old\" -> \"New\""));
        assert!(summary.contains("memo: (added) -> \"hi\""));
        assert!(summary.contains("legacy: true -> (removed)"));
    }

    #[test]
    fn test_empty_summary() {
        assert!(ChangeSet::new().summary().is_none());
    }

    #[test]
    fn test_json_round_trip() {
        let changes = ChangeSet::new()
            .with("status", FieldChange::changed("draft", "published"))
            .with("notes", FieldChange::added(FieldValue::Null))
            .with("owner", FieldChange::changed(
                FieldValue::reference("user", "1"),
                FieldValue::reference("user", "2"),
            ));

        let json = serde_json::to_string(&changes).unwrap();
        let back: ChangeSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, changes);
        assert_eq!(back.get("notes").unwrap().old, None);
        assert_eq!(back.get("notes").unwrap().new, Some(FieldValue::Null));
    }
}
