//! Change extraction between two snapshots
//!
//! Compares the before and after state of one object field by field and
//! keeps only the fields that differ. Pure and deterministic.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::changes::{ChangeSet, FieldChange};
use crate::config::ModelSettings;
use crate::error::{OplogError, OplogResult};
use crate::models::{FieldValue, Snapshot, FIELD_SEPARATOR};

/// How a field absent from one snapshot compares against the other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissingFieldPolicy {
    /// Absent and null are different states; appearing or disappearing is a change
    #[default]
    Distinct,
    /// Fields absent from either snapshot are never reported
    SkipAbsent,
    /// Absent is read as null before comparing
    AbsentAsNull,
}

/// Which fields take part in change extraction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldFilter {
    include: Option<BTreeSet<String>>,
    exclude: BTreeSet<String>,
}

impl FieldFilter {
    /// Accept every field
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to the given fields
    pub fn including<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Never consider the given fields
    pub fn excluding<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Build the filter for a configured model
    ///
    /// When the model declares its fields, every included or excluded name
    /// must be one of them (or a nested path under one of them).
    pub fn for_model(model: &str, settings: &ModelSettings) -> OplogResult<Self> {
        if !settings.fields.is_empty() {
            let declared: BTreeSet<&str> = settings.fields.iter().map(String::as_str).collect();
            let listed = settings
                .include
                .iter()
                .flatten()
                .chain(settings.exclude.iter());

            for field in listed {
                let root = field.split(FIELD_SEPARATOR).next().unwrap_or(field.as_str());
                if !declared.contains(field.as_str()) && !declared.contains(root) {
                    return Err(OplogError::Configuration(format!(
                        "Model '{}' lists unknown field '{}'",
                        model, field
                    )));
                }
            }
        }

        let mut filter = Self::all().excluding(settings.exclude.iter().cloned());
        if let Some(include) = &settings.include {
            filter = filter.including(include.iter().cloned());
        }
        Ok(filter)
    }

    /// Whether a field (possibly a nested `a>b` path) is logged
    pub fn allows(&self, field: &str) -> bool {
        if self.exclude.iter().any(|f| covers(f, field)) {
            return false;
        }
        match &self.include {
            Some(include) => include.iter().any(|f| covers(f, field)),
            None => true,
        }
    }

    /// Drop fields the filter rejects
    pub fn restrict(&self, snapshot: &Snapshot) -> Snapshot {
        snapshot
            .iter()
            .filter(|(name, _)| self.allows(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

/// `owner` covers `owner` and `owner>name`
fn covers(configured: &str, field: &str) -> bool {
    field == configured
        || field
            .strip_prefix(configured)
            .is_some_and(|rest| rest.starts_with(FIELD_SEPARATOR))
}

/// Compute the fields whose values differ between two snapshots
pub fn extract_changes(
    before: &Snapshot,
    after: &Snapshot,
    filter: &FieldFilter,
    missing: MissingFieldPolicy,
) -> ChangeSet {
    let names: BTreeSet<&String> = before
        .field_names()
        .chain(after.field_names())
        .filter(|name| filter.allows(name))
        .collect();

    let mut changes = ChangeSet::new();
    for name in names {
        if let Some(change) = compare(before.get(name), after.get(name), missing) {
            changes.insert(name.clone(), change);
        }
    }
    changes
}

fn compare(
    old: Option<&FieldValue>,
    new: Option<&FieldValue>,
    missing: MissingFieldPolicy,
) -> Option<FieldChange> {
    let (old, new) = match (old, new, missing) {
        (None, None, _) => return None,
        (None, _, MissingFieldPolicy::SkipAbsent) | (_, None, MissingFieldPolicy::SkipAbsent) => {
            return None
        }
        (old, new, MissingFieldPolicy::AbsentAsNull) => (
            Some(old.cloned().unwrap_or(FieldValue::Null)),
            Some(new.cloned().unwrap_or(FieldValue::Null)),
        ),
        (old, new, _) => (old.cloned(), new.cloned()),
    };

    let change = FieldChange { old, new };
    change.differs().then_some(change)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(value: serde_json::Value) -> Snapshot {
        Snapshot::from_json(&value).unwrap()
    }

    fn diff_all(before: &Snapshot, after: &Snapshot) -> ChangeSet {
        extract_changes(before, after, &FieldFilter::all(), MissingFieldPolicy::Distinct)
    }

    #[test]
    fn test_simple_field_change() {
        let before = snapshot(json!({"name": "Checking", "balance": 1000}));
        let after = snapshot(json!({"name": "Checking", "balance": 1500}));

        let changes = diff_all(&before, &after);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes.get("balance"), Some(&FieldChange::changed(1000, 1500)));
        assert!(!changes.contains("name"));
    }

    #[test]
    fn test_no_changes() {
        let before = snapshot(json!({"name": "Test", "value": 100}));
        let changes = diff_all(&before, &before);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_numeric_kinds_compare_by_value() {
        let before = snapshot(json!({"price": 10}));
        let after = snapshot(json!({"price": 10.0}));
        let changes = diff_all(&before, &after);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_integers_beyond_i64_are_exact() {
        let before = snapshot(json!({"seq": u64::MAX}));
        let after = snapshot(json!({"seq": u64::MAX - 1}));
        let changes = diff_all(&before, &after);
        assert_eq!(changes.get("seq"), Some(&FieldChange::changed(u64::MAX, u64::MAX - 1)));
    }

    #[test]
    fn test_integer_against_float_beyond_f64_precision() {
        let exact = (1i64 << 53) + 1;
        let before = Snapshot::new().with("seq", exact);
        let after = Snapshot::new().with("seq", FieldValue::Decimal((1u64 << 53) as f64));
        assert_eq!(diff_all(&before, &after).len(), 1);

        let rounded = Snapshot::new().with("seq", 1i64 << 53);
        assert!(diff_all(&rounded, &after).is_empty());
    }

    #[test]
    fn test_unchanged_nan_is_not_a_change() {
        let before = Snapshot::new().with("ratio", f64::NAN).with("name", "a");
        let after = Snapshot::new().with("ratio", f64::NAN).with("name", "a");
        assert!(diff_all(&before, &after).is_empty());

        let raw = Snapshot::from_iter([("ratio".to_string(), FieldValue::Decimal(f64::NAN))]);
        assert!(diff_all(&raw, &raw.clone()).is_empty());
    }

    #[test]
    fn test_nested_change() {
        let before = snapshot(json!({"owner": {"name": "Old", "age": 3}}));
        let after = snapshot(json!({"owner": {"name": "New", "age": 3}}));

        let changes = diff_all(&before, &after);
        assert_eq!(changes.get("owner>name"), Some(&FieldChange::changed("Old", "New")));
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn test_exclusion() {
        let before = snapshot(json!({"status": "draft", "internal_notes": "a"}));
        let after = snapshot(json!({"status": "draft", "internal_notes": "b"}));
        let filter = FieldFilter::all().excluding(["internal_notes"]);

        let changes = extract_changes(&before, &after, &filter, MissingFieldPolicy::Distinct);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_inclusion_covers_nested_paths() {
        let before = snapshot(json!({"owner": {"name": "a"}, "title": "x"}));
        let after = snapshot(json!({"owner": {"name": "b"}, "title": "y"}));
        let filter = FieldFilter::all().including(["owner"]);

        let changes = extract_changes(&before, &after, &filter, MissingFieldPolicy::Distinct);
        assert!(changes.contains("owner>name"));
        assert!(!changes.contains("title"));
    }

    #[test]
    fn test_prefix_is_not_a_path() {
        let filter = FieldFilter::all().excluding(["own"]);
        assert!(filter.allows("owner"));
        assert!(!filter.allows("own>x"));
    }

    #[test]
    fn test_included_field_missing_from_both_is_unchanged() {
        let before = snapshot(json!({"a": 1}));
        let after = snapshot(json!({"a": 2}));
        let filter = FieldFilter::all().including(["a", "ghost"]);

        let changes = extract_changes(&before, &after, &filter, MissingFieldPolicy::Distinct);
        assert_eq!(changes.len(), 1);
        assert!(!changes.contains("ghost"));
    }

    #[test]
    fn test_missing_policy_distinct() {
        let before = snapshot(json!({}));
        let after = snapshot(json!({"notes": null}));

        let changes = diff_all(&before, &after);
        assert_eq!(changes.get("notes"), Some(&FieldChange::added(FieldValue::Null)));
    }

    #[test]
    fn test_missing_policy_absent_as_null() {
        let before = snapshot(json!({}));
        let after = snapshot(json!({"notes": null, "title": "x"}));

        let filter = FieldFilter::all();
        let changes = extract_changes(&before, &after, &filter, MissingFieldPolicy::AbsentAsNull);
        assert!(!changes.contains("notes"));
        assert_eq!(
            changes.get("title"),
            Some(&FieldChange::changed(FieldValue::Null, "x"))
        );
    }

    #[test]
    fn test_missing_policy_skip_absent() {
        let before = snapshot(json!({"gone": 1, "kept": 1}));
        let after = snapshot(json!({"kept": 2, "fresh": 3}));

        let filter = FieldFilter::all();
        let changes = extract_changes(&before, &after, &filter, MissingFieldPolicy::SkipAbsent);
        assert_eq!(changes.len(), 1);
        assert!(changes.contains("kept"));
    }

    #[test]
    fn test_for_model_rejects_unknown_fields() {
        let settings = ModelSettings {
            fields: vec!["status".into(), "owner".into()],
            exclude: vec!["internal_notes".into()],
            ..Default::default()
        };
        let err = FieldFilter::for_model("article", &settings).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("internal_notes"));
    }

    #[test]
    fn test_for_model_accepts_nested_paths_of_declared_fields() {
        let settings = ModelSettings {
            fields: vec!["status".into(), "owner".into()],
            include: Some(vec!["owner>name".into(), "status".into()]),
            ..Default::default()
        };
        let filter = FieldFilter::for_model("article", &settings).unwrap();
        assert!(filter.allows("status"));
        assert!(filter.allows("owner>name"));
        assert!(!filter.allows("owner>email"));
    }

    #[test]
    fn test_for_model_without_declared_fields_skips_validation() {
        let settings = ModelSettings {
            include: Some(vec!["anything".into()]),
            ..Default::default()
        };
        assert!(FieldFilter::for_model("article", &settings).is_ok());
    }

    #[test]
    fn test_restrict() {
        let snap = snapshot(json!({"a": 1, "b": 2}));
        let restricted = FieldFilter::all().excluding(["b"]).restrict(&snap);
        assert_eq!(restricted.len(), 1);
        assert!(restricted.contains("a"));
    }
}
