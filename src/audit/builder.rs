//! Log record builder
//!
//! Turns an operation, its actor and target, and a change set into an
//! `OperationLogEntry` with a fresh id and timestamp.

use chrono::{DateTime, Utc};

use super::changes::ChangeSet;
use super::diff::{extract_changes, FieldFilter, MissingFieldPolicy};
use super::entry::{Action, Operation, OperationLogEntry};
use crate::error::{OplogError, OplogResult};
use crate::models::{Actor, EntryId, Snapshot, TargetRef};

/// Change set for an operation given its before and after snapshots
///
/// A create is compared against an empty before-snapshot, so every
/// configured posterior field is reported. A delete is compared against an
/// empty after-snapshot, reporting the full prior state. Updates use the
/// configured missing-field policy.
pub fn changes_for(
    operation: Operation,
    before: &Snapshot,
    after: &Snapshot,
    filter: &FieldFilter,
    missing: MissingFieldPolicy,
) -> ChangeSet {
    let empty = Snapshot::new();
    match operation {
        Operation::Create => extract_changes(&empty, after, filter, MissingFieldPolicy::Distinct),
        Operation::Delete => extract_changes(before, &empty, filter, MissingFieldPolicy::Distinct),
        Operation::Update => extract_changes(before, after, filter, missing),
    }
}

/// Builder for a single entry
#[derive(Debug, Clone)]
pub struct EntryBuilder {
    operation: Operation,
    actor: Actor,
    target: TargetRef,
    action: Option<Action>,
    changes: ChangeSet,
    context: Option<String>,
    timestamp: Option<DateTime<Utc>>,
}

impl EntryBuilder {
    pub fn new(operation: Operation, actor: Actor, target: TargetRef) -> Self {
        Self {
            operation,
            actor,
            target,
            action: None,
            changes: ChangeSet::new(),
            context: None,
            timestamp: None,
        }
    }

    /// Triggering action; defaults to the standard action for the operation
    pub fn action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn changes(mut self, changes: ChangeSet) -> Self {
        self.changes = changes;
        self
    }

    pub fn context(mut self, context: Option<String>) -> Self {
        self.context = context.filter(|c| !c.trim().is_empty());
        self
    }

    /// Override the generated timestamp
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Validate and produce the entry
    pub fn build(self) -> OplogResult<OperationLogEntry> {
        self.actor
            .validate()
            .map_err(|e| OplogError::Validation(e.to_string()))?;
        self.target
            .validate()
            .map_err(|e| OplogError::Validation(e.to_string()))?;

        let action = self.action.unwrap_or(match self.operation {
            Operation::Create => Action::Create,
            Operation::Update => Action::Update,
            Operation::Delete => Action::Destroy,
        });

        if let Some(implied) = action.operation() {
            if implied != self.operation {
                return Err(OplogError::Validation(format!(
                    "Action '{}' cannot record a {} operation",
                    action.code(),
                    self.operation
                )));
            }
        }

        Ok(OperationLogEntry::from_parts(
            EntryId::new(),
            self.timestamp.unwrap_or_else(Utc::now),
            self.actor,
            self.target,
            self.operation,
            action.code().to_string(),
            action.display_name().to_string(),
            self.changes,
            self.context,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::changes::FieldChange;
    use serde_json::json;

    fn article(value: serde_json::Value) -> Snapshot {
        Snapshot::from_json(&value).unwrap()
    }

    fn builder(operation: Operation) -> EntryBuilder {
        EntryBuilder::new(operation, Actor::new("7"), TargetRef::new("article", "1"))
    }

    #[test]
    fn test_create_reports_full_posterior_state() {
        let after = article(json!({"title": "Hi", "status": "draft", "internal_notes": "x"}));
        let filter = FieldFilter::all().excluding(["internal_notes"]);

        let policy = MissingFieldPolicy::SkipAbsent;
        let changes = changes_for(Operation::Create, &Snapshot::new(), &after, &filter, policy);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes.get("title"), Some(&FieldChange::added("Hi")));
        assert_eq!(changes.get("status"), Some(&FieldChange::added("draft")));
    }

    #[test]
    fn test_delete_reports_full_prior_state() {
        let before = article(json!({"title": "Hi", "status": "published"}));

        let changes = changes_for(
            Operation::Delete,
            &before,
            &Snapshot::new(),
            &FieldFilter::all(),
            MissingFieldPolicy::Distinct,
        );
        assert_eq!(changes.len(), 2);
        assert_eq!(changes.get("status"), Some(&FieldChange::removed("published")));
    }

    #[test]
    fn test_create_ignores_any_before_state() {
        let stale = article(json!({"title": "Hi"}));
        let after = article(json!({"title": "Hi"}));

        let filter = FieldFilter::all();
        let changes =
            changes_for(Operation::Create, &stale, &after, &filter, MissingFieldPolicy::Distinct);
        assert_eq!(changes.get("title"), Some(&FieldChange::added("Hi")));
    }

    #[test]
    fn test_build_entry() {
        let entry = builder(Operation::Update)
            .changes(ChangeSet::new().with("status", FieldChange::changed("draft", "published")))
            .context(Some("from admin".into()))
            .build()
            .unwrap();

        assert_eq!(entry.operation(), Operation::Update);
        assert_eq!(entry.action(), "update");
        assert_eq!(entry.action_name(), "Edit");
        assert_eq!(entry.context(), Some("from admin"));
        assert_eq!(entry.changes().len(), 1);
    }

    #[test]
    fn test_default_action_for_delete() {
        let entry = builder(Operation::Delete).build().unwrap();
        assert_eq!(entry.action(), "destroy");
        assert_eq!(entry.action_name(), "Delete");
    }

    #[test]
    fn test_empty_actor_rejected() {
        let target = TargetRef::new("article", "1");
        let err = EntryBuilder::new(Operation::Create, Actor::new(""), target)
            .build()
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_empty_target_rejected() {
        let target = TargetRef::new("article", " ");
        let err = EntryBuilder::new(Operation::Create, Actor::new("7"), target)
            .build()
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_mismatched_action_rejected() {
        let err = builder(Operation::Create)
            .action(Action::Destroy)
            .build()
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_custom_action_allowed_for_any_operation() {
        let entry = builder(Operation::Update)
            .action(Action::custom("publish", "Publish"))
            .build()
            .unwrap();
        assert_eq!(entry.action(), "publish");
        assert_eq!(entry.action_name(), "Publish");
    }

    #[test]
    fn test_blank_context_dropped() {
        let entry = builder(Operation::Create)
            .context(Some("  ".into()))
            .build()
            .unwrap();
        assert_eq!(entry.context(), None);
    }
}
