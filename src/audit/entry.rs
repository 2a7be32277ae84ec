//! Operation log entry data structures
//!
//! Defines the operation kinds, the REST actions that trigger them, and the
//! entry format itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::changes::ChangeSet;
use crate::models::{Actor, EntryId, TargetRef};

/// Kinds of write that are logged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Object was created
    Create,
    /// Object was updated
    Update,
    /// Object was deleted
    Delete,
}

impl Operation {
    /// Stable numeric flag stored in the `action_flag` column
    pub fn flag(&self) -> u8 {
        match self {
            Operation::Create => 1,
            Operation::Update => 2,
            Operation::Delete => 3,
        }
    }

    pub fn from_flag(flag: u8) -> Option<Self> {
        match flag {
            1 => Some(Operation::Create),
            2 => Some(Operation::Update),
            3 => Some(Operation::Delete),
            _ => None,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Create => write!(f, "CREATE"),
            Operation::Update => write!(f, "UPDATE"),
            Operation::Delete => write!(f, "DELETE"),
        }
    }
}

impl std::str::FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "create" => Ok(Operation::Create),
            "update" => Ok(Operation::Update),
            "delete" => Ok(Operation::Delete),
            other => Err(format!("Unknown operation '{}'", other)),
        }
    }
}

/// The REST action that triggered a write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
    PartialUpdate,
    Destroy,
    /// Application-defined action with its own display name
    Custom { action: String, name: String },
}

impl Action {
    pub fn custom(action: impl Into<String>, name: impl Into<String>) -> Self {
        Action::Custom {
            action: action.into(),
            name: name.into(),
        }
    }

    /// Machine name, e.g. `partial_update`
    pub fn code(&self) -> &str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::PartialUpdate => "partial_update",
            Action::Destroy => "destroy",
            Action::Custom { action, .. } => action,
        }
    }

    /// Name shown to people reading the log
    pub fn display_name(&self) -> &str {
        match self {
            Action::Create => "Add",
            Action::Update | Action::PartialUpdate => "Edit",
            Action::Destroy => "Delete",
            Action::Custom { name, .. } => name,
        }
    }

    /// The operation a standard action implies
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Action::Create => Some(Operation::Create),
            Action::Update | Action::PartialUpdate => Some(Operation::Update),
            Action::Destroy => Some(Operation::Delete),
            Action::Custom { .. } => None,
        }
    }
}

/// A single logged write
///
/// Built once through `EntryBuilder` and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationLogEntry {
    id: EntryId,

    /// When the operation occurred (UTC)
    timestamp: DateTime<Utc>,

    actor: Actor,

    target: TargetRef,

    operation: Operation,

    /// Machine name of the triggering action
    action: String,

    /// Display name of the triggering action
    action_name: String,

    #[serde(default)]
    changes: ChangeSet,

    /// Free-text context supplied by the caller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context: Option<String>,
}

impl OperationLogEntry {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        id: EntryId,
        timestamp: DateTime<Utc>,
        actor: Actor,
        target: TargetRef,
        operation: Operation,
        action: String,
        action_name: String,
        changes: ChangeSet,
        context: Option<String>,
    ) -> Self {
        Self {
            id,
            timestamp,
            actor,
            target,
            operation,
            action,
            action_name,
            changes,
            context,
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn target(&self) -> &TargetRef {
        &self.target
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn action_name(&self) -> &str {
        &self.action_name
    }

    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Format the entry for human-readable output
    pub fn format_human_readable(&self) -> String {
        let mut output = format!(
            "[{}] {} {} by {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.operation,
            self.target,
            self.actor.label()
        );

        if let Some(summary) = self.changes.summary() {
            output.push_str(&format!("\n  Changes: {}", summary));
        }

        if let Some(context) = &self.context {
            output.push_str(&format!("\n  Context: {}", context));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::changes::FieldChange;

    fn sample_entry() -> OperationLogEntry {
        OperationLogEntry::from_parts(
            EntryId::new(),
            Utc::now(),
            Actor::new("7").with_name("ann"),
            TargetRef::new("article", "12").with_repr(Some("Hello".into())),
            Operation::Update,
            "update".into(),
            "Edit".into(),
            ChangeSet::new().with("status", FieldChange::changed("draft", "published")),
            Some("bulk publish".into()),
        )
    }

    #[test]
    fn test_operation_display() {
        assert_eq!(Operation::Create.to_string(), "CREATE");
        assert_eq!(Operation::Update.to_string(), "UPDATE");
        assert_eq!(Operation::Delete.to_string(), "DELETE");
    }

    #[test]
    fn test_operation_flags() {
        for op in [Operation::Create, Operation::Update, Operation::Delete] {
            assert_eq!(Operation::from_flag(op.flag()), Some(op));
        }
        assert_eq!(Operation::from_flag(9), None);
    }

    #[test]
    fn test_operation_parse() {
        assert_eq!("Update".parse::<Operation>(), Ok(Operation::Update));
        assert!("upsert".parse::<Operation>().is_err());
    }

    #[test]
    fn test_action_names() {
        assert_eq!(Action::PartialUpdate.code(), "partial_update");
        assert_eq!(Action::PartialUpdate.display_name(), "Edit");
        assert_eq!(Action::Destroy.operation(), Some(Operation::Delete));

        let publish = Action::custom("publish", "Publish");
        assert_eq!(publish.code(), "publish");
        assert_eq!(publish.display_name(), "Publish");
        assert_eq!(publish.operation(), None);
    }

    #[test]
    fn test_serialization() {
        let entry = sample_entry();
        let json = serde_json::to_string(&entry).unwrap();
        let deserialized: OperationLogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, entry);
    }

    #[test]
    fn test_human_readable_format() {
        let formatted = sample_entry().format_human_readable();
        assert!(formatted.contains("UPDATE"));
        assert!(formatted.contains("article 12 (Hello)"));
        assert!(formatted.contains("by ann"));
        assert!(formatted.contains("status: \"draft\" -> \"published\""));
        assert!(formatted.contains("Context: bulk publish"));
    }
}
