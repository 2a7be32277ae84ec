//! Who performed an operation and what it was performed on

use serde::{Deserialize, Serialize};
use std::fmt;

use super::snapshot::Snapshot;
use crate::error::OplogResult;

/// Maximum length of the stored object representation
pub const MAX_REPR_CHARS: usize = 200;

/// The identity (user or service) an operation is attributed to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name when known, otherwise the id
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn validate(&self) -> Result<(), IdentityError> {
        if self.id.trim().is_empty() {
            return Err(IdentityError::EmptyActor);
        }
        Ok(())
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({})", name, self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Reference to the object an operation touched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRef {
    /// Model (resource type) name, e.g. `article`
    pub model: String,

    /// Primary key of the object, as text
    pub object_id: String,

    /// Human-readable description of the object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repr: Option<String>,
}

impl TargetRef {
    pub fn new(model: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            object_id: object_id.into(),
            repr: None,
        }
    }

    /// Attach a description, truncated to `MAX_REPR_CHARS`
    pub fn with_repr(mut self, repr: Option<String>) -> Self {
        self.repr = repr.map(|r| r.chars().take(MAX_REPR_CHARS).collect());
        self
    }

    pub fn validate(&self) -> Result<(), IdentityError> {
        if self.model.trim().is_empty() {
            return Err(IdentityError::EmptyModel);
        }
        if self.object_id.trim().is_empty() {
            return Err(IdentityError::EmptyObjectId);
        }
        Ok(())
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.model, self.object_id)?;
        if let Some(repr) = &self.repr {
            write!(f, " ({})", repr)?;
        }
        Ok(())
    }
}

/// Validation errors for actors and targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    EmptyActor,
    EmptyModel,
    EmptyObjectId,
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyActor => write!(f, "Actor id cannot be empty"),
            Self::EmptyModel => write!(f, "Target model cannot be empty"),
            Self::EmptyObjectId => write!(f, "Target object id cannot be empty"),
        }
    }
}

impl std::error::Error for IdentityError {}

/// An object whose writes can be logged
///
/// Implemented by the integrating application for each resource it wants
/// audited. `snapshot` is usually `Snapshot::from_serialize(self)`.
pub trait Auditable {
    /// Model name entries are filed under
    fn model_name(&self) -> String;

    /// Primary key as text
    fn object_id(&self) -> String;

    /// Optional human-readable description
    fn object_repr(&self) -> Option<String> {
        None
    }

    /// Current field values
    fn snapshot(&self) -> OplogResult<Snapshot>;

    fn target(&self) -> TargetRef {
        TargetRef::new(self.model_name(), self.object_id()).with_repr(self.object_repr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_validation() {
        assert!(Actor::new("42").validate().is_ok());
        assert_eq!(Actor::new("  ").validate(), Err(IdentityError::EmptyActor));
    }

    #[test]
    fn test_actor_label() {
        assert_eq!(Actor::new("42").label(), "42");
        assert_eq!(Actor::new("42").with_name("ann").label(), "ann");
        assert_eq!(Actor::new("42").with_name("ann").to_string(), "ann (42)");
    }

    #[test]
    fn test_target_validation() {
        assert!(TargetRef::new("article", "1").validate().is_ok());
        assert_eq!(
            TargetRef::new("", "1").validate(),
            Err(IdentityError::EmptyModel)
        );
        assert_eq!(
            TargetRef::new("article", "").validate(),
            Err(IdentityError::EmptyObjectId)
        );
    }

    #[test]
    fn test_repr_truncated() {
        let target = TargetRef::new("article", "1").with_repr(Some("x".repeat(300)));
        assert_eq!(target.repr.unwrap().len(), MAX_REPR_CHARS);
    }
}
