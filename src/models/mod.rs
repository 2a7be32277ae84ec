//! Core data models for oplog
//!
//! Snapshots and their field values, the actor and target of an operation,
//! and the entry identifier.

pub mod ids;
pub mod snapshot;
pub mod target;
pub mod value;

pub use ids::EntryId;
pub use snapshot::{Snapshot, FIELD_SEPARATOR};
pub use target::{Actor, Auditable, IdentityError, TargetRef, MAX_REPR_CHARS};
pub use value::FieldValue;
