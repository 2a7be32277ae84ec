//! Operation logging for REST write paths
//!
//! Records who created, updated or deleted which object, when, and which
//! fields changed.
//!
//! # Architecture
//!
//! - `diff`: the change extractor. Compares two `Snapshot`s under a
//!   `FieldFilter` and returns a `ChangeSet`.
//! - `builder`: turns an operation, actor, target and change set into an
//!   `OperationLogEntry`.
//! - `sink`: the `Sink` trait and `SinkSet`, which fans entries out to the
//!   enabled sinks (see also `crate::storage`).
//! - `hook`: `OperationLogger` and the per-request `RequestScope` that wrap
//!   the application's create/update/destroy calls.
//! - `sensitive`: masking of credential-like fields.
//! - `report`: where failures go once the business write has succeeded.
//!
//! # Example
//!
//! ```rust,ignore
//! use oplog::audit::{Action, OperationLogger, SinkSet};
//! use oplog::models::Actor;
//!
//! let sinks = SinkSet::from_settings(&settings.persistence, &paths)?;
//! let logger = OperationLogger::new(settings, Arc::new(sinks))?;
//!
//! let mut scope = logger.scope(Actor::new("42").with_name("ann"))?
//!     .action(Action::Update);
//! let saved = scope.update(&article, || articles.save(edited))?;
//! ```

mod builder;
mod changes;
pub mod diff;
mod entry;
mod hook;
mod report;
mod sensitive;
mod sink;

pub use builder::{changes_for, EntryBuilder};
pub use changes::{ChangeSet, FieldChange};
pub use diff::{extract_changes, FieldFilter, MissingFieldPolicy};
pub use entry::{Action, Operation, OperationLogEntry};
pub use hook::{HookState, OperationLogger, RequestScope};
pub use report::{CollectingReporter, ErrorReporter, TracingReporter};
pub use sensitive::{SensitiveFields, CLEANED_SUBSTITUTE};
pub use sink::{MemorySink, Sink, SinkSet, TracingSink};
