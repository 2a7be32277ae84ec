//! Write-path hook
//!
//! `OperationLogger` holds everything that is shared and immutable: the
//! settings, the per-model field filters, the sinks and the error reporter.
//! Each request gets its own `RequestScope`, which wraps the application's
//! create/update/destroy calls:
//!
//! ```text
//! Idle -> CapturingBefore -> DelegatingSave -> CapturingAfter -> Logging -> Idle
//! ```
//!
//! A failed save returns its error untouched and produces no entry. A failure
//! while logging is reported and never changes the save's result.
//!
//! ```rust,ignore
//! let logger = OperationLogger::new(settings, Arc::new(sinks))?;
//! let mut scope = logger.scope(Actor::new(user_id))?.action(Action::PartialUpdate);
//! let article = scope.update(&article, || repo.save(changed))?;
//! scope.finalize(true);
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use super::builder::{changes_for, EntryBuilder};
use super::diff::FieldFilter;
use super::entry::{Action, Operation, OperationLogEntry};
use super::report::{ErrorReporter, TracingReporter};
use super::sensitive::SensitiveFields;
use super::sink::Sink;
use crate::config::{DeliveryMode, Settings};
use crate::error::{OplogError, OplogResult};
use crate::models::{Actor, Auditable, Snapshot, TargetRef};

/// Where a scope is within one intercepted write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookState {
    Idle,
    CapturingBefore,
    DelegatingSave,
    CapturingAfter,
    Logging,
}

/// Shared, immutable entry point of the hook
pub struct OperationLogger {
    settings: Settings,
    filters: BTreeMap<String, FieldFilter>,
    default_filter: FieldFilter,
    sensitive: SensitiveFields,
    sinks: Arc<dyn Sink>,
    reporter: Arc<dyn ErrorReporter>,
}

impl OperationLogger {
    /// Validate the settings and wire up the sinks
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a model's field lists name an
    /// undeclared field.
    pub fn new(settings: Settings, sinks: Arc<dyn Sink>) -> OplogResult<Self> {
        let filters = settings
            .models
            .iter()
            .map(|(name, model)| Ok((name.clone(), FieldFilter::for_model(name, model)?)))
            .collect::<OplogResult<BTreeMap<_, _>>>()?;
        let sensitive = SensitiveFields::new(&settings.sensitive_fields);

        Ok(Self {
            settings,
            filters,
            default_filter: FieldFilter::all(),
            sensitive,
            sinks,
            reporter: Arc::new(TracingReporter),
        })
    }

    /// Replace the default `tracing` reporter
    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Field filter for a model; models without configuration log every field
    pub fn filter_for(&self, model: &str) -> &FieldFilter {
        self.filters.get(model).unwrap_or(&self.default_filter)
    }

    /// Whether an action on a model produces entries
    pub fn should_log(&self, model: &str, action: &Action) -> bool {
        self.settings
            .model(model)
            .map_or(true, |m| !m.is_action_excluded(action.code()))
    }

    /// Start a scope for one request
    ///
    /// # Errors
    ///
    /// Returns a validation error when the actor id is empty.
    pub fn scope(&self, actor: Actor) -> OplogResult<RequestScope<'_>> {
        actor
            .validate()
            .map_err(|e| OplogError::Validation(e.to_string()))?;

        Ok(RequestScope {
            logger: self,
            actor,
            action: None,
            context: None,
            state: HookState::Idle,
            pending: Vec::new(),
        })
    }

    /// Build the entry for one write, or `None` when nothing should be logged
    ///
    /// Pure apart from id and timestamp generation: extraction, masking and
    /// building, without touching any sink.
    #[allow(clippy::too_many_arguments)]
    pub fn compose(
        &self,
        operation: Operation,
        action: &Action,
        actor: &Actor,
        target: TargetRef,
        before: &Snapshot,
        after: &Snapshot,
        context: Option<String>,
    ) -> OplogResult<Option<OperationLogEntry>> {
        if !self.should_log(&target.model, action) {
            return Ok(None);
        }

        let filter = self.filter_for(&target.model);
        let policy = self.settings.missing_fields;
        let mut changes = changes_for(operation, before, after, filter, policy);

        let empty_update = operation == Operation::Update && changes.is_empty();
        if empty_update && self.settings.suppress_empty_changes {
            tracing::debug!(
                model = %target.model,
                object_id = %target.object_id,
                "no changes, entry suppressed"
            );
            return Ok(None);
        }

        self.sensitive.mask(&mut changes);

        EntryBuilder::new(operation, actor.clone(), target)
            .action(action.clone())
            .changes(changes)
            .context(context)
            .build()
            .map(Some)
    }

    /// Hand an entry to the sinks; failures go to the reporter
    fn deliver(&self, entry: &OperationLogEntry) -> bool {
        if !self.settings.persistence.enabled {
            return false;
        }

        match self.sinks.write(entry) {
            Ok(()) => {
                tracing::debug!(
                    id = %entry.id(),
                    operation = %entry.operation(),
                    "entry persisted"
                );
                true
            }
            Err(e) => {
                self.reporter.report(&e, entry.target());
                false
            }
        }
    }

    fn report(&self, error: &OplogError, target: &TargetRef) {
        self.reporter.report(error, target);
    }
}

/// Per-request hook state
///
/// Owns the actor and pending entries of one request; nothing in it is shared
/// with other requests.
pub struct RequestScope<'a> {
    logger: &'a OperationLogger,
    actor: Actor,
    action: Option<Action>,
    context: Option<String>,
    state: HookState,
    pending: Vec<OperationLogEntry>,
}

impl<'a> RequestScope<'a> {
    /// Action that triggered this request's writes
    pub fn action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    /// Free-text context attached to every entry of this scope
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn state(&self) -> HookState {
        self.state
    }

    /// Entries waiting for `finalize` in deferred mode
    pub fn pending(&self) -> &[OperationLogEntry] {
        &self.pending
    }

    /// Wrap a create; `save` returns the newly stored object
    pub fn create<T, E, F>(&mut self, save: F) -> Result<T, E>
    where
        T: Auditable,
        F: FnOnce() -> Result<T, E>,
    {
        self.enter(HookState::CapturingBefore);
        let before = Some(Snapshot::new());

        self.enter(HookState::DelegatingSave);
        let created = self.delegate(save)?;

        let target = created.target();
        let action = self.action_for(Operation::Create);
        if self.logger.should_log(&target.model, &action) {
            self.enter(HookState::CapturingAfter);
            let after = self.capture(&created, &target);
            self.log(Operation::Create, action, target, before, after);
        }

        self.enter(HookState::Idle);
        Ok(created)
    }

    /// Wrap an update of `current`; `save` returns the updated object
    pub fn update<T, E, F>(&mut self, current: &T, save: F) -> Result<T, E>
    where
        T: Auditable,
        F: FnOnce() -> Result<T, E>,
    {
        let target = current.target();
        let action = self.action_for(Operation::Update);
        if !self.logger.should_log(&target.model, &action) {
            return save();
        }

        self.enter(HookState::CapturingBefore);
        let before = self.capture(current, &target);

        self.enter(HookState::DelegatingSave);
        let updated = self.delegate(save)?;

        self.enter(HookState::CapturingAfter);
        let target = updated.target();
        let after = self.capture(&updated, &target);
        self.log(Operation::Update, action, target, before, after);

        self.enter(HookState::Idle);
        Ok(updated)
    }

    /// Wrap a delete of `instance`; `delete` may return anything
    pub fn destroy<T, R, E, F>(&mut self, instance: &T, delete: F) -> Result<R, E>
    where
        T: Auditable,
        F: FnOnce() -> Result<R, E>,
    {
        let target = instance.target();
        let action = self.action_for(Operation::Delete);
        if !self.logger.should_log(&target.model, &action) {
            return delete();
        }

        self.enter(HookState::CapturingBefore);
        let before = self.capture(instance, &target);

        self.enter(HookState::DelegatingSave);
        let outcome = self.delegate(delete)?;

        self.enter(HookState::CapturingAfter);
        self.log(Operation::Delete, action, target, before, Some(Snapshot::new()));

        self.enter(HookState::Idle);
        Ok(outcome)
    }

    /// Log a write the application performed itself, e.g. a custom action
    ///
    /// Unlike the wrapping methods, composition errors are returned to the
    /// caller since no business result is at stake.
    pub fn record(
        &mut self,
        operation: Operation,
        target: TargetRef,
        before: &Snapshot,
        after: &Snapshot,
    ) -> OplogResult<Option<OperationLogEntry>> {
        let action = self.action_for(operation);
        self.enter(HookState::Logging);
        let composed = self.logger.compose(
            operation,
            &action,
            &self.actor,
            target,
            before,
            after,
            self.context.clone(),
        );
        self.enter(HookState::Idle);

        let entry = composed?;
        if let Some(entry) = &entry {
            self.dispatch(entry.clone());
        }
        Ok(entry)
    }

    /// Persist deferred entries if the request succeeded, otherwise drop them
    ///
    /// Returns the number of entries the sinks accepted.
    pub fn finalize(mut self, succeeded: bool) -> usize {
        let pending = std::mem::take(&mut self.pending);
        if !succeeded {
            if !pending.is_empty() {
                tracing::debug!(count = pending.len(), "request failed, pending entries discarded");
            }
            return 0;
        }

        pending
            .iter()
            .filter(|entry| self.logger.deliver(entry))
            .count()
    }

    fn enter(&mut self, state: HookState) {
        tracing::trace!(from = ?self.state, to = ?state, "hook state");
        self.state = state;
    }

    fn delegate<R, E, F>(&mut self, save: F) -> Result<R, E>
    where
        F: FnOnce() -> Result<R, E>,
    {
        match save() {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::debug!("delegated save failed, nothing logged");
                self.enter(HookState::Idle);
                Err(e)
            }
        }
    }

    fn capture<T: Auditable>(&self, object: &T, target: &TargetRef) -> Option<Snapshot> {
        match object.snapshot() {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                self.logger.report(&e, target);
                None
            }
        }
    }

    /// The scope's action when it fits the operation, else the standard one
    fn action_for(&self, operation: Operation) -> Action {
        match &self.action {
            Some(action) if action.operation().map_or(true, |op| op == operation) => action.clone(),
            _ => match operation {
                Operation::Create => Action::Create,
                Operation::Update => Action::Update,
                Operation::Delete => Action::Destroy,
            },
        }
    }

    fn log(
        &mut self,
        operation: Operation,
        action: Action,
        target: TargetRef,
        before: Option<Snapshot>,
        after: Option<Snapshot>,
    ) {
        let (Some(before), Some(after)) = (before, after) else {
            return;
        };

        self.enter(HookState::Logging);
        let composed = self.logger.compose(
            operation,
            &action,
            &self.actor,
            target.clone(),
            &before,
            &after,
            self.context.clone(),
        );

        match composed {
            Ok(Some(entry)) => self.dispatch(entry),
            Ok(None) => {}
            Err(e) => self.logger.report(&e, &target),
        }
    }

    fn dispatch(&mut self, entry: OperationLogEntry) {
        match self.logger.settings.delivery {
            DeliveryMode::Inline => {
                self.logger.deliver(&entry);
            }
            DeliveryMode::Deferred => self.pending.push(entry),
        }
    }
}

impl Drop for RequestScope<'_> {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            tracing::warn!(
                count = self.pending.len(),
                "request scope dropped without finalize, entries not persisted"
            );
        }
    }
}
