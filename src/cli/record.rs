//! CLI commands that run the write-path pipeline on snapshot files
//!
//! `diff` previews the change set between two JSON documents; `record`
//! logs it through the configured sinks, the same way an embedding service
//! would through a request scope.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;

use crate::audit::{
    changes_for, Action, CollectingReporter, FieldFilter, Operation, OperationLogger,
    SensitiveFields, SinkSet,
};
use crate::config::{OplogPaths, Settings};
use crate::display::describe_changes;
use crate::error::{OplogError, OplogResult};
use crate::models::{Actor, Snapshot, TargetRef};

/// Arguments for `oplog diff`
#[derive(Args, Debug, Clone)]
pub struct DiffArgs {
    /// JSON document with the prior state
    pub before: PathBuf,

    /// JSON document with the new state
    pub after: PathBuf,

    /// Apply this model's field filter, labels and choices
    #[arg(short, long)]
    pub model: Option<String>,

    /// Print the change set as JSON instead of messages
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `oplog record`
#[derive(Args, Debug, Clone)]
pub struct RecordArgs {
    /// Actor id the operation is attributed to
    #[arg(long)]
    pub actor: String,

    /// Actor display name
    #[arg(long)]
    pub actor_name: Option<String>,

    /// Model of the touched object
    #[arg(short, long)]
    pub model: String,

    /// Id of the touched object
    #[arg(short, long)]
    pub object: String,

    /// Short representation of the object
    #[arg(long)]
    pub repr: Option<String>,

    /// create, update or delete
    #[arg(long, default_value = "update")]
    pub operation: Operation,

    /// Triggering action, e.g. partial_update or a custom action name
    #[arg(long)]
    pub action: Option<String>,

    /// Display name for a custom action
    #[arg(long, requires = "action")]
    pub action_name: Option<String>,

    /// JSON document with the prior state (not needed for create)
    #[arg(long)]
    pub before: Option<PathBuf>,

    /// JSON document with the new state (not needed for delete)
    #[arg(long)]
    pub after: Option<PathBuf>,

    /// Free-text context stored with the entry
    #[arg(long)]
    pub context: Option<String>,
}

/// Map an action code to a standard action, or a custom one
pub fn parse_action(code: &str, name: Option<&str>) -> Action {
    match code {
        "create" => Action::Create,
        "update" => Action::Update,
        "partial_update" => Action::PartialUpdate,
        "destroy" => Action::Destroy,
        custom => Action::custom(custom, name.unwrap_or(custom)),
    }
}

fn read_snapshot(path: &Path) -> OplogResult<Snapshot> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| OplogError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
    let value: serde_json::Value = serde_json::from_str(&contents)
        .map_err(|e| OplogError::Json(format!("Failed to parse {}: {}", path.display(), e)))?;
    Snapshot::from_json(&value)
}

fn read_optional(path: Option<&Path>) -> OplogResult<Snapshot> {
    path.map_or_else(|| Ok(Snapshot::new()), read_snapshot)
}

/// Handle `oplog diff`
pub fn handle_diff(settings: &Settings, args: DiffArgs) -> OplogResult<()> {
    let before = read_snapshot(&args.before)?;
    let after = read_snapshot(&args.after)?;

    let model = args.model.as_deref().and_then(|m| settings.model(m));
    let filter = match (args.model.as_deref(), model) {
        (Some(name), Some(config)) => FieldFilter::for_model(name, config)?,
        _ => FieldFilter::all(),
    };

    let policy = settings.missing_fields;
    let mut changes = changes_for(Operation::Update, &before, &after, &filter, policy);
    SensitiveFields::new(&settings.sensitive_fields).mask(&mut changes);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&changes)?);
    } else {
        for message in describe_changes(&changes, model) {
            println!("{}", message);
        }
    }
    Ok(())
}

/// Handle `oplog record`
pub fn handle_record(paths: &OplogPaths, settings: &Settings, args: RecordArgs) -> OplogResult<()> {
    let before = match args.operation {
        Operation::Create => Snapshot::new(),
        _ => read_optional(args.before.as_deref())?,
    };
    let after = match args.operation {
        Operation::Delete => Snapshot::new(),
        _ => read_optional(args.after.as_deref())?,
    };

    let sinks = SinkSet::from_settings(&settings.persistence, paths)?;
    tracing::debug!(sinks = ?sinks.names(), "sinks opened");
    let reporter = Arc::new(CollectingReporter::new());
    let logger =
        OperationLogger::new(settings.clone(), Arc::new(sinks))?.with_reporter(reporter.clone());

    let mut actor = Actor::new(args.actor);
    if let Some(name) = args.actor_name {
        actor = actor.with_name(name);
    }

    let mut scope = logger.scope(actor)?;
    if let Some(code) = args.action.as_deref() {
        scope = scope.action(parse_action(code, args.action_name.as_deref()));
    }
    if let Some(context) = args.context {
        scope = scope.context(context);
    }

    let target = TargetRef::new(args.model, args.object).with_repr(args.repr);
    let entry = scope.record(args.operation, target, &before, &after)?;
    scope.finalize(true);

    if let Some(report) = reporter.reports().into_iter().next() {
        return Err(OplogError::Persistence(report));
    }

    match entry {
        Some(entry) => println!(
            "Recorded {}: {}",
            entry.id().short(),
            entry.format_human_readable()
        ),
        None => println!("Nothing recorded: no changes or action excluded."),
    }
    Ok(())
}
