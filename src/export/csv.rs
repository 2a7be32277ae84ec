//! CSV export of log entries
//!
//! One row per entry. The change set goes into a single column as JSON so
//! the file stays rectangular.

use std::io::Write;

use serde::Serialize;

use crate::audit::OperationLogEntry;
use crate::error::{OplogError, OplogResult};

#[derive(Serialize)]
struct CsvRow<'a> {
    id: String,
    action_time: String,
    actor_id: &'a str,
    actor_name: &'a str,
    model: &'a str,
    object_id: &'a str,
    object_repr: &'a str,
    action: &'a str,
    action_name: &'a str,
    action_flag: u8,
    summary: String,
    changes: String,
    context: &'a str,
}

impl<'a> CsvRow<'a> {
    fn new(entry: &'a OperationLogEntry) -> OplogResult<Self> {
        Ok(Self {
            id: entry.id().to_string(),
            action_time: entry.timestamp().to_rfc3339(),
            actor_id: &entry.actor().id,
            actor_name: entry.actor().name.as_deref().unwrap_or(""),
            model: &entry.target().model,
            object_id: &entry.target().object_id,
            object_repr: entry.target().repr.as_deref().unwrap_or(""),
            action: entry.action(),
            action_name: entry.action_name(),
            action_flag: entry.operation().flag(),
            summary: entry.changes().summary().unwrap_or_default(),
            changes: serde_json::to_string(entry.changes())?,
            context: entry.context().unwrap_or(""),
        })
    }
}

/// Write entries as CSV with a header row
pub fn export_entries_csv<W: Write>(entries: &[OperationLogEntry], writer: W) -> OplogResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    for entry in entries {
        csv_writer
            .serialize(CsvRow::new(entry)?)
            .map_err(|e| OplogError::Export(e.to_string()))?;
    }

    // serialize() only emits the header alongside the first row
    if entries.is_empty() {
        csv_writer
            .write_record([
                "id", "action_time", "actor_id", "actor_name", "model", "object_id",
                "object_repr", "action", "action_name", "action_flag", "summary", "changes",
                "context",
            ])
            .map_err(|e| OplogError::Export(e.to_string()))?;
    }

    csv_writer
        .flush()
        .map_err(|e| OplogError::Export(e.to_string()))
}
