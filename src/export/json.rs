//! JSON export of log entries
//!
//! Wraps the entries with a schema version and summary metadata so exports
//! can be checked when read back.

use std::collections::BTreeMap;
use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::OperationLogEntry;
use crate::error::{OplogError, OplogResult};

/// Current export schema version
pub const EXPORT_SCHEMA_VERSION: &str = "1.0.0";

/// A set of exported entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogExport {
    /// Schema version for compatibility checking
    pub schema_version: String,

    pub exported_at: DateTime<Utc>,

    /// Version of oplog that wrote the export
    pub app_version: String,

    pub metadata: ExportMetadata,

    /// Entries, newest first
    pub entries: Vec<OperationLogEntry>,
}

/// Summary of the exported entries
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportMetadata {
    pub entry_count: usize,

    /// Entries per model
    pub models: BTreeMap<String, usize>,

    pub earliest: Option<DateTime<Utc>>,

    pub latest: Option<DateTime<Utc>>,
}

impl LogExport {
    pub fn from_entries(entries: Vec<OperationLogEntry>) -> Self {
        let mut models = BTreeMap::new();
        for entry in &entries {
            *models.entry(entry.target().model.clone()).or_insert(0) += 1;
        }

        let metadata = ExportMetadata {
            entry_count: entries.len(),
            models,
            earliest: entries.iter().map(|e| e.timestamp()).min(),
            latest: entries.iter().map(|e| e.timestamp()).max(),
        };

        Self {
            schema_version: EXPORT_SCHEMA_VERSION.to_string(),
            exported_at: Utc::now(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            metadata,
            entries,
        }
    }

    /// Check the schema version and that the metadata matches the entries
    pub fn validate(&self) -> Result<(), String> {
        if self.schema_version != EXPORT_SCHEMA_VERSION {
            return Err(format!(
                "Schema version mismatch: expected {}, got {}",
                EXPORT_SCHEMA_VERSION, self.schema_version
            ));
        }

        if self.metadata.entry_count != self.entries.len() {
            return Err(format!(
                "Metadata lists {} entries, found {}",
                self.metadata.entry_count,
                self.entries.len()
            ));
        }

        Ok(())
    }
}

/// Write entries as a JSON document
pub fn export_entries_json<W: Write>(
    entries: Vec<OperationLogEntry>,
    writer: &mut W,
    pretty: bool,
) -> OplogResult<()> {
    let export = LogExport::from_entries(entries);

    if pretty {
        serde_json::to_writer_pretty(writer, &export)
    } else {
        serde_json::to_writer(writer, &export)
    }
    .map_err(|e| OplogError::Export(e.to_string()))
}

/// Read back and validate a JSON export
pub fn import_from_json(json_str: &str) -> OplogResult<LogExport> {
    let export: LogExport =
        serde_json::from_str(json_str).map_err(|e| OplogError::Export(e.to_string()))?;
    export.validate().map_err(OplogError::Export)?;
    Ok(export)
}
