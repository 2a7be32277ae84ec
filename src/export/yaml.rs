//! YAML export of log entries

use std::io::Write;

use crate::audit::OperationLogEntry;
use crate::error::{OplogError, OplogResult};
use crate::export::json::LogExport;

/// Write entries as a YAML document with a short comment header
pub fn export_entries_yaml<W: Write>(
    entries: Vec<OperationLogEntry>,
    writer: &mut W,
) -> OplogResult<()> {
    let export = LogExport::from_entries(entries);
    let export_err = |e: std::io::Error| OplogError::Export(e.to_string());

    writeln!(writer, "# oplog export").map_err(export_err)?;
    writeln!(writer, "# Generated: {}", export.exported_at).map_err(export_err)?;
    writeln!(writer, "# App Version: {}", export.app_version).map_err(export_err)?;
    writeln!(writer).map_err(export_err)?;

    serde_yaml::to_writer(writer, &export).map_err(|e| OplogError::Export(e.to_string()))
}

/// Read back and validate a YAML export
pub fn import_from_yaml(yaml_str: &str) -> OplogResult<LogExport> {
    let export: LogExport =
        serde_yaml::from_str(yaml_str).map_err(|e| OplogError::Export(e.to_string()))?;
    export.validate().map_err(OplogError::Export)?;
    Ok(export)
}
