//! CLI command for exporting log entries
//!
//! Writes the entries selected by the `list` filters (without paging) to a
//! file in CSV, JSON or YAML.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use clap::{Args, ValueEnum};

use crate::error::{OplogError, OplogResult};
use crate::export::{export_entries_csv, export_entries_json, export_entries_yaml};
use crate::storage::SqliteStore;

use super::log::FilterArgs;

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// One row per entry
    Csv,
    /// Entries with schema version and metadata
    Json,
    /// Same document as JSON, human-readable
    Yaml,
}

/// Arguments for `oplog export`
#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Output file path
    pub output: PathBuf,

    /// Export format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: ExportFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    #[command(flatten)]
    pub filter: FilterArgs,
}

/// Handle `oplog export`
pub fn handle_export(store: &SqliteStore, args: ExportArgs) -> OplogResult<()> {
    let entries = store.list(&args.filter.to_query())?;
    let count = entries.len();

    let file = File::create(&args.output).map_err(|e| {
        OplogError::Export(format!(
            "Failed to create file {}: {}",
            args.output.display(),
            e
        ))
    })?;
    let mut writer = BufWriter::new(file);

    match args.format {
        ExportFormat::Csv => export_entries_csv(&entries, &mut writer)?,
        ExportFormat::Json => export_entries_json(entries, &mut writer, args.pretty)?,
        ExportFormat::Yaml => export_entries_yaml(entries, &mut writer)?,
    }
    writer
        .flush()
        .map_err(|e| OplogError::Export(e.to_string()))?;

    println!("Exported {} entries to: {}", count, args.output.display());
    Ok(())
}
