//! Export module for oplog
//!
//! Writes log entries in three formats:
//! - CSV: one row per entry (spreadsheet-compatible)
//! - JSON: machine-readable, with schema version and metadata
//! - YAML: the same document in human-readable form

pub mod csv;
pub mod json;
pub mod yaml;

pub use self::csv::export_entries_csv;
pub use json::{
    export_entries_json, import_from_json, ExportMetadata, LogExport, EXPORT_SCHEMA_VERSION,
};
pub use yaml::{export_entries_yaml, import_from_yaml};
