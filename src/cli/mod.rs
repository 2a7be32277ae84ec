//! CLI command handlers
//!
//! Bridges the clap argument parsing in `main.rs` with the service and
//! audit layers.

pub mod export;
pub mod log;
pub mod record;

pub use export::{handle_export, ExportArgs, ExportFormat};
pub use log::{handle_history, handle_list, handle_show, FilterArgs, ListArgs, PageArgs};
pub use record::{handle_diff, handle_record, DiffArgs, RecordArgs};
