//! Storage layer for oplog
//!
//! The SQLite `operation_log` table is the primary store; a JSON-lines file
//! can mirror it. Both are sinks and are opened from the persistence
//! settings by `SinkSet::from_settings`.

pub mod database;
pub mod jsonl;

pub use database::{EntryQuery, SqliteStore};
pub use jsonl::JsonlLog;
