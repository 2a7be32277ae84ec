//! oplog - operation logging for REST write paths
//!
//! Records who created, updated or deleted which object, when, and exactly
//! which fields changed, without ever changing the outcome of the write
//! itself.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: settings and path management
//! - `error`: custom error types
//! - `models`: snapshots, field values, actors and targets
//! - `audit`: change extraction, entry building, sinks and the write-path hook
//! - `storage`: SQLite table and JSON-lines mirror
//! - `services`: history queries
//! - `display` / `export`: terminal output and file exports
//! - `cli`: command handlers for the `oplog` binary
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use oplog::audit::{OperationLogger, SinkSet};
//! use oplog::config::{OplogPaths, Settings};
//! use oplog::models::Actor;
//!
//! let paths = OplogPaths::new()?;
//! let settings = Settings::load_or_create(&paths)?;
//! let sinks = SinkSet::from_settings(&settings.persistence, &paths)?;
//! let logger = OperationLogger::new(settings, Arc::new(sinks))?;
//!
//! let mut scope = logger.scope(Actor::new("42"))?;
//! let article = scope.create(|| articles.insert(draft))?;
//! ```

pub mod audit;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod export;
pub mod models;
pub mod services;
pub mod storage;

pub use error::{OplogError, OplogResult};
