//! Configuration module for oplog
//!
//! - Path resolution for the settings file, database and JSON-lines log
//! - The `Settings` struct handed to the hook at construction time

pub mod paths;
pub mod settings;

pub use paths::OplogPaths;
pub use settings::{DeliveryMode, ModelSettings, PersistenceSettings, Settings};
