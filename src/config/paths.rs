//! Path management for oplog
//!
//! ## Path Resolution Order
//!
//! 1. `OPLOG_HOME` environment variable (if set)
//! 2. The platform config directory reported by `directories`
//!    (`~/.config/oplog` on Linux, `%APPDATA%\oplog\config` on Windows)

use std::path::PathBuf;

use directories::ProjectDirs;

use crate::error::OplogError;

/// Environment variable overriding the base directory
pub const HOME_ENV: &str = "OPLOG_HOME";

/// Manages all paths used by oplog
#[derive(Debug, Clone)]
pub struct OplogPaths {
    base_dir: PathBuf,
}

impl OplogPaths {
    /// Resolve the base directory from the environment
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be determined.
    pub fn new() -> Result<Self, OplogError> {
        let base_dir = match std::env::var(HOME_ENV) {
            Ok(custom) if !custom.is_empty() => PathBuf::from(custom),
            _ => ProjectDirs::from("", "", "oplog")
                .map(|dirs| dirs.config_dir().to_path_buf())
                .ok_or_else(|| {
                    OplogError::Configuration("Could not determine a home directory".into())
                })?,
        };

        Ok(Self { base_dir })
    }

    /// Use an explicit base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// JSON settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// YAML settings file, preferred over JSON when present
    pub fn settings_yaml_file(&self) -> PathBuf {
        self.base_dir.join("config.yaml")
    }

    /// SQLite database holding the `operation_log` table
    pub fn database_file(&self) -> PathBuf {
        self.base_dir.join("oplog.db")
    }

    /// Append-only JSON-lines mirror of the log
    pub fn jsonl_file(&self) -> PathBuf {
        self.base_dir.join("oplog.jsonl")
    }

    pub fn ensure_directories(&self) -> Result<(), OplogError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| OplogError::Io(format!("Failed to create base directory: {}", e)))
    }

    /// Check if a settings file has been written
    pub fn is_initialized(&self) -> bool {
        self.settings_file().exists() || self.settings_yaml_file().exists()
    }
}
