//! Settings for the operation logger
//!
//! Settings are loaded once and passed explicitly to `OperationLogger::new`;
//! nothing in the library reads process-wide state.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::paths::OplogPaths;
use crate::audit::diff::{FieldFilter, MissingFieldPolicy};
use crate::error::OplogError;

/// Which sinks receive entries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistenceSettings {
    /// Master switch; when off no sink is written
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Write to the `operation_log` table
    #[serde(default = "default_true")]
    pub database: bool,

    /// Mirror entries to the JSON-lines file
    #[serde(default)]
    pub jsonl: bool,

    /// Emit each entry as a structured `tracing` event
    #[serde(default)]
    pub tracing: bool,
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            database: true,
            jsonl: false,
            tracing: false,
        }
    }
}

/// When built entries reach the sinks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Persist right after the delegated save succeeds
    #[default]
    Inline,
    /// Buffer in the request scope until `finalize`
    Deferred,
}

/// Per-model logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelSettings {
    /// Declared field names; when non-empty, field lists are checked against it
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,

    /// Only these fields are logged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,

    /// These fields are never logged
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,

    /// Display labels per field
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Display labels for stored choice values, per field
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub choices: BTreeMap<String, BTreeMap<String, String>>,

    /// Actions that never produce entries (e.g. `partial_update`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_actions: Vec<String>,
}

impl ModelSettings {
    /// Label for a field, falling back to its name
    pub fn label<'a>(&'a self, field: &'a str) -> &'a str {
        self.labels.get(field).map(String::as_str).unwrap_or(field)
    }

    pub fn is_action_excluded(&self, action: &str) -> bool {
        self.excluded_actions.iter().any(|a| a == action)
    }
}

/// Settings for the operation logger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    #[serde(default)]
    pub persistence: PersistenceSettings,

    #[serde(default)]
    pub delivery: DeliveryMode,

    /// How a field absent from a snapshot compares against one that is present
    #[serde(default)]
    pub missing_fields: MissingFieldPolicy,

    /// Drop update entries whose change set is empty
    #[serde(default = "default_true")]
    pub suppress_empty_changes: bool,

    /// Extra field names masked in addition to the built-in credential names
    #[serde(default)]
    pub sensitive_fields: Vec<String>,

    #[serde(default)]
    pub models: BTreeMap<String, ModelSettings>,
}

fn default_schema_version() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            persistence: PersistenceSettings::default(),
            delivery: DeliveryMode::default(),
            missing_fields: MissingFieldPolicy::default(),
            suppress_empty_changes: true,
            sensitive_fields: Vec::new(),
            models: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Configuration for a model, if any
    pub fn model(&self, name: &str) -> Option<&ModelSettings> {
        self.models.get(name)
    }

    /// Check every model's field lists
    pub fn validate(&self) -> Result<(), OplogError> {
        for (name, model) in &self.models {
            FieldFilter::for_model(name, model)?;
        }
        Ok(())
    }

    /// Load settings from disk, or defaults if no settings file exists
    ///
    /// `config.yaml` takes precedence over `config.json`.
    pub fn load_or_create(paths: &OplogPaths) -> Result<Self, OplogError> {
        let yaml = paths.settings_yaml_file();
        if yaml.exists() {
            return Self::load_from(&yaml);
        }

        let json = paths.settings_file();
        if json.exists() {
            return Self::load_from(&json);
        }

        Ok(Self::default())
    }

    /// Load settings from a JSON or YAML file, chosen by extension
    pub fn load_from(path: &Path) -> Result<Self, OplogError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| OplogError::Io(format!("Failed to read settings file: {}", e)))?;

        let settings: Settings = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&contents).map_err(|e| {
                OplogError::Configuration(format!("Failed to parse settings file: {}", e))
            })?,
            _ => serde_json::from_str(&contents).map_err(|e| {
                OplogError::Configuration(format!("Failed to parse settings file: {}", e))
            })?,
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Save settings as JSON
    pub fn save(&self, paths: &OplogPaths) -> Result<(), OplogError> {
        paths.ensure_directories()?;

        let contents = serde_json::to_string_pretty(self).map_err(|e| {
            OplogError::Configuration(format!("Failed to serialize settings: {}", e))
        })?;

        std::fs::write(paths.settings_file(), contents)
            .map_err(|e| OplogError::Io(format!("Failed to write settings file: {}", e)))?;

        Ok(())
    }
}
