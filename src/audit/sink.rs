//! Persistence sinks for log entries
//!
//! A sink durably records entries. The relational store and JSON-lines log
//! live in `crate::storage`; this module holds the trait, the in-process and
//! tracing sinks, and `SinkSet`, which fans an entry out to every enabled sink.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::entry::OperationLogEntry;
use crate::config::{OplogPaths, PersistenceSettings};
use crate::error::{OplogError, OplogResult};
use crate::storage::{JsonlLog, SqliteStore};

/// A destination that durably records entries
pub trait Sink: Send + Sync {
    /// Short name used in error reports
    fn name(&self) -> &str;

    /// Record one entry
    fn write(&self, entry: &OperationLogEntry) -> OplogResult<()>;
}

/// Keeps entries in memory; counts every write attempt
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<OperationLogEntry>>,
    calls: AtomicUsize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `write` was called
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Copy of every stored entry, oldest first
    pub fn entries(&self) -> Vec<OperationLogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

impl Sink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn write(&self, entry: &OperationLogEntry) -> OplogResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| OplogError::Persistence(format!("Failed to acquire lock: {}", e)))?;
        entries.push(entry.clone());
        Ok(())
    }
}

/// Emits each entry as a structured `tracing` event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl Sink for TracingSink {
    fn name(&self) -> &str {
        "tracing"
    }

    fn write(&self, entry: &OperationLogEntry) -> OplogResult<()> {
        let changes = entry.changes().summary().unwrap_or_default();
        tracing::info!(
            target: "oplog::entry",
            id = %entry.id(),
            operation = %entry.operation(),
            model = %entry.target().model,
            object_id = %entry.target().object_id,
            actor = %entry.actor().id,
            action = entry.action(),
            changes = %changes,
            "operation logged"
        );
        Ok(())
    }
}

/// Every enabled sink, written in order
#[derive(Clone, Default)]
pub struct SinkSet {
    sinks: Vec<Arc<dyn Sink>>,
}

impl SinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style add
    pub fn with(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Open the sinks the persistence settings switch on
    pub fn from_settings(settings: &PersistenceSettings, paths: &OplogPaths) -> OplogResult<Self> {
        let mut set = Self::new();
        if !settings.enabled {
            return Ok(set);
        }

        if settings.database {
            paths.ensure_directories()?;
            set = set.with(Arc::new(SqliteStore::open(paths.database_file())?));
        }
        if settings.jsonl {
            set = set.with(Arc::new(JsonlLog::new(paths.jsonl_file())));
        }
        if settings.tracing {
            set = set.with(Arc::new(TracingSink));
        }
        Ok(set)
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn names(&self) -> Vec<String> {
        self.sinks.iter().map(|s| s.name().to_string()).collect()
    }
}

impl Sink for SinkSet {
    fn name(&self) -> &str {
        "sinks"
    }

    /// Every sink is attempted even after a failure
    fn write(&self, entry: &OperationLogEntry) -> OplogResult<()> {
        let failures: Vec<String> = self
            .sinks
            .iter()
            .filter_map(|sink| match sink.write(entry) {
                Ok(()) => None,
                Err(e) => {
                    tracing::warn!(sink = sink.name(), error = %e, "sink write failed");
                    Some(format!("{}: {}", sink.name(), e))
                }
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(OplogError::Persistence(failures.join("; ")))
        }
    }
}

impl std::fmt::Debug for SinkSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkSet").field("sinks", &self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::builder::EntryBuilder;
    use crate::audit::entry::Operation;
    use crate::models::{Actor, TargetRef};
    use tempfile::TempDir;

    struct BrokenSink;

    impl Sink for BrokenSink {
        fn name(&self) -> &str {
            "broken"
        }

        fn write(&self, _entry: &OperationLogEntry) -> OplogResult<()> {
            Err(OplogError::Persistence("disk full".into()))
        }
    }

    fn entry() -> OperationLogEntry {
        EntryBuilder::new(Operation::Create, Actor::new("1"), TargetRef::new("article", "9"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_memory_sink_records() {
        let sink = MemorySink::new();
        sink.write(&entry()).unwrap();
        assert_eq!(sink.calls(), 1);
        assert_eq!(sink.entries().len(), 1);
    }

    #[test]
    fn test_set_attempts_every_sink() {
        let memory = Arc::new(MemorySink::new());
        let set = SinkSet::new()
            .with(Arc::new(BrokenSink))
            .with(memory.clone());

        let err = set.write(&entry()).unwrap_err();
        assert!(err.is_persistence());
        assert!(err.to_string().contains("broken: "));
        assert_eq!(memory.calls(), 1);
    }

    #[test]
    fn test_from_settings_disabled() {
        let temp_dir = TempDir::new().unwrap();
        let paths = OplogPaths::with_base_dir(temp_dir.path().to_path_buf());
        let settings = PersistenceSettings {
            enabled: false,
            ..Default::default()
        };

        let set = SinkSet::from_settings(&settings, &paths).unwrap();
        assert!(set.is_empty());
        assert!(!paths.database_file().exists());
    }

    #[test]
    fn test_from_settings_opens_enabled_sinks() {
        let temp_dir = TempDir::new().unwrap();
        let paths = OplogPaths::with_base_dir(temp_dir.path().to_path_buf());
        let settings = PersistenceSettings {
            enabled: true,
            database: true,
            jsonl: true,
            tracing: true,
        };

        let set = SinkSet::from_settings(&settings, &paths).unwrap();
        assert_eq!(set.names(), vec!["database", "jsonl", "tracing"]);
        set.write(&entry()).unwrap();
        assert!(paths.jsonl_file().exists());
    }
}
