//! JSON-lines mirror of the operation log
//!
//! Each entry is appended as one JSON object per line and flushed right
//! away. The file is never rewritten.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::audit::{OperationLogEntry, Sink};
use crate::error::{OplogError, OplogResult};

/// Append-only `.jsonl` file of entries
pub struct JsonlLog {
    path: PathBuf,
    /// Serializes appends from concurrent requests
    write_lock: Mutex<()>,
}

impl JsonlLog {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Append one entry
    pub fn append(&self, entry: &OperationLogEntry) -> OplogResult<()> {
        self.append_all(std::slice::from_ref(entry))
    }

    /// Append several entries with a single flush
    pub fn append_all(&self, entries: &[OperationLogEntry]) -> OplogResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| OplogError::Persistence(format!("Failed to acquire lock: {}", e)))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| OplogError::Persistence(format!("Failed to open log file: {}", e)))?;

        for entry in entries {
            let line = serde_json::to_string(entry)?;
            writeln!(file, "{}", line)
                .map_err(|e| OplogError::Persistence(format!("Failed to write entry: {}", e)))?;
        }

        file.flush()
            .map_err(|e| OplogError::Persistence(format!("Failed to flush log file: {}", e)))
    }

    /// Every entry, oldest first
    pub fn read_all(&self) -> OplogResult<Vec<OperationLogEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)
            .map_err(|e| OplogError::Io(format!("Failed to open log file: {}", e)))?;

        let mut entries = Vec::new();
        for (line_num, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| {
                OplogError::Io(format!("Failed to read line {}: {}", line_num + 1, e))
            })?;
            if line.trim().is_empty() {
                continue;
            }

            let entry = serde_json::from_str(&line).map_err(|e| {
                OplogError::Json(format!("Failed to parse entry at line {}: {}", line_num + 1, e))
            })?;
            entries.push(entry);
        }

        Ok(entries)
    }

    /// The last `count` entries, oldest first
    pub fn read_recent(&self, count: usize) -> OplogResult<Vec<OperationLogEntry>> {
        let mut entries = self.read_all()?;
        let start = entries.len().saturating_sub(count);
        Ok(entries.split_off(start))
    }

    pub fn entry_count(&self) -> OplogResult<usize> {
        if !self.path.exists() {
            return Ok(0);
        }

        let file = File::open(&self.path)
            .map_err(|e| OplogError::Io(format!("Failed to open log file: {}", e)))?;
        Ok(BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter(|l| !l.trim().is_empty())
            .count())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for JsonlLog {
    fn name(&self) -> &str {
        "jsonl"
    }

    fn write(&self, entry: &OperationLogEntry) -> OplogResult<()> {
        self.append(entry)
    }
}
