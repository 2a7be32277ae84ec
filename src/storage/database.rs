//! SQLite store for the `operation_log` table
//!
//! The primary sink. One row per entry; the change set is stored as a JSON
//! object in `change_message` and the operation as its numeric flag.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::audit::{ChangeSet, Operation, OperationLogEntry, Sink};
use crate::error::{OplogError, OplogResult};
use crate::models::{Actor, EntryId, TargetRef};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS operation_log (
    id             TEXT PRIMARY KEY,
    action_time    TEXT NOT NULL,
    actor_id       TEXT NOT NULL,
    actor_name     TEXT,
    target_model   TEXT NOT NULL,
    object_id      TEXT NOT NULL,
    object_repr    TEXT,
    action         TEXT NOT NULL,
    action_name    TEXT NOT NULL,
    action_flag    INTEGER NOT NULL,
    change_message TEXT NOT NULL,
    context        TEXT
);
CREATE INDEX IF NOT EXISTS idx_operation_log_target
    ON operation_log (target_model, object_id);
CREATE INDEX IF NOT EXISTS idx_operation_log_time
    ON operation_log (action_time);
";

const COLUMNS: &str = "id, action_time, actor_id, actor_name, target_model, object_id, \
     object_repr, action, action_name, action_flag, change_message, context";

/// Filters for listing entries
///
/// Every set field narrows the result. Results are ordered newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryQuery {
    pub model: Option<String>,
    pub object_id: Option<String>,
    pub actor: Option<String>,
    pub operation: Option<Operation>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl EntryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries for one object
    pub fn for_object(model: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            object_id: Some(object_id.into()),
            ..Self::default()
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    fn where_clause(&self) -> (String, Vec<Value>) {
        let mut conditions = Vec::new();
        let mut values = Vec::new();

        if let Some(model) = &self.model {
            conditions.push("target_model = ?");
            values.push(Value::Text(model.clone()));
        }
        if let Some(object_id) = &self.object_id {
            conditions.push("object_id = ?");
            values.push(Value::Text(object_id.clone()));
        }
        if let Some(actor) = &self.actor {
            conditions.push("actor_id = ?");
            values.push(Value::Text(actor.clone()));
        }
        if let Some(operation) = self.operation {
            conditions.push("action_flag = ?");
            values.push(Value::Integer(i64::from(operation.flag())));
        }
        if let Some(since) = self.since {
            conditions.push("action_time >= ?");
            values.push(Value::Text(format_time(since)));
        }
        if let Some(until) = self.until {
            conditions.push("action_time <= ?");
            values.push(Value::Text(format_time(until)));
        }

        if conditions.is_empty() {
            (String::new(), values)
        } else {
            (format!(" WHERE {}", conditions.join(" AND ")), values)
        }
    }
}

/// `operation_log` table behind a mutex-guarded connection
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file and make sure the schema exists
    pub fn open(path: impl AsRef<Path>) -> OplogResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::with_connection(conn)
    }

    /// Private in-memory database
    pub fn in_memory() -> OplogResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> OplogResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> OplogResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| OplogError::Storage(format!("Failed to acquire lock: {}", e)))
    }

    /// Insert one row
    pub fn insert(&self, entry: &OperationLogEntry) -> OplogResult<()> {
        let change_message = serde_json::to_string(entry.changes())?;
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO operation_log ({}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                COLUMNS
            ),
            params![
                entry.id().as_uuid().to_string(),
                format_time(entry.timestamp()),
                entry.actor().id,
                entry.actor().name,
                entry.target().model,
                entry.target().object_id,
                entry.target().repr,
                entry.action(),
                entry.action_name(),
                entry.operation().flag(),
                change_message,
                entry.context(),
            ],
        )?;
        Ok(())
    }

    /// Fetch one entry by id
    pub fn get(&self, id: EntryId) -> OplogResult<Option<OperationLogEntry>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM operation_log WHERE id = ?1", COLUMNS),
                params![id.as_uuid().to_string()],
                StoredRow::from_row,
            )
            .optional()?;
        row.map(StoredRow::into_entry).transpose()
    }

    /// Fetch one entry by a unique id prefix, with or without `log-`
    pub fn find_by_prefix(&self, prefix: &str) -> OplogResult<OperationLogEntry> {
        let needle = prefix.trim().trim_start_matches("log-").to_lowercase();
        if needle.is_empty() {
            return Err(OplogError::Validation("Entry id must not be empty".into()));
        }
        // LIKE wildcards never reach the pattern
        if !needle.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
            return Err(OplogError::Validation(format!(
                "Entry id '{}' may only contain hex digits",
                prefix
            )));
        }

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM operation_log WHERE id LIKE ?1 || '%' LIMIT 2",
            COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![needle], StoredRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut rows = rows.into_iter();
        match (rows.next(), rows.next()) {
            (Some(row), None) => row.into_entry(),
            (Some(_), Some(_)) => Err(OplogError::Validation(format!(
                "Entry id '{}' is ambiguous",
                prefix
            ))),
            (None, _) => Err(OplogError::entry_not_found(prefix)),
        }
    }

    /// Entries matching the query, newest first
    pub fn list(&self, query: &EntryQuery) -> OplogResult<Vec<OperationLogEntry>> {
        let (where_clause, mut values) = query.where_clause();
        let limit = match query.limit {
            Some(limit) => sql_integer("limit", limit)?,
            None => -1,
        };
        values.push(Value::Integer(limit));
        values.push(Value::Integer(sql_integer("offset", query.offset)?));

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM operation_log{} \
             ORDER BY action_time DESC, rowid DESC LIMIT ? OFFSET ?",
            COLUMNS, where_clause
        ))?;
        let rows = stmt
            .query_map(params_from_iter(values), StoredRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(StoredRow::into_entry).collect()
    }

    /// Number of entries matching the query's filters, ignoring paging
    pub fn count(&self, query: &EntryQuery) -> OplogResult<usize> {
        let (where_clause, values) = query.where_clause();
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM operation_log{}", where_clause),
            params_from_iter(values),
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl Sink for SqliteStore {
    fn name(&self) -> &str {
        "database"
    }

    fn write(&self, entry: &OperationLogEntry) -> OplogResult<()> {
        self.insert(entry).map_err(|e| match e {
            OplogError::Storage(msg) => OplogError::Persistence(msg),
            other => other,
        })
    }
}

fn sql_integer(name: &str, value: usize) -> OplogResult<i64> {
    i64::try_from(value)
        .map_err(|_| OplogError::Validation(format!("Query {} {} is out of range", name, value)))
}

fn format_time(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Raw column values of one row
struct StoredRow {
    id: String,
    action_time: String,
    actor_id: String,
    actor_name: Option<String>,
    target_model: String,
    object_id: String,
    object_repr: Option<String>,
    action: String,
    action_name: String,
    action_flag: u8,
    change_message: String,
    context: Option<String>,
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            action_time: row.get(1)?,
            actor_id: row.get(2)?,
            actor_name: row.get(3)?,
            target_model: row.get(4)?,
            object_id: row.get(5)?,
            object_repr: row.get(6)?,
            action: row.get(7)?,
            action_name: row.get(8)?,
            action_flag: row.get(9)?,
            change_message: row.get(10)?,
            context: row.get(11)?,
        })
    }

    fn into_entry(self) -> OplogResult<OperationLogEntry> {
        let id: EntryId = self
            .id
            .parse()
            .map_err(|_| OplogError::Storage(format!("Invalid entry id '{}'", self.id)))?;
        let timestamp = DateTime::parse_from_rfc3339(&self.action_time)
            .map_err(|e| {
                OplogError::Storage(format!("Invalid action_time for {}: {}", self.id, e))
            })?
            .with_timezone(&Utc);
        let operation = Operation::from_flag(self.action_flag).ok_or_else(|| {
            OplogError::Storage(format!("Invalid action_flag {} for {}", self.action_flag, self.id))
        })?;
        let changes: ChangeSet = serde_json::from_str(&self.change_message)?;

        let mut actor = Actor::new(self.actor_id);
        actor.name = self.actor_name;
        let mut target = TargetRef::new(self.target_model, self.object_id);
        target.repr = self.object_repr;

        Ok(OperationLogEntry::from_parts(
            id,
            timestamp,
            actor,
            target,
            operation,
            self.action,
            self.action_name,
            changes,
            self.context,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{EntryBuilder, FieldChange};
    use crate::models::FieldValue;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn entry(model: &str, object_id: &str, operation: Operation, minute: u32) -> OperationLogEntry {
        let actor = Actor::new("7").with_name("ann");
        EntryBuilder::new(operation, actor, TargetRef::new(model, object_id))
            .changes(ChangeSet::new().with("status", FieldChange::changed("draft", "published")))
            .at(Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn test_change_set_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        let changes = ChangeSet::new()
            .with("status", FieldChange::changed("draft", "published"))
            .with(
                "owner",
                FieldChange::changed(FieldValue::reference("user", "3"), FieldValue::Null),
            )
            .with("tags", FieldChange::added(FieldValue::List(vec!["a".into(), 2.into()])))
            .with("priority", FieldChange::removed(1.5));
        let target = TargetRef::new("article", "1");
        let written = EntryBuilder::new(Operation::Update, Actor::new("7"), target)
            .changes(changes)
            .context(Some("bulk edit".into()))
            .build()
            .unwrap();

        store.write(&written).unwrap();
        let read = store.get(written.id()).unwrap().unwrap();

        assert_eq!(read.changes(), written.changes());
        assert_eq!(read.id(), written.id());
        assert_eq!(read.timestamp(), written.timestamp());
        assert_eq!(read.context(), Some("bulk edit"));
        assert_eq!(read, written);
    }

    #[test]
    fn test_get_missing() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.get(EntryId::new()).unwrap().is_none());
    }

    #[test]
    fn test_list_newest_first_with_filters() {
        let store = SqliteStore::in_memory().unwrap();
        store.insert(&entry("article", "1", Operation::Create, 0)).unwrap();
        store.insert(&entry("article", "1", Operation::Update, 5)).unwrap();
        store.insert(&entry("article", "2", Operation::Create, 3)).unwrap();
        store.insert(&entry("comment", "1", Operation::Delete, 9)).unwrap();

        let all = store.list(&EntryQuery::new()).unwrap();
        let minutes: Vec<_> = all.iter().map(|e| e.timestamp().format("%M").to_string()).collect();
        assert_eq!(minutes, vec!["09", "05", "03", "00"]);

        let history = store.list(&EntryQuery::for_object("article", "1")).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].operation(), Operation::Update);

        let creates = EntryQuery {
            operation: Some(Operation::Create),
            ..EntryQuery::new()
        };
        assert_eq!(store.count(&creates).unwrap(), 2);

        let paged = store.list(&EntryQuery::new().limit(2).offset(1)).unwrap();
        assert_eq!(paged.len(), 2);
        assert_eq!(paged[0].target().model, "article");
        assert_eq!(store.count(&EntryQuery::new().limit(1)).unwrap(), 4);
    }

    #[test]
    fn test_time_window() {
        let store = SqliteStore::in_memory().unwrap();
        for minute in [0, 10, 20] {
            store.insert(&entry("article", "1", Operation::Update, minute)).unwrap();
        }

        let query = EntryQuery {
            since: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 5, 0).unwrap()),
            until: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 15, 0).unwrap()),
            ..EntryQuery::new()
        };
        assert_eq!(store.count(&query).unwrap(), 1);
    }

    #[test]
    fn test_find_by_prefix() {
        let store = SqliteStore::in_memory().unwrap();
        let written = entry("article", "1", Operation::Create, 0);
        store.insert(&written).unwrap();

        let short = written.id().short();
        assert_eq!(store.find_by_prefix(&short).unwrap().id(), written.id());

        let err = store.find_by_prefix("log-ffffffffffff").unwrap_err();
        assert!(err.is_not_found());
        assert!(store.find_by_prefix("").unwrap_err().is_validation());
    }

    #[test]
    fn test_find_by_prefix_rejects_wildcards() {
        let store = SqliteStore::in_memory().unwrap();
        store.insert(&entry("article", "1", Operation::Create, 0)).unwrap();

        for pattern in ["_", "%", "log-%", "a_"] {
            let err = store.find_by_prefix(pattern).unwrap_err();
            assert!(err.is_validation(), "{} should be rejected", pattern);
        }
    }

    #[test]
    fn test_out_of_range_paging_is_validation_error() {
        let store = SqliteStore::in_memory().unwrap();
        store.insert(&entry("article", "1", Operation::Create, 0)).unwrap();

        let err = store.list(&EntryQuery::new().offset(usize::MAX)).unwrap_err();
        assert!(err.is_validation());
        let err = store.list(&EntryQuery::new().limit(usize::MAX)).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_non_finite_decimal_keeps_history_readable() {
        let store = SqliteStore::in_memory().unwrap();
        let changes = ChangeSet::new()
            .with("ratio", FieldChange::changed(FieldValue::Decimal(f64::NAN), 0.5));
        let target = TargetRef::new("gauge", "1");
        let written = EntryBuilder::new(Operation::Update, Actor::new("7"), target)
            .changes(changes)
            .build()
            .unwrap();
        store.write(&written).unwrap();
        store.insert(&entry("article", "1", Operation::Create, 0)).unwrap();

        let all = store.list(&EntryQuery::new()).unwrap();
        assert_eq!(all.len(), 2);
        let read = store.get(written.id()).unwrap().unwrap();
        assert_eq!(read.changes(), written.changes());
    }

    #[test]
    fn test_duplicate_id_is_persistence_error() {
        let store = SqliteStore::in_memory().unwrap();
        let written = entry("article", "1", Operation::Create, 0);
        store.write(&written).unwrap();

        let err = store.write(&written).unwrap_err();
        assert!(err.is_persistence());
    }

    #[test]
    fn test_reopen_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("oplog.db");
        let written = entry("article", "1", Operation::Create, 0);

        SqliteStore::open(&path).unwrap().insert(&written).unwrap();

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.count(&EntryQuery::new()).unwrap(), 1);
    }
}
