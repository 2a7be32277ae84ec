//! History service
//!
//! Read side of the operation log: paginated listings, single entries and
//! the change history of one object.

use serde::Serialize;

use crate::audit::OperationLogEntry;
use crate::error::{OplogError, OplogResult};
use crate::storage::{EntryQuery, SqliteStore};

/// Default number of entries per page
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Matching entries across all pages
    pub total: usize,
    /// 1-based page number
    pub page: usize,
    pub per_page: usize,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> usize {
        if self.per_page == 0 {
            return 0;
        }
        self.total.div_ceil(self.per_page)
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Service for browsing logged operations
pub struct HistoryService<'a> {
    store: &'a SqliteStore,
}

impl<'a> HistoryService<'a> {
    pub fn new(store: &'a SqliteStore) -> Self {
        Self { store }
    }

    /// One page of entries matching `filter`, newest first
    ///
    /// Paging fields already set on `filter` are ignored.
    pub fn list(
        &self,
        filter: &EntryQuery,
        page: usize,
        per_page: usize,
    ) -> OplogResult<Page<OperationLogEntry>> {
        if page == 0 {
            return Err(OplogError::Validation("Page numbers start at 1".into()));
        }
        if per_page == 0 {
            return Err(OplogError::Validation("Page size must be positive".into()));
        }

        let offset = (page - 1)
            .checked_mul(per_page)
            .ok_or_else(|| OplogError::Validation(format!("Page {} is out of range", page)))?;
        let query = EntryQuery {
            limit: Some(per_page),
            offset,
            ..filter.clone()
        };

        Ok(Page {
            items: self.store.list(&query)?,
            total: self.store.count(filter)?,
            page,
            per_page,
        })
    }

    /// Fetch one entry by full id or unique prefix
    pub fn get(&self, id: &str) -> OplogResult<OperationLogEntry> {
        match id.parse() {
            Ok(full) => self
                .store
                .get(full)?
                .ok_or_else(|| OplogError::entry_not_found(id)),
            Err(_) => self.store.find_by_prefix(id),
        }
    }

    /// Every entry for one object, newest first
    pub fn object_history(
        &self,
        model: &str,
        object_id: &str,
        page: usize,
        per_page: usize,
    ) -> OplogResult<Page<OperationLogEntry>> {
        self.list(&EntryQuery::for_object(model, object_id), page, per_page)
    }

    /// The most recent entry for an object, if any
    pub fn latest_for_object(
        &self,
        model: &str,
        object_id: &str,
    ) -> OplogResult<Option<OperationLogEntry>> {
        let mut entries = self
            .store
            .list(&EntryQuery::for_object(model, object_id).limit(1))?;
        Ok(entries.pop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{EntryBuilder, Operation, Sink};
    use crate::models::{Actor, TargetRef};
    use chrono::{Duration, TimeZone, Utc};

    fn seeded_store() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        for i in 0..25i64 {
            let object_id = if i % 5 == 0 { "1" } else { "2" };
            let operation = if i == 0 { Operation::Create } else { Operation::Update };
            let target = TargetRef::new("article", object_id);
            let entry = EntryBuilder::new(operation, Actor::new("7"), target)
                .at(start + Duration::minutes(i))
                .build()
                .unwrap();
            store.write(&entry).unwrap();
        }
        store
    }

    #[test]
    fn test_list_paginates() {
        let store = seeded_store();
        let service = HistoryService::new(&store);

        let first = service.list(&EntryQuery::new(), 1, 10).unwrap();
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.total, 25);
        assert_eq!(first.total_pages(), 3);
        assert!(first.has_next());

        let last = service.list(&EntryQuery::new(), 3, 10).unwrap();
        assert_eq!(last.items.len(), 5);
        assert!(!last.has_next());
        assert!(last.items[0].timestamp() > last.items[4].timestamp());
    }

    #[test]
    fn test_invalid_paging() {
        let store = seeded_store();
        let service = HistoryService::new(&store);
        assert!(service.list(&EntryQuery::new(), 0, 10).unwrap_err().is_validation());
        assert!(service.list(&EntryQuery::new(), 1, 0).unwrap_err().is_validation());
    }

    #[test]
    fn test_huge_page_number_is_rejected() {
        let store = seeded_store();
        let service = HistoryService::new(&store);

        let err = service.list(&EntryQuery::new(), usize::MAX, 2).unwrap_err();
        assert!(err.is_validation());
        // fits usize but not an SQLite integer
        let page = i64::MAX as usize + 2;
        let err = service.list(&EntryQuery::new(), page, 1).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_object_history() {
        let store = seeded_store();
        let service = HistoryService::new(&store);

        let history = service.object_history("article", "1", 1, DEFAULT_PAGE_SIZE).unwrap();
        assert_eq!(history.total, 5);
        assert_eq!(history.items.last().unwrap().operation(), Operation::Create);

        let latest = service.latest_for_object("article", "1").unwrap().unwrap();
        assert_eq!(latest.id(), history.items[0].id());
        assert!(service.latest_for_object("article", "99").unwrap().is_none());
    }

    #[test]
    fn test_get_by_full_and_short_id() {
        let store = seeded_store();
        let service = HistoryService::new(&store);
        let entry = service.list(&EntryQuery::new(), 1, 1).unwrap().items.remove(0);

        assert_eq!(service.get(&entry.id().to_string()).unwrap().id(), entry.id());
        assert_eq!(service.get(&entry.id().short()).unwrap().id(), entry.id());

        let missing = crate::models::EntryId::new().to_string();
        assert!(service.get(&missing).unwrap_err().is_not_found());
    }
}
