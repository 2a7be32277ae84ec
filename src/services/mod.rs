//! Service layer for oplog
//!
//! Query logic on top of the storage layer.

pub mod history;

pub use history::{HistoryService, Page, DEFAULT_PAGE_SIZE};
