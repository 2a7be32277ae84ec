//! CLI commands for browsing the operation log
//!
//! `list`, `show` and `history` read the SQLite store through the history
//! service.

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use clap::Args;

use crate::audit::Operation;
use crate::config::Settings;
use crate::display::{format_entry_details, format_entry_page};
use crate::error::OplogResult;
use crate::services::{HistoryService, DEFAULT_PAGE_SIZE};
use crate::storage::{EntryQuery, SqliteStore};

/// Paging options shared by the listing commands
#[derive(Args, Debug, Clone)]
pub struct PageArgs {
    /// Page number, starting at 1
    #[arg(short, long, default_value_t = 1)]
    pub page: usize,

    /// Entries per page
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub per_page: usize,
}

/// Entry filters shared by `list` and `export`
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Only entries for this model
    #[arg(short, long)]
    pub model: Option<String>,

    /// Only entries for this object id (usually with --model)
    #[arg(short, long)]
    pub object: Option<String>,

    /// Only entries by this actor id
    #[arg(short, long)]
    pub actor: Option<String>,

    /// Only this kind of operation (create, update, delete)
    #[arg(long)]
    pub operation: Option<Operation>,

    /// Entries on or after this date (YYYY-MM-DD)
    #[arg(long)]
    pub since: Option<NaiveDate>,

    /// Entries on or before this date (YYYY-MM-DD)
    #[arg(long)]
    pub until: Option<NaiveDate>,
}

impl FilterArgs {
    pub fn to_query(&self) -> EntryQuery {
        EntryQuery {
            model: self.model.clone(),
            object_id: self.object.clone(),
            actor: self.actor.clone(),
            operation: self.operation,
            since: self
                .since
                .map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN))),
            until: self.until.and_then(|d| {
                d.and_hms_nano_opt(23, 59, 59, 999_999_999)
                    .map(|dt| Utc.from_utc_datetime(&dt))
            }),
            ..EntryQuery::default()
        }
    }
}

/// Arguments for `oplog list`
#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    #[command(flatten)]
    pub paging: PageArgs,
}

/// Handle `oplog list`
pub fn handle_list(store: &SqliteStore, args: ListArgs) -> OplogResult<()> {
    let service = HistoryService::new(store);
    let page = service.list(&args.filter.to_query(), args.paging.page, args.paging.per_page)?;
    println!("{}", format_entry_page(&page));
    Ok(())
}

/// Handle `oplog show <id>`
pub fn handle_show(store: &SqliteStore, settings: &Settings, id: &str) -> OplogResult<()> {
    let service = HistoryService::new(store);
    let entry = service.get(id)?;
    let model = settings.model(&entry.target().model);
    print!("{}", format_entry_details(&entry, model));
    Ok(())
}

/// Handle `oplog history <model> <object>`
pub fn handle_history(
    store: &SqliteStore,
    settings: &Settings,
    model: &str,
    object_id: &str,
    paging: PageArgs,
) -> OplogResult<()> {
    let service = HistoryService::new(store);
    let page = service.object_history(model, object_id, paging.page, paging.per_page)?;

    if page.is_empty() {
        println!("No history for {} {}.", model, object_id);
        return Ok(());
    }

    let model_settings = settings.model(model);
    println!("History of {} {} ({} entries)", model, object_id, page.total);
    for entry in &page.items {
        println!();
        print!("{}", format_entry_details(entry, model_settings));
    }
    if page.has_next() {
        println!();
        println!("More entries on page {}.", page.page + 1);
    }
    Ok(())
}
