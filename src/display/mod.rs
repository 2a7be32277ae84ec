//! Display formatting for terminal output
//!
//! Table and detail views of log entries.

pub mod entry;

pub use entry::{
    describe_changes, describe_entry, format_entry_details, format_entry_list, format_entry_page,
    render_value,
};
