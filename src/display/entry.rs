//! Log entry display formatting
//!
//! Formats entries for terminal output in table and detail views. Field
//! labels, choice labels and boolean wording come from the model's settings
//! and are applied here, at display time; stored values stay raw.

use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::audit::{ChangeSet, FieldChange, OperationLogEntry};
use crate::config::ModelSettings;
use crate::models::FieldValue;
use crate::services::Page;

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Time (UTC)")]
    time: String,
    #[tabled(rename = "Actor")]
    actor: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Object")]
    object: String,
    #[tabled(rename = "Changes")]
    changes: String,
}

impl From<&OperationLogEntry> for EntryRow {
    fn from(entry: &OperationLogEntry) -> Self {
        let target = entry.target();
        let object = match &target.repr {
            Some(repr) => format!("{} {} ({})", target.model, target.object_id, truncate(repr, 24)),
            None => format!("{} {}", target.model, target.object_id),
        };
        let changes = match entry.changes().len() {
            0 => "-".to_string(),
            1 => "1 field".to_string(),
            n => format!("{} fields", n),
        };

        Self {
            id: entry.id().short(),
            time: entry.timestamp().format("%Y-%m-%d %H:%M:%S").to_string(),
            actor: entry.actor().label().to_string(),
            action: entry.action_name().to_string(),
            object,
            changes,
        }
    }
}

/// Format entries as a table
pub fn format_entry_list(entries: &[OperationLogEntry]) -> String {
    if entries.is_empty() {
        return "No log entries found.".to_string();
    }

    let rows: Vec<EntryRow> = entries.iter().map(EntryRow::from).collect();
    Table::new(rows).with(Style::psql()).to_string()
}

/// Format one page of entries with a position footer
pub fn format_entry_page(page: &Page<OperationLogEntry>) -> String {
    let mut output = format_entry_list(&page.items);
    if !page.is_empty() {
        output.push_str(&format!(
            "\n\nPage {} of {} ({} entries)",
            page.page,
            page.total_pages(),
            page.total
        ));
    }
    output
}

/// Format one entry with its labelled change messages
pub fn format_entry_details(entry: &OperationLogEntry, model: Option<&ModelSettings>) -> String {
    let mut output = String::new();
    let target = entry.target();

    output.push_str(&format!("Entry:    {}\n", entry.id()));
    output.push_str(&format!(
        "Time:     {}\n",
        entry.timestamp().format("%Y-%m-%d %H:%M:%S UTC")
    ));
    output.push_str(&format!("Actor:    {}\n", entry.actor()));
    output.push_str(&format!(
        "Action:   {} ({}, flag {})\n",
        entry.action_name(),
        entry.action(),
        entry.operation().flag()
    ));
    output.push_str(&format!("Model:    {}\n", target.model));
    output.push_str(&format!("Object:   {}\n", target.object_id));
    if let Some(repr) = &target.repr {
        output.push_str(&format!("Repr:     {}\n", repr));
    }
    if let Some(context) = entry.context() {
        output.push_str(&format!("Context:  {}\n", context));
    }

    output.push_str("\nChanges:\n");
    for message in describe_entry(entry, model) {
        output.push_str(&format!("  {}\n", message));
    }

    output
}

/// Human-readable message per changed field
///
/// Returns a single "No fields changed." message for an empty change set.
pub fn describe_entry(entry: &OperationLogEntry, model: Option<&ModelSettings>) -> Vec<String> {
    describe_changes(entry.changes(), model)
}

pub fn describe_changes(changes: &ChangeSet, model: Option<&ModelSettings>) -> Vec<String> {
    if changes.is_empty() {
        return vec!["No fields changed.".to_string()];
    }

    changes
        .iter()
        .map(|(field, change)| describe_field(field, change, model))
        .collect()
}

fn describe_field(field: &str, change: &FieldChange, model: Option<&ModelSettings>) -> String {
    let label = model.map_or(field, |m| m.label(field));
    let render = |value: &FieldValue| render_value(field, value, model);

    if change.is_hidden() {
        return format!("Changed {} (value hidden)", label);
    }

    match (&change.old, &change.new) {
        (None, Some(new)) => format!("Added {}: {}", label, render(new)),
        (Some(old), None) => format!("Removed {}: {}", label, render(old)),
        (Some(old), Some(new)) => {
            format!("Changed {}: {} -> {}", label, render(old), render(new))
        }
        (None, None) => format!("Changed {}", label),
    }
}

/// Display form of a value, applying choice labels and boolean wording
pub fn render_value(field: &str, value: &FieldValue, model: Option<&ModelSettings>) -> String {
    let choice_key = match value {
        FieldValue::Text(s) => Some(s.clone()),
        FieldValue::Integer(i) => Some(i.to_string()),
        FieldValue::Unsigned(u) => Some(u.to_string()),
        FieldValue::Bool(b) => Some(b.to_string()),
        _ => None,
    };

    let choice = model
        .and_then(|m| m.choices.get(field))
        .zip(choice_key)
        .and_then(|(choices, key)| choices.get(&key));
    if let Some(label) = choice {
        return format!("\"{}\"", label);
    }

    match value {
        FieldValue::Bool(true) => "Yes".to_string(),
        FieldValue::Bool(false) => "No".to_string(),
        FieldValue::Null => "(empty)".to_string(),
        other => other.to_string(),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
