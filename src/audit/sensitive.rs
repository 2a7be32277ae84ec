//! Masking of credential-like fields before an entry is built

use std::collections::BTreeSet;

use super::changes::ChangeSet;
use crate::models::{FieldValue, FIELD_SEPARATOR};

/// Replacement stored instead of a sensitive value
pub const CLEANED_SUBSTITUTE: &str = "********************";

/// Field names always treated as sensitive
const DEFAULT_SENSITIVE: [&str; 6] = ["api", "token", "key", "secret", "password", "signature"];

/// Case-insensitive set of field names whose values are masked
#[derive(Debug, Clone)]
pub struct SensitiveFields {
    names: BTreeSet<String>,
}

impl SensitiveFields {
    /// Built-in names plus any extra configured ones
    pub fn new<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = DEFAULT_SENSITIVE
            .iter()
            .map(|s| s.to_string())
            .chain(extra.into_iter().map(|s| s.as_ref().to_lowercase()))
            .collect();
        Self { names }
    }

    /// Matches on the last segment of a nested path
    pub fn is_sensitive(&self, field: &str) -> bool {
        let leaf = field.rsplit(FIELD_SEPARATOR).next().unwrap_or(field);
        self.names.contains(&leaf.to_lowercase())
    }

    /// Replace both sides of every sensitive change with the substitute
    ///
    /// A field present on both sides ends up with equal sides, which reads as
    /// "changed, value hidden".
    pub fn mask(&self, changes: &mut ChangeSet) {
        for (field, change) in changes.iter_mut() {
            if !self.is_sensitive(field) {
                continue;
            }
            let masked = || Some(FieldValue::Text(CLEANED_SUBSTITUTE.to_string()));
            if change.old.is_some() {
                change.old = masked();
            }
            if change.new.is_some() {
                change.new = masked();
            }
        }
    }
}

impl Default for SensitiveFields {
    fn default() -> Self {
        Self::new(std::iter::empty::<&str>())
    }
}
