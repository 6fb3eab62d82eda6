//! Fetched rows.

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use super::Value;

/// One fetched row, decoded column by column.
///
/// `id` is a process-local synthetic identifier (never persisted) so that
/// callers can track selections across re-fetches of otherwise identical
/// rows. `row_id` is the storage engine's rowid, captured by the fetch query;
/// it is the fallback addressing key for tables without a declared primary
/// key, so callers must carry it when mutating such tables.
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    /// Synthetic process-local identifier.
    pub id: Uuid,
    /// The engine rowid, when the backing query requested it.
    pub row_id: Option<i64>,
    /// Decoded values keyed by column name.
    pub values: HashMap<String, Value>,
}

impl Record {
    /// Creates a record with a fresh synthetic id.
    #[must_use]
    pub fn new(row_id: Option<i64>, values: HashMap<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            row_id,
            values,
        }
    }
}

// Identity follows the synthetic id, not the row contents.
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Record {}

impl std::hash::Hash for Record {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
