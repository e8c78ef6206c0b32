//! Record storage behind the reference session.
//!
//! A [`Store`] holds rows per table. Writes are staged until
//! [`Store::commit`]; [`Store::rollback`] discards them. Reads see staged
//! writes, like reads inside an open transaction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

mod json;
mod memory;

pub use json::JsonStore;
pub use memory::MemoryStore;

/// Primary key of a row within its table. Assigned by the store, from 1.
pub type RowId = u64;

/// Column name to value. Embedded values use dotted column names.
pub type Row = BTreeMap<String, Option<String>>;

pub trait Store {
    /// Up to `limit` rows with ids greater than `after`, in id order.
    fn rows_after(&self, table: &str, after: Option<RowId>, limit: usize)
        -> Result<Vec<(RowId, Row)>>;

    fn get(&self, table: &str, id: RowId) -> Result<Option<Row>>;

    fn count(&self, table: &str) -> Result<usize>;

    /// Stage a new row and return its id.
    fn insert(&mut self, table: &str, row: Row) -> Result<RowId>;

    /// Stage a replacement for an existing row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::MissingRow` if `id` does not exist.
    fn update(&mut self, table: &str, id: RowId, row: Row) -> Result<()>;

    /// Make staged writes durable.
    fn commit(&mut self) -> Result<()>;

    /// Discard staged writes.
    fn rollback(&mut self);
}

/// Serialized form of all tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tables {
    #[serde(default)]
    tables: BTreeMap<String, TableRows>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct TableRows {
    last_id: RowId,
    rows: BTreeMap<RowId, Row>,
}

impl Tables {
    fn rows_after(&self, table: &str, after: Option<RowId>, limit: usize) -> Vec<(RowId, Row)> {
        let Some(t) = self.tables.get(table) else {
            return Vec::new();
        };
        let start = after.map_or(0, |a| a.saturating_add(1));
        t.rows
            .range(start..)
            .take(limit)
            .map(|(id, row)| (*id, row.clone()))
            .collect()
    }

    fn get(&self, table: &str, id: RowId) -> Option<Row> {
        self.tables.get(table).and_then(|t| t.rows.get(&id)).cloned()
    }

    fn count(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, |t| t.rows.len())
    }

    fn insert(&mut self, table: &str, row: Row) -> RowId {
        let t = self.tables.entry(table.to_string()).or_default();
        t.last_id += 1;
        t.rows.insert(t.last_id, row);
        t.last_id
    }

    fn update(&mut self, table: &str, id: RowId, row: Row) -> bool {
        match self.tables.get_mut(table).and_then(|t| t.rows.get_mut(&id)) {
            Some(existing) => {
                *existing = row;
                true
            }
            None => false,
        }
    }
}
