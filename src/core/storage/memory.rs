//! In-memory store.

use tracing::trace;

use super::{Row, RowId, Store, Tables};
use crate::error::{Result, StorageError};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    committed: Tables,
    working: Tables,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from already committed data.
    pub fn from_tables(tables: Tables) -> Self {
        Self {
            committed: tables.clone(),
            working: tables,
        }
    }

    /// Committed data only.
    pub fn committed(&self) -> &Tables {
        &self.committed
    }

    /// Committed row, ignoring anything staged.
    pub fn committed_row(&self, table: &str, id: RowId) -> Option<Row> {
        self.committed.get(table, id)
    }

    pub fn has_staged(&self) -> bool {
        self.committed != self.working
    }
}

impl Store for MemoryStore {
    fn rows_after(
        &self,
        table: &str,
        after: Option<RowId>,
        limit: usize,
    ) -> Result<Vec<(RowId, Row)>> {
        Ok(self.working.rows_after(table, after, limit))
    }

    fn get(&self, table: &str, id: RowId) -> Result<Option<Row>> {
        Ok(self.working.get(table, id))
    }

    fn count(&self, table: &str) -> Result<usize> {
        Ok(self.working.count(table))
    }

    fn insert(&mut self, table: &str, row: Row) -> Result<RowId> {
        let id = self.working.insert(table, row);
        trace!(table, id, "staged insert");
        Ok(id)
    }

    fn update(&mut self, table: &str, id: RowId, row: Row) -> Result<()> {
        if !self.working.update(table, id, row) {
            return Err(StorageError::MissingRow {
                table: table.to_string(),
                id,
            }
            .into());
        }
        trace!(table, id, "staged update");
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.committed = self.working.clone();
        Ok(())
    }

    fn rollback(&mut self) {
        self.working = self.committed.clone();
    }
}
