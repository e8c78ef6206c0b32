//! JSON file store.
//!
//! The whole store is one JSON document, rewritten on every commit through a
//! temp file in the same directory and an atomic rename.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{MemoryStore, Row, RowId, Store, Tables};
use crate::error::{Result, StorageError};

#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl JsonStore {
    /// Open the store at `path`. A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Read` or `StorageError::Parse` if the file
    /// exists but cannot be loaded.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let tables = Self::read(&path)?;
        debug!(path = %path.display(), "opened store");
        Ok(Self {
            path,
            inner: MemoryStore::from_tables(tables),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(path: &Path) -> Result<Tables> {
        if !path.exists() {
            return Ok(Tables::default());
        }
        let file = File::open(path).map_err(StorageError::Read)?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| StorageError::Parse(e).into())
    }

    fn write_atomic(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(StorageError::Write)?;

        let temp = tempfile::NamedTempFile::new_in(&dir).map_err(StorageError::Write)?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            serde_json::to_writer_pretty(&mut writer, self.inner.committed())
                .map_err(StorageError::Serialize)?;
            writer.flush().map_err(StorageError::Write)?;
        }
        temp.as_file().sync_all().map_err(StorageError::Write)?;
        temp.persist(&self.path)
            .map_err(|e| StorageError::Write(e.error))?;

        debug!(path = %self.path.display(), "store written");
        Ok(())
    }
}

impl Store for JsonStore {
    fn rows_after(
        &self,
        table: &str,
        after: Option<RowId>,
        limit: usize,
    ) -> Result<Vec<(RowId, Row)>> {
        self.inner.rows_after(table, after, limit)
    }

    fn get(&self, table: &str, id: RowId) -> Result<Option<Row>> {
        self.inner.get(table, id)
    }

    fn count(&self, table: &str) -> Result<usize> {
        self.inner.count(table)
    }

    fn insert(&mut self, table: &str, row: Row) -> Result<RowId> {
        self.inner.insert(table, row)
    }

    fn update(&mut self, table: &str, id: RowId, row: Row) -> Result<()> {
        self.inner.update(table, id, row)
    }

    fn commit(&mut self) -> Result<()> {
        if !self.inner.has_staged() && self.path.exists() {
            return Ok(());
        }
        self.inner.commit()?;
        if let Err(e) = self.write_atomic() {
            self.inner = MemoryStore::from_tables(Self::read(&self.path)?);
            return Err(e);
        }
        Ok(())
    }

    fn rollback(&mut self) {
        self.inner.rollback();
    }
}
