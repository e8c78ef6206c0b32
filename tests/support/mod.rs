//! Test support utilities for fieldvault integration tests.
//!
//! Provides isolated project directories, CLI helpers and fixture records.

#![allow(dead_code)]

pub mod assertions;
pub mod commands;
pub mod fixtures;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;

use std::fs;
use std::path::PathBuf;

use fieldvault::core::config::Config;
use fieldvault::core::storage::{JsonStore, Row, Store};
use tempfile::TempDir;

/// Test environment with an isolated project directory.
///
/// Child processes use `.current_dir()`, so tests can run in parallel.
pub struct Test {
    pub dir: TempDir,
}

impl Test {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        Self { dir }
    }

    /// Project initialized with `fieldvault init`.
    pub fn init() -> Self {
        let t = Self::new();
        let output = t.init_cmd();
        assert!(
            output.status.success(),
            "Failed to initialize: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        t
    }

    /// Initialized project with [`USER_TABLES`] declared.
    pub fn with_tables() -> Self {
        let t = Self::init();
        t.append_config(USER_TABLES);
        t
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn append_config(&self, toml: &str) {
        let path = self.path(".fieldvault.toml");
        let mut contents = fs::read_to_string(&path).expect("failed to read config");
        contents.push('\n');
        contents.push_str(toml);
        fs::write(&path, contents).expect("failed to write config");
    }

    pub fn config(&self) -> Config {
        Config::load_from(self.dir.path()).expect("failed to load config")
    }

    pub fn store(&self) -> JsonStore {
        JsonStore::open(self.config().store_path(self.dir.path())).expect("failed to open store")
    }

    /// Write raw rows straight into the store, bypassing encryption.
    pub fn seed(&self, table: &str, rows: &[&[(&str, &str)]]) {
        let mut store = self.store();
        for columns in rows {
            store.insert(table, row(columns)).expect("failed to stage row");
        }
        store.commit().expect("failed to commit seed rows");
    }

    /// Committed value of one column.
    pub fn stored(&self, table: &str, id: u64, column: &str) -> Option<String> {
        self.store()
            .get(table, id)
            .expect("failed to read store")
            .and_then(|row| row.get(column).cloned().flatten())
    }
}

pub fn row(columns: &[(&str, &str)]) -> Row {
    columns
        .iter()
        .map(|(k, v)| (k.to_string(), Some(v.to_string())))
        .collect()
}
