//! Batch re-encryption of stored rows.
//!
//! Each page of rows is loaded through the session (decrypting what is
//! already sealed), forced through a write cycle (sealing legacy plaintext),
//! and evicted before the next page is read.

use tracing::{info, warn};

use crate::core::document::{Document, Schema};
use crate::core::orchestrator::Orchestrator;
use crate::core::session::Session;
use crate::core::storage::{RowId, Store};
use crate::error::{ConfigError, Result};

/// Outcome of sweeping one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableReport {
    pub table: String,
    /// Rows written back.
    pub rows: usize,
    /// Values sealed for the first time, or re-sealed after a change.
    pub encrypted: usize,
    /// Values that were already ciphertext.
    pub skipped: usize,
    /// Why the table stopped early. Rows reported above stay committed.
    pub error: Option<String>,
}

impl TableReport {
    fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            ..Self::default()
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Top-level tables holding at least one encrypted value.
pub fn encryptable_tables(schema: &Schema) -> Vec<String> {
    schema
        .tables()
        .filter(|(name, decl)| !decl.embeddable && schema.has_encrypted_fields(name))
        .map(|(name, _)| name.clone())
        .collect()
}

/// Sweep `tables` in pages of `batch_size` rows.
///
/// A failing table is reported and the sweep moves on. `progress` is called
/// once per table as its report is final.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` for a zero batch size and
/// `Error::EncryptorUnavailable` when the session has no encryptor.
pub fn run<S: Store>(
    session: &mut Session<S, Orchestrator>,
    tables: &[String],
    batch_size: usize,
    mut progress: impl FnMut(&TableReport),
) -> Result<Vec<TableReport>> {
    if batch_size == 0 {
        return Err(ConfigError::InvalidValue {
            field: "batch_size",
            reason: "must be greater than zero".to_string(),
        }
        .into());
    }
    session.listener().require_encryptor()?;

    let mut reports = Vec::with_capacity(tables.len());
    for table in tables {
        let mut report = TableReport::new(table);
        if let Err(err) = sweep_table(session, &mut report, batch_size) {
            warn!(table = %table, error = %err, "sweep failed");
            report.error = Some(err.to_string());
        }
        session.clear();
        info!(
            table = %table,
            rows = report.rows,
            encrypted = report.encrypted,
            skipped = report.skipped,
            "table swept"
        );
        progress(&report);
        reports.push(report);
    }
    Ok(reports)
}

fn sweep_table<S: Store>(
    session: &mut Session<S, Orchestrator>,
    report: &mut TableReport,
    batch_size: usize,
) -> Result<()> {
    let mut after: Option<RowId> = None;
    loop {
        session.listener_mut().reset_stats();
        let page = session.load_page(&report.table, after, batch_size)?;
        if page.is_empty() {
            return Ok(());
        }
        for id in &page {
            session.touch(*id);
        }
        session.flush()?;

        let stats = session.listener().stats();
        report.rows += page.len();
        report.encrypted += stats.encrypted;
        report.skipped += stats.reused;

        after = page
            .last()
            .and_then(|id| session.get(*id))
            .and_then(Document::id);
        session.clear();

        if page.len() < batch_size {
            return Ok(());
        }
    }
}
