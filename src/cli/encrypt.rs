//! Encrypt-database command - seal every declared field of stored rows.

use std::io::{self, IsTerminal};
use std::path::Path;

use dialoguer::Confirm;

use crate::cli::{open_session, output};
use crate::core::config::Config;
use crate::core::sweep::{self, TableReport};
use crate::error::{Error, Result};

pub fn execute(batch_size: Option<usize>, tables: Vec<String>, yes: bool) -> Result<()> {
    let root = Path::new(".");
    let config = Config::load_from(root)?;
    let mut session = open_session(root, &config)?;
    session.listener().require_encryptor()?;

    let tables = if tables.is_empty() {
        sweep::encryptable_tables(session.schema())
    } else {
        tables
    };
    if tables.is_empty() {
        output::dimmed("no tables with encrypted fields");
        return Ok(());
    }

    let batch_size = batch_size.unwrap_or(config.fieldvault.batch_size);
    if !yes && io::stdin().is_terminal() && !confirm(&tables)? {
        output::dimmed("aborted");
        return Ok(());
    }

    let reports = sweep::run(&mut session, &tables, batch_size, print_report)?;

    let encrypted: usize = reports.iter().map(|r| r.encrypted).sum();
    println!();
    println!("values encrypted: {}", encrypted);

    let failed = reports.iter().filter(|r| !r.succeeded()).count();
    if failed > 0 {
        return Err(Error::SweepFailed(failed));
    }
    Ok(())
}

fn confirm(tables: &[String]) -> Result<bool> {
    println!("The following tables will be rewritten:");
    for table in tables {
        output::list_item(table);
    }
    println!();

    Confirm::new()
        .with_prompt("Encrypt all declared fields?")
        .default(false)
        .interact()
        .map_err(Into::into)
}

fn print_report(report: &TableReport) {
    match &report.error {
        None => output::success(&format!(
            "{}: {} rows, {} encrypted, {} already encrypted",
            output::key(&report.table),
            report.rows,
            report.encrypted,
            report.skipped
        )),
        Some(err) => output::error(&format!("{}: {}", output::key(&report.table), err)),
    }
}
