//! Command-line interface.

pub mod encrypt;
pub mod init;
pub mod keys;
pub mod output;
pub mod show;
pub mod status;

use std::path::Path;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::core::cipher;
use crate::core::config::Config;
use crate::core::metadata::MetadataCache;
use crate::core::orchestrator::Orchestrator;
use crate::core::session::Session;
use crate::core::storage::JsonStore;

/// Fieldvault - transparent field-level encryption for persisted records.
#[derive(Parser)]
#[command(
    name = "fieldvault",
    about = "Transparent field-level encryption for persisted records",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Command {
    /// Initialize fieldvault in the current directory
    Init,

    /// Generate a new key file
    CreateKey {
        /// Register the key under this name in .fieldvault.toml
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Encrypt every declared field of every stored row
    EncryptDatabase {
        /// Rows per write cycle (defaults to [fieldvault] batch_size)
        batch_size: Option<usize>,
        /// Only sweep this table (repeatable)
        #[arg(short, long = "table")]
        tables: Vec<String>,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Print the decrypted rows of a table
    Show {
        /// Table name
        table: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show quick status overview
    Status,
}

/// Execute a command.
pub fn execute(command: Command) -> crate::error::Result<()> {
    use Command::*;

    match command {
        Init => init::execute(),
        CreateKey { name } => keys::create(name),
        EncryptDatabase {
            batch_size,
            tables,
            yes,
        } => encrypt::execute(batch_size, tables, yes),
        Show { table, json } => show::execute(&table, json),
        Status => status::execute(),
    }
}

/// Session over the project's record store with the configured encryptor.
pub(crate) fn open_session(
    root: &Path,
    config: &Config,
) -> crate::error::Result<Session<JsonStore, Orchestrator>> {
    let store = JsonStore::open(config.store_path(root))?;
    let encryptor = cipher::from_config(config, root)?;
    let orchestrator = Orchestrator::new(Arc::new(MetadataCache::new()), encryptor);
    Ok(Session::new(store, orchestrator, config.schema()))
}
