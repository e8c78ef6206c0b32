//! Quick status overview command.

use std::path::Path;

use crate::cli::output;
use crate::core::config::Config;
use crate::core::keys::KeyRing;
use crate::core::storage::{JsonStore, Store};
use crate::core::sweep;
use crate::error::Result;

/// Show encryptor, keys and encrypted tables.
pub fn execute() -> Result<()> {
    let root = Path::new(".");
    let config = Config::load_from(root)?;

    output::section("Fieldvault Status");
    output::kv("encryptor", config.encryptor());
    output::kv("store", output::path(&config.fieldvault.store));
    output::kv("batch size", config.fieldvault.batch_size);

    output::section("Keys");
    let ring = KeyRing::from_entries(root, &config.keys);
    if ring.is_empty() {
        output::dimmed("no keys registered");
    }
    for name in ring.names() {
        let line = match ring.fingerprint(name) {
            Ok(fingerprint) => format!("{}  {}", output::key(name), fingerprint),
            Err(e) => format!("{}  unavailable ({})", output::key(name), e),
        };
        output::list_item(&line);
    }

    output::section("Tables");
    let schema = config.schema();
    let tables = sweep::encryptable_tables(&schema);
    if tables.is_empty() {
        output::dimmed("no tables with encrypted fields");
        return Ok(());
    }
    let store = JsonStore::open(config.store_path(root))?;
    for table in &tables {
        let rows = store.count(table)?;
        output::list_item(&format!(
            "{} ({} row{}): {}",
            output::key(table),
            rows,
            if rows == 1 { "" } else { "s" },
            schema.encrypted_columns(table).join(", ")
        ));
    }
    Ok(())
}
