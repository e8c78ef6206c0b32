//! Init command - create `.fieldvault.toml` and the default key.

use std::path::Path;

use tracing::info;

use crate::cli::output;
use crate::core::config::{self, Config};
use crate::core::constants;
use crate::core::keys::KeyRing;
use crate::error::{ConfigError, Result};

/// Initialize fieldvault in the current directory.
pub fn execute() -> Result<()> {
    init_at(Path::new("."))
}

fn init_at(root: &Path) -> Result<()> {
    if Config::exists(root) {
        return Err(ConfigError::AlreadyInitialized.into());
    }

    let config = Config::new();
    let ring = KeyRing::from_entries(root, &config.keys);
    let key_path = ring.path_of(constants::DEFAULT_KEY_NAME)?;

    if key_path.exists() {
        output::warn(&format!(
            "reusing existing key {}",
            output::path(&key_path.display().to_string())
        ));
    } else {
        let public = KeyRing::generate_at(&key_path)?;
        output::kv("public key", &public);
    }

    config.save(root)?;
    config::ensure_gitignore(root)?;
    info!(root = %root.display(), "initialized");

    output::success(&format!("initialized {}", constants::CONFIG_FILE));
    output::hint(&format!(
        "declare tables under [tables], then run: {}",
        output::cmd("fieldvault encrypt-database")
    ));
    Ok(())
}
