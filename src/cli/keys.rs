//! Create-key command.

use std::path::Path;

use tracing::info;

use crate::cli::output;
use crate::core::config::Config;
use crate::core::constants;
use crate::core::keys::KeyRing;
use crate::core::metadata::validate_key_name;
use crate::error::{ConfigError, Result};

/// Generate a timestamped key file, optionally registering it as `name`.
pub fn create(name: Option<String>) -> Result<()> {
    let root = Path::new(".");
    let mut config = Config::load_from(root)?;

    if let Some(name) = &name {
        validate_key_name(name)
            .map_err(|reason| ConfigError::InvalidValue { field: "name", reason })?;
        if config.keys.contains_key(name) {
            return Err(ConfigError::InvalidValue {
                field: "name",
                reason: format!("key '{}' is already registered", name),
            }
            .into());
        }
    }

    let (path, public) = KeyRing::generate(Path::new(constants::KEY_DIR))?;
    let shown = path.display().to_string();
    info!(path = %shown, "created key");

    output::success(&format!("created {}", output::path(&shown)));
    output::kv("public key", &public);

    match name {
        Some(name) => {
            config.keys.insert(name.clone(), shown);
            config.save(root)?;
            output::success(&format!("registered as {}", output::key(&name)));
        }
        None => output::hint("register it under [keys] in .fieldvault.toml, or pass --name"),
    }
    Ok(())
}
