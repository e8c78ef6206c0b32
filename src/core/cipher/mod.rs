//! Encryptor capability.
//!
//! The orchestrator only ever sees [`Encryptor`]: encrypt or decrypt one
//! string under a named key. Backends:
//!
//! - **age**: x25519 identities from the project's [`KeyRing`], ASCII armor.
//! - **hex**: reversible stub for tests and benchmarks. Not encryption.
//!
//! `encryptor = "none"` in the config selects no backend at all, which leaves
//! every lifecycle hook inert.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::core::config::Config;
use crate::core::keys::KeyRing;
use crate::error::{ConfigError, Result};

mod age;
mod hex;

pub use self::age::AgeEncryptor;
pub use self::hex::HexEncryptor;

/// A cipher backend with per-call key selection.
///
/// Implementations resolve `key` on every call, so an unknown key name fails
/// the operation that uses it and nothing earlier.
pub trait Encryptor: Send + Sync {
    /// Encrypt `plaintext` under `key`. The result never carries the marker.
    ///
    /// # Errors
    ///
    /// Returns `KeyError` if `key` cannot be resolved, or `CipherError` if
    /// the backend fails.
    fn encrypt(&self, plaintext: &str, key: &str) -> Result<String>;

    /// Decrypt a marker-stripped `ciphertext` under `key`.
    ///
    /// # Errors
    ///
    /// Returns `KeyError` if `key` cannot be resolved, or `CipherError` if
    /// the ciphertext is not decryptable with it.
    fn decrypt(&self, ciphertext: &str, key: &str) -> Result<String>;

    /// Backend name for display.
    fn name(&self) -> &'static str;
}

/// Pick the encryptor named in `[fieldvault] encryptor`.
///
/// Returns `Ok(None)` for `"none"`.
///
/// # Errors
///
/// Returns `ConfigError::UnknownEncryptor` for any other unsupported name.
pub fn from_config(config: &Config, root: &Path) -> Result<Option<Arc<dyn Encryptor>>> {
    match config.encryptor() {
        "age" => {
            debug!("creating age encryptor");
            let keys = KeyRing::from_entries(root, &config.keys);
            Ok(Some(Arc::new(AgeEncryptor::new(keys))))
        }
        "none" => {
            debug!("no encryptor configured");
            Ok(None)
        }
        other => Err(ConfigError::UnknownEncryptor(other.to_string()).into()),
    }
}
