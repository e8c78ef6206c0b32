//! Constants used throughout fieldvault.
//!
//! Centralizes magic strings and configuration defaults.

/// Trailing tag that marks a stored string as ciphertext.
pub const CIPHERTEXT_MARKER: &str = "<ENC>";

/// Configuration file name (.fieldvault.toml).
pub const CONFIG_FILE: &str = ".fieldvault.toml";

/// Key directory relative to the project root.
pub const KEY_DIR: &str = ".fieldvault/keys";

/// Name of the key generated by `fieldvault init`.
pub const DEFAULT_KEY_NAME: &str = "default";

/// Default record store file relative to the project root.
pub const DEFAULT_STORE_FILE: &str = "fieldvault.json";

/// Rows per flush during a re-encryption sweep.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Longest accepted key name.
pub const MAX_KEY_NAME_LEN: usize = 64;

/// Separator between segments of an embedded field path.
pub const PATH_SEPARATOR: char = '.';

/// Gitignore entries that keep key material out of version control.
pub const GITIGNORE_ENTRIES: &[&str] = &[".fieldvault/keys/"];
