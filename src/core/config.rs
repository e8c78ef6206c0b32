//! Configuration file management.
//!
//! Handles reading, writing, and validating `.fieldvault.toml`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::constants;
use crate::core::document::Schema;
use crate::core::metadata::validate_key_name;
use crate::core::types::{FieldName, KeyName, TableName};
use crate::error::{ConfigError, MetadataError, Result};

/// Project configuration stored in `.fieldvault.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub fieldvault: Meta,
    /// Key name to key file, relative to the project root.
    #[serde(default)]
    pub keys: BTreeMap<KeyName, String>,
    /// Record tables and their encryption declarations.
    #[serde(default)]
    pub tables: BTreeMap<TableName, TableConfig>,
}

/// The `[fieldvault]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    pub version: String,
    /// "age" or "none"
    #[serde(default = "default_encryptor")]
    pub encryptor: String,
    /// Record store file, relative to the project root.
    #[serde(default = "default_store")]
    pub store: String,
    /// Rows per flush in `encrypt-database`.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

/// One `[tables.<name>]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Only usable as an embedded sub-record, never stored on its own.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub embeddable: bool,
    /// Encrypted field to key name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub encrypted: BTreeMap<FieldName, KeyName>,
    /// Embedded field to the embeddable table describing it.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub embedded: BTreeMap<FieldName, TableName>,
}

fn default_encryptor() -> String {
    "age".to_string()
}

fn default_store() -> String {
    constants::DEFAULT_STORE_FILE.to_string()
}

fn default_batch_size() -> usize {
    constants::DEFAULT_BATCH_SIZE
}

impl Config {
    /// Create a new configuration with the default key registered.
    pub fn new() -> Self {
        let mut keys = BTreeMap::new();
        keys.insert(
            constants::DEFAULT_KEY_NAME.to_string(),
            format!("{}/{}.key", constants::KEY_DIR, constants::DEFAULT_KEY_NAME),
        );
        Self {
            fieldvault: Meta {
                version: env!("CARGO_PKG_VERSION").to_string(),
                encryptor: default_encryptor(),
                store: default_store(),
                batch_size: default_batch_size(),
            },
            keys,
            tables: BTreeMap::new(),
        }
    }

    /// Path to the configuration file under `root`
    pub fn config_path(root: &Path) -> PathBuf {
        root.join(constants::CONFIG_FILE)
    }

    pub fn exists(root: &Path) -> bool {
        Self::config_path(root).exists()
    }

    /// Load configuration from `.fieldvault.toml` in the current directory
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Load configuration from `.fieldvault.toml` under `root`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotInitialized` if the file doesn't exist,
    /// `ConfigError::Parse` if the TOML is malformed, or any validation error.
    pub fn load_from(root: &Path) -> Result<Self> {
        let path = Self::config_path(root);
        debug!(path = %path.display(), "loading config");

        if !path.exists() {
            return Err(ConfigError::NotInitialized.into());
        }
        let contents = std::fs::read_to_string(&path).map_err(ConfigError::ReadFile)?;
        let config: Self = toml::from_str(&contents).map_err(ConfigError::Parse)?;

        debug!(
            keys = config.keys.len(),
            tables = config.tables.len(),
            "config loaded"
        );

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `.fieldvault.toml` under `root`
    pub fn save(&self, root: &Path) -> Result<()> {
        debug!("saving config");

        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(Self::config_path(root), contents)?;

        Ok(())
    }

    pub fn encryptor(&self) -> &str {
        &self.fieldvault.encryptor
    }

    /// Absolute path of the record store.
    pub fn store_path(&self, root: &Path) -> PathBuf {
        root.join(&self.fieldvault.store)
    }

    /// Table declarations as a shareable schema.
    pub fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(self.tables.clone()))
    }

    /// Validate the configuration structure and contents
    ///
    /// Checks:
    /// - Version field is semver-like
    /// - Encryptor is supported and batch size is positive
    /// - Key names are well-formed
    /// - Field names are non-empty, dot-free and declared once per table
    /// - Embedded targets exist, are embeddable and do not embed each other
    ///   in a loop
    ///
    /// Whether key files exist is not checked here.
    pub fn validate(&self) -> Result<()> {
        debug!("validating config");

        if self.fieldvault.version.is_empty() {
            return Err(ConfigError::MissingField { field: "version" }.into());
        }
        if self.fieldvault.version.split('.').count() < 2 {
            return Err(ConfigError::InvalidValue {
                field: "version",
                reason: format!("not a valid semver: {}", self.fieldvault.version),
            }
            .into());
        }

        match self.encryptor() {
            "age" | "none" => {}
            other => return Err(ConfigError::UnknownEncryptor(other.to_string()).into()),
        }

        if self.fieldvault.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "batch_size",
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }

        for name in self.keys.keys() {
            validate_key_name(name).map_err(|reason| ConfigError::InvalidValue {
                field: "keys",
                reason: format!("'{}': {}", name, reason),
            })?;
        }

        for (table, decl) in &self.tables {
            validate_table(table, decl)?;
            for target in decl.embedded.values() {
                match self.tables.get(target) {
                    None => return Err(ConfigError::UnknownTable(target.clone()).into()),
                    Some(t) if !t.embeddable => {
                        return Err(ConfigError::InvalidValue {
                            field: "tables",
                            reason: format!(
                                "{} embeds '{}', which is not embeddable",
                                table, target
                            ),
                        }
                        .into())
                    }
                    Some(_) => {}
                }
            }
        }

        for table in self.tables.keys() {
            self.check_acyclic(table, &mut BTreeSet::new())?;
        }

        Ok(())
    }

    fn check_acyclic<'a>(&'a self, table: &'a str, path: &mut BTreeSet<&'a str>) -> Result<()> {
        if !path.insert(table) {
            return Err(ConfigError::InvalidValue {
                field: "tables",
                reason: format!("'{}' embeds itself", table),
            }
            .into());
        }
        if let Some(decl) = self.tables.get(table) {
            for target in decl.embedded.values() {
                self.check_acyclic(target, path)?;
            }
        }
        path.remove(table);
        Ok(())
    }
}

fn validate_table(table: &str, decl: &TableConfig) -> Result<()> {
    for field in decl.encrypted.keys().chain(decl.embedded.keys()) {
        if field.is_empty() {
            return Err(MetadataError::EmptyFieldName {
                entity: table.to_string(),
            }
            .into());
        }
        if field.contains(constants::PATH_SEPARATOR) {
            return Err(MetadataError::InvalidFieldName {
                entity: table.to_string(),
                field: field.clone(),
                reason: format!(
                    "'{}' is reserved for embedded paths",
                    constants::PATH_SEPARATOR
                ),
            }
            .into());
        }
    }

    if let Some(field) = decl.encrypted.keys().find(|f| decl.embedded.contains_key(*f)) {
        return Err(MetadataError::DuplicateField {
            entity: table.to_string(),
            field: field.clone(),
        }
        .into());
    }

    for (field, key) in &decl.encrypted {
        validate_key_name(key).map_err(|reason| MetadataError::InvalidKeyName {
            entity: table.to_string(),
            field: field.clone(),
            key: key.clone(),
            reason,
        })?;
    }

    Ok(())
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// Ensure `.gitignore` under `root` keeps key material out of git
///
/// # Errors
///
/// Returns error if file operations fail.
pub fn ensure_gitignore(root: &Path) -> Result<()> {
    let gitignore = root.join(".gitignore");

    let existing = if gitignore.exists() {
        std::fs::read_to_string(&gitignore)?
    } else {
        String::new()
    };

    let mut updated = existing.clone();
    for entry in constants::GITIGNORE_ENTRIES {
        if !existing.lines().any(|l| l.trim() == *entry) {
            if !updated.is_empty() && !updated.ends_with('\n') {
                updated.push('\n');
            }
            updated.push_str(entry);
            updated.push('\n');
        }
    }

    if updated != existing {
        std::fs::write(&gitignore, updated)?;
    }

    Ok(())
}
