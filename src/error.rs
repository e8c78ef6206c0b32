//! Error types.
//!
//! One top-level [`Error`] wraps a domain enum per concern. Library functions
//! return [`Result`] and convert domain errors with `?` / `.into()`.

use thiserror::Error;

/// Top-level error type for fieldvault.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    /// No encryptor is configured. Lifecycle hooks treat this as an inert
    /// configuration; only surfaces that need a cipher raise it.
    #[error("no encryptor configured")]
    EncryptorUnavailable,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Some tables of an `encrypt-database` run failed.
    #[error("{0} table(s) could not be encrypted")]
    SweepFailed(usize),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),
}

/// Malformed encryption declarations on an entity type.
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("invalid key name '{key}' on {entity}.{field}: {reason}")]
    InvalidKeyName {
        entity: String,
        field: String,
        key: String,
        reason: String,
    },

    #[error("field '{field}' declared twice on {entity}")]
    DuplicateField { entity: String, field: String },

    #[error("empty field name declared on {entity}")]
    EmptyFieldName { entity: String },

    #[error("invalid field name '{field}' on {entity}: {reason}")]
    InvalidFieldName {
        entity: String,
        field: String,
        reason: String,
    },
}

/// Key material errors. Raised when a declared key name is first used.
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("no key material for key name '{0}'")]
    Unknown(String),

    #[error("failed to read key '{name}': {source}")]
    ReadFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid key file for '{name}': {reason}")]
    InvalidFormat { name: String, reason: String },

    #[error("failed to write key file: {0}")]
    WriteFailed(#[source] std::io::Error),

    #[error("key file already exists: {0}")]
    AlreadyExists(String),
}

/// Cipher failures.
#[derive(Error, Debug)]
pub enum CipherError {
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// Stored ciphertext carries the marker but cannot be decrypted.
    #[error("cannot decrypt {entity}.{field}: {reason}")]
    Decryption {
        entity: String,
        field: String,
        reason: String,
    },

    #[error("armor encoding failed: {0}")]
    ArmorFailed(String),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("not initialized: run `fieldvault init` first")]
    NotInitialized,

    #[error("already initialized: .fieldvault.toml exists")]
    AlreadyInitialized,

    #[error("failed to read config: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("unknown encryptor: {0} (supported: age, none)")]
    UnknownEncryptor(String),
}

/// Record storage errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to read store: {0}")]
    Read(#[source] std::io::Error),

    #[error("failed to write store: {0}")]
    Write(#[source] std::io::Error),

    #[error("failed to parse store: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("failed to serialize store: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("row {id} not found in table {table}")]
    MissingRow { table: String, id: u64 },
}

pub type Result<T> = std::result::Result<T, Error>;
