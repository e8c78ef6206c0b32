//! Type aliases for domain concepts.

/// Name of a key in the key ring (e.g., `default`, `pii`).
pub type KeyName = String;

/// Name of a record table / entity type.
pub type TableName = String;

/// Name of a single declared field.
pub type FieldName = String;

/// A field value as the host stores it. `None` is null.
pub type FieldValue = Option<String>;
