//! Field metadata cache.
//!
//! Turns an entity type's [`Mapping`] into the ordered list of
//! encryption-relevant [`FieldDescriptor`]s, once per type, and hands out the
//! same shared list on every later request.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::core::constants::{MAX_KEY_NAME_LEN, PATH_SEPARATOR};
use crate::core::entity::{AsAny, EmbeddedAccess, Entity, FieldAccess, FieldKind, Mapping};
use crate::core::types::{FieldValue, KeyName};
use crate::error::{MetadataError, Result};

/// What a descriptor gives access to.
pub enum DescriptorKind {
    Encrypted {
        key: KeyName,
        access: Box<dyn FieldAccess>,
    },
    Embedded {
        access: Box<dyn EmbeddedAccess>,
    },
}

/// One encryption-eligible field (or embedded sub-record) of an entity type.
pub struct FieldDescriptor {
    name: String,
    kind: DescriptorKind,
}

impl FieldDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared key name; `None` for embedded sub-records.
    pub fn key_name(&self) -> Option<&str> {
        match &self.kind {
            DescriptorKind::Encrypted { key, .. } => Some(key),
            DescriptorKind::Embedded { .. } => None,
        }
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self.kind, DescriptorKind::Embedded { .. })
    }

    /// Current raw value of a scalar field. Always `None` for sub-records.
    pub fn read(&self, owner: &dyn Entity) -> FieldValue {
        match &self.kind {
            DescriptorKind::Encrypted { access, .. } => access.get(AsAny::as_any(owner)),
            DescriptorKind::Embedded { .. } => None,
        }
    }

    /// Overwrite a scalar field. No-op for sub-records.
    pub fn write(&self, owner: &mut dyn Entity, value: FieldValue) {
        if let DescriptorKind::Encrypted { access, .. } = &self.kind {
            access.set(AsAny::as_any_mut(owner), value);
        }
    }

    /// The embedded sub-record, when present.
    pub fn embedded_mut<'a>(&self, owner: &'a mut dyn Entity) -> Option<&'a mut dyn Entity> {
        match &self.kind {
            DescriptorKind::Embedded { access } => access.project(AsAny::as_any_mut(owner)),
            DescriptorKind::Encrypted { .. } => None,
        }
    }
}

impl std::fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("key", &self.key_name())
            .field("embedded", &self.is_embedded())
            .finish()
    }
}

/// Process-wide cache of descriptors per entity type.
///
/// Types are static for the process lifetime, so entries are never invalidated.
#[derive(Debug, Default)]
pub struct MetadataCache {
    types: RwLock<HashMap<String, Arc<[FieldDescriptor]>>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Descriptors for the type of `entity`, built on first encounter.
    ///
    /// # Errors
    ///
    /// Returns `MetadataError` if the type's declarations are malformed.
    /// Malformed types are not cached; every request fails the same way.
    pub fn fields_of(&self, entity: &dyn Entity) -> Result<Arc<[FieldDescriptor]>> {
        let entity_type = entity.entity_type();

        if let Some(fields) = self
            .types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(entity_type)
        {
            return Ok(Arc::clone(fields));
        }

        let built: Arc<[FieldDescriptor]> = build(entity_type, entity.mapping())?.into();
        debug!(
            entity = entity_type,
            fields = built.len(),
            "cached encryption metadata"
        );

        let mut types = self.types.write().unwrap_or_else(PoisonError::into_inner);
        let fields = types.entry(entity_type.to_string()).or_insert(built);
        Ok(Arc::clone(fields))
    }

    /// Number of cached entity types.
    pub fn len(&self) -> usize {
        self.types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn build(entity_type: &str, mapping: Mapping) -> Result<Vec<FieldDescriptor>> {
    let mut seen = HashSet::new();
    let mut descriptors = Vec::new();

    for decl in mapping.into_fields() {
        validate_field_name(entity_type, &decl.name)?;
        if !seen.insert(decl.name.clone()) {
            return Err(MetadataError::DuplicateField {
                entity: entity_type.to_string(),
                field: decl.name,
            }
            .into());
        }

        let kind = match decl.kind {
            FieldKind::Plain => continue,
            FieldKind::Encrypted { key, access } => {
                validate_key_name(&key).map_err(|reason| MetadataError::InvalidKeyName {
                    entity: entity_type.to_string(),
                    field: decl.name.clone(),
                    key: key.clone(),
                    reason,
                })?;
                DescriptorKind::Encrypted { key, access }
            }
            FieldKind::Embedded { access } => DescriptorKind::Embedded { access },
        };

        descriptors.push(FieldDescriptor {
            name: decl.name,
            kind,
        });
    }

    Ok(descriptors)
}

fn validate_field_name(entity_type: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MetadataError::EmptyFieldName {
            entity: entity_type.to_string(),
        }
        .into());
    }
    if name.contains(PATH_SEPARATOR) {
        return Err(MetadataError::InvalidFieldName {
            entity: entity_type.to_string(),
            field: name.to_string(),
            reason: format!("'{}' is reserved for embedded paths", PATH_SEPARATOR),
        }
        .into());
    }
    Ok(())
}

/// Check that a key name is structurally well-formed.
///
/// Key names are 1-64 characters of `A-Z`, `a-z`, `0-9`, `_`, `-` and `.`.
/// Whether key material exists for the name is only checked when it is used.
pub fn validate_key_name(key: &str) -> std::result::Result<(), String> {
    if key.is_empty() {
        return Err("key name is empty".to_string());
    }
    if key.len() > MAX_KEY_NAME_LEN {
        return Err(format!("longer than {} characters", MAX_KEY_NAME_LEN));
    }
    if let Some((i, ch)) = key
        .chars()
        .enumerate()
        .find(|(_, ch)| !ch.is_ascii_alphanumeric() && !matches!(ch, '_' | '-' | '.'))
    {
        return Err(format!("invalid character '{}' at position {}", ch, i + 1));
    }
    Ok(())
}
