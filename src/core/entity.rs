//! Entity declarations and field access capabilities.
//!
//! An entity type declares its fields once through a [`Mapping`]. Each
//! encrypted field carries a [`FieldAccess`] that reads and writes the raw
//! value, and each embedded sub-record carries an [`EmbeddedAccess`] that
//! projects into it.
//!
//! ```
//! use fieldvault::core::entity::{Entity, Mapping};
//!
//! struct User {
//!     secret: Option<String>,
//! }
//!
//! impl Entity for User {
//!     fn entity_type(&self) -> &str {
//!         "User"
//!     }
//!
//!     fn mapping(&self) -> Mapping {
//!         Mapping::new().encrypted::<User>(
//!             "secret",
//!             "default",
//!             |u| u.secret.as_deref(),
//!             |u, v| u.secret = v,
//!         )
//!     }
//! }
//! ```

use std::any::Any;

use crate::core::types::{FieldName, FieldValue, KeyName};

/// Upcast to `Any`, implemented for every `'static` type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A persisted record type with declared encryption metadata.
pub trait Entity: AsAny {
    /// Record-type identity. Metadata is cached under this name, so it must be
    /// unique per declaration.
    fn entity_type(&self) -> &str;

    /// Field declarations. Consulted once per entity type.
    fn mapping(&self) -> Mapping;
}

/// Raw read/write of one scalar field, bypassing any validation.
pub trait FieldAccess: Send + Sync {
    fn get(&self, owner: &dyn Any) -> FieldValue;
    fn set(&self, owner: &mut dyn Any, value: FieldValue);
}

/// Projection into an embedded sub-record. `None` when it is absent.
pub trait EmbeddedAccess: Send + Sync {
    fn project<'a>(&self, owner: &'a mut dyn Any) -> Option<&'a mut dyn Entity>;
}

struct TypedField<T> {
    get: fn(&T) -> Option<&str>,
    set: fn(&mut T, FieldValue),
}

impl<T: Any> FieldAccess for TypedField<T> {
    fn get(&self, owner: &dyn Any) -> FieldValue {
        owner
            .downcast_ref::<T>()
            .and_then(|entity| (self.get)(entity))
            .map(str::to_owned)
    }

    fn set(&self, owner: &mut dyn Any, value: FieldValue) {
        if let Some(entity) = owner.downcast_mut::<T>() {
            (self.set)(entity, value);
        }
    }
}

struct TypedEmbedded<T> {
    project: fn(&mut T) -> Option<&mut dyn Entity>,
}

impl<T: Any> EmbeddedAccess for TypedEmbedded<T> {
    fn project<'a>(&self, owner: &'a mut dyn Any) -> Option<&'a mut dyn Entity> {
        owner
            .downcast_mut::<T>()
            .and_then(|entity| (self.project)(entity))
    }
}

/// How a declared field participates in encryption.
pub enum FieldKind {
    /// Stored as-is.
    Plain,
    /// Encrypted with the named key.
    Encrypted {
        key: KeyName,
        access: Box<dyn FieldAccess>,
    },
    /// A full sub-record whose own declarations apply.
    Embedded { access: Box<dyn EmbeddedAccess> },
}

/// One declared field.
pub struct FieldDecl {
    pub name: FieldName,
    pub kind: FieldKind,
}

impl std::fmt::Debug for FieldDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.kind {
            FieldKind::Plain => "plain".to_string(),
            FieldKind::Encrypted { key, .. } => format!("encrypted({})", key),
            FieldKind::Embedded { .. } => "embedded".to_string(),
        };
        f.debug_struct("FieldDecl")
            .field("name", &self.name)
            .field("kind", &kind)
            .finish()
    }
}

/// Declared fields of an entity type, in declaration order.
#[derive(Debug, Default)]
pub struct Mapping {
    fields: Vec<FieldDecl>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field that is never encrypted.
    pub fn plain(mut self, name: impl Into<FieldName>) -> Self {
        self.fields.push(FieldDecl {
            name: name.into(),
            kind: FieldKind::Plain,
        });
        self
    }

    /// Declare an encrypted field through typed getter/setter functions.
    pub fn encrypted<T: Any>(
        self,
        name: impl Into<FieldName>,
        key: impl Into<KeyName>,
        get: fn(&T) -> Option<&str>,
        set: fn(&mut T, FieldValue),
    ) -> Self {
        self.encrypted_with(name, key, TypedField { get, set })
    }

    /// Declare an encrypted field with a custom accessor.
    pub fn encrypted_with(
        mut self,
        name: impl Into<FieldName>,
        key: impl Into<KeyName>,
        access: impl FieldAccess + 'static,
    ) -> Self {
        self.fields.push(FieldDecl {
            name: name.into(),
            kind: FieldKind::Encrypted {
                key: key.into(),
                access: Box::new(access),
            },
        });
        self
    }

    /// Declare an embedded sub-record through a typed projection.
    pub fn embedded<T: Any>(
        self,
        name: impl Into<FieldName>,
        project: fn(&mut T) -> Option<&mut dyn Entity>,
    ) -> Self {
        self.embedded_with(name, TypedEmbedded { project })
    }

    /// Declare an embedded sub-record with a custom projection.
    pub fn embedded_with(
        mut self,
        name: impl Into<FieldName>,
        access: impl EmbeddedAccess + 'static,
    ) -> Self {
        self.fields.push(FieldDecl {
            name: name.into(),
            kind: FieldKind::Embedded {
                access: Box::new(access),
            },
        });
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[FieldDecl] {
        &self.fields
    }

    pub(crate) fn into_fields(self) -> Vec<FieldDecl> {
        self.fields
    }
}
