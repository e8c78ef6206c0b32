//! Schema-driven records.
//!
//! A [`Document`] is an untyped row of one configured table. Its encryption
//! mapping comes from the table's [`TableConfig`], so any table declared in
//! `.fieldvault.toml` can flow through the orchestrator.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::config::TableConfig;
use crate::core::constants::PATH_SEPARATOR;
use crate::core::entity::{EmbeddedAccess, Entity, FieldAccess, Mapping};
use crate::core::storage::{Row, RowId};
use crate::core::types::{FieldName, FieldValue, TableName};
use crate::error::{ConfigError, Result};

/// All configured tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    tables: BTreeMap<TableName, TableConfig>,
}

impl Schema {
    pub fn new(tables: BTreeMap<TableName, TableConfig>) -> Self {
        Self { tables }
    }

    pub fn table(&self, name: &str) -> Option<&TableConfig> {
        self.tables.get(name)
    }

    /// # Errors
    ///
    /// Returns `ConfigError::UnknownTable` if `name` is not configured.
    pub fn require(&self, name: &str) -> Result<&TableConfig> {
        self.table(name)
            .ok_or_else(|| ConfigError::UnknownTable(name.to_string()).into())
    }

    pub fn tables(&self) -> impl Iterator<Item = (&TableName, &TableConfig)> {
        self.tables.iter()
    }

    /// Whether `table` has an encrypted field, directly or in an embedded
    /// sub-record.
    pub fn has_encrypted_fields(&self, table: &str) -> bool {
        self.has_encrypted_within(table, 0)
    }

    fn has_encrypted_within(&self, table: &str, depth: usize) -> bool {
        let Some(decl) = self.tables.get(table) else {
            return false;
        };
        if !decl.encrypted.is_empty() {
            return true;
        }
        depth < self.tables.len()
            && decl
                .embedded
                .values()
                .any(|target| self.has_encrypted_within(target, depth + 1))
    }

    /// Encrypted column names of `table`, embedded ones dotted.
    pub fn encrypted_columns(&self, table: &str) -> Vec<String> {
        let mut columns = Vec::new();
        self.collect_encrypted(table, "", &mut columns, 0);
        columns
    }

    fn collect_encrypted(&self, table: &str, prefix: &str, out: &mut Vec<String>, depth: usize) {
        let Some(decl) = self.tables.get(table) else {
            return;
        };
        for field in decl.encrypted.keys() {
            out.push(format!("{}{}", prefix, field));
        }
        if depth >= self.tables.len() {
            return;
        }
        for (field, target) in &decl.embedded {
            let nested = format!("{}{}{}", prefix, field, PATH_SEPARATOR);
            self.collect_encrypted(target, &nested, out, depth + 1);
        }
    }
}

/// One record of a configured table.
#[derive(Debug, Clone)]
pub struct Document {
    table: TableName,
    id: Option<RowId>,
    values: BTreeMap<FieldName, FieldValue>,
    embedded: BTreeMap<FieldName, Document>,
    schema: Arc<Schema>,
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.table == other.table
            && self.id == other.id
            && self.values == other.values
            && self.embedded == other.embedded
    }
}

impl Document {
    /// New, unsaved document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownTable` if `table` is not in `schema`.
    pub fn new(schema: Arc<Schema>, table: &str) -> Result<Self> {
        schema.require(table)?;
        Ok(Self {
            table: table.to_string(),
            id: None,
            values: BTreeMap::new(),
            embedded: BTreeMap::new(),
            schema,
        })
    }

    /// Rebuild a document from a flat row. Dotted columns whose first
    /// segment is an embedded field go to that sub-record; a sub-record with
    /// no columns is absent.
    pub fn from_row(schema: Arc<Schema>, table: &str, id: Option<RowId>, row: Row) -> Result<Self> {
        let embedded_fields = schema.require(table)?.embedded.clone();
        let mut doc = Self::new(Arc::clone(&schema), table)?;
        doc.id = id;

        let mut nested: BTreeMap<FieldName, Row> = BTreeMap::new();
        for (column, value) in row {
            match column.split_once(PATH_SEPARATOR) {
                Some((head, rest)) if embedded_fields.contains_key(head) => {
                    nested
                        .entry(head.to_string())
                        .or_default()
                        .insert(rest.to_string(), value);
                }
                _ => {
                    doc.values.insert(column, value);
                }
            }
        }

        for (field, sub_row) in nested {
            let target = &embedded_fields[&field];
            let sub = Self::from_row(Arc::clone(&schema), target, None, sub_row)?;
            doc.embedded.insert(field, sub);
        }

        Ok(doc)
    }

    /// Flatten into a row, embedded values under dotted column names.
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        self.flatten_into("", &mut row);
        row
    }

    fn flatten_into(&self, prefix: &str, row: &mut Row) {
        for (field, value) in &self.values {
            row.insert(format!("{}{}", prefix, field), value.clone());
        }
        for (field, sub) in &self.embedded {
            sub.flatten_into(&format!("{}{}{}", prefix, field, PATH_SEPARATOR), row);
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn id(&self) -> Option<RowId> {
        self.id
    }

    pub fn set_id(&mut self, id: RowId) {
        self.id = Some(id);
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).and_then(|v| v.as_deref())
    }

    pub fn set(&mut self, field: impl Into<FieldName>, value: FieldValue) {
        self.values.insert(field.into(), value);
    }

    pub fn with(mut self, field: impl Into<FieldName>, value: &str) -> Self {
        self.set(field, Some(value.to_string()));
        self
    }

    pub fn values(&self) -> &BTreeMap<FieldName, FieldValue> {
        &self.values
    }

    pub fn embedded(&self, field: &str) -> Option<&Document> {
        self.embedded.get(field)
    }

    pub fn embedded_mut(&mut self, field: &str) -> Option<&mut Document> {
        self.embedded.get_mut(field)
    }

    /// Attach a sub-record under `field`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `field` is not declared as
    /// embedding `sub`'s table.
    pub fn set_embedded(&mut self, field: &str, sub: Document) -> Result<()> {
        let declared = self
            .schema
            .require(&self.table)?
            .embedded
            .get(field)
            .is_some_and(|target| *target == sub.table);
        if !declared {
            return Err(ConfigError::InvalidValue {
                field: "embedded",
                reason: format!("{}.{} does not embed {}", self.table, field, sub.table),
            }
            .into());
        }
        self.embedded.insert(field.to_string(), sub);
        Ok(())
    }

    pub fn remove_embedded(&mut self, field: &str) -> Option<Document> {
        self.embedded.remove(field)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

struct DocumentField {
    name: FieldName,
}

impl FieldAccess for DocumentField {
    fn get(&self, owner: &dyn Any) -> FieldValue {
        owner
            .downcast_ref::<Document>()
            .and_then(|doc| doc.values.get(&self.name).cloned())
            .flatten()
    }

    fn set(&self, owner: &mut dyn Any, value: FieldValue) {
        if let Some(doc) = owner.downcast_mut::<Document>() {
            doc.values.insert(self.name.clone(), value);
        }
    }
}

struct DocumentEmbedded {
    name: FieldName,
}

impl EmbeddedAccess for DocumentEmbedded {
    fn project<'a>(&self, owner: &'a mut dyn Any) -> Option<&'a mut dyn Entity> {
        owner
            .downcast_mut::<Document>()
            .and_then(|doc| doc.embedded.get_mut(&self.name))
            .map(|sub| sub as &mut dyn Entity)
    }
}

impl Entity for Document {
    fn entity_type(&self) -> &str {
        &self.table
    }

    fn mapping(&self) -> Mapping {
        let Some(decl) = self.schema.table(&self.table) else {
            return Mapping::new();
        };
        let mut mapping = Mapping::new();
        for (field, key) in &decl.encrypted {
            mapping = mapping.encrypted_with(
                field.clone(),
                key.clone(),
                DocumentField { name: field.clone() },
            );
        }
        for field in decl.embedded.keys() {
            mapping = mapping.embedded_with(field.clone(), DocumentEmbedded { name: field.clone() });
        }
        mapping
    }
}
