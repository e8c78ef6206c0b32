//! Reference unit of work.
//!
//! A [`Session`] maps rows of a [`Store`] to managed [`Document`]s, tracks
//! each one against the row it was loaded from, and drives a
//! [`LifecycleSubscriber`] through load and commit.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::core::document::{Document, Schema};
use crate::core::entity::Entity;
use crate::core::lifecycle::{FieldPath, InstanceId, LifecycleSubscriber, UnitOfWork};
use crate::core::storage::{Row, RowId, Store};
use crate::core::types::TableName;
use crate::error::Result;

struct Managed {
    doc: Document,
    /// Row last seen in storage, with listener corrections applied. `None`
    /// until the document is first written.
    baseline: Option<Row>,
    touched: bool,
}

impl Managed {
    fn needs_write(&self) -> bool {
        self.touched
            || self
                .baseline
                .as_ref()
                .map_or(true, |baseline| *baseline != self.doc.to_row())
    }
}

/// The identity map. Kept apart from the store and listener so hooks can
/// borrow it alone.
#[derive(Default)]
struct Instances {
    managed: BTreeMap<InstanceId, Managed>,
}

impl UnitOfWork for Instances {
    fn entity_mut(&mut self, id: InstanceId) -> Option<&mut dyn Entity> {
        self.managed
            .get_mut(&id)
            .map(|m| &mut m.doc as &mut dyn Entity)
    }

    fn record_baseline(&mut self, id: InstanceId, path: &FieldPath, value: Option<&str>) {
        if let Some(baseline) = self.managed.get_mut(&id).and_then(|m| m.baseline.as_mut()) {
            baseline.insert(path.as_str().to_string(), value.map(str::to_owned));
        }
    }
}

pub struct Session<S: Store, L: LifecycleSubscriber> {
    store: S,
    listener: L,
    schema: Arc<Schema>,
    instances: Instances,
    by_row: HashMap<(TableName, RowId), InstanceId>,
    next_instance: u64,
}

impl<S: Store, L: LifecycleSubscriber> Session<S, L> {
    pub fn new(store: S, listener: L, schema: Arc<Schema>) -> Self {
        Self {
            store,
            listener,
            schema,
            instances: Instances::default(),
            by_row: HashMap::new(),
            next_instance: 1,
        }
    }

    /// Instance for row `id` of `table`, loading it if it is not managed yet.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownTable` for an unconfigured table, storage
    /// errors, or whatever the listener's `on_load` returns. A row that fails
    /// to load is not left in the identity map.
    pub fn find(&mut self, table: &str, id: RowId) -> Result<Option<InstanceId>> {
        self.schema.require(table)?;
        if let Some(instance) = self.by_row.get(&(table.to_string(), id)) {
            return Ok(Some(*instance));
        }
        match self.store.get(table, id)? {
            Some(row) => self.materialize(table, id, row).map(Some),
            None => Ok(None),
        }
    }

    /// Up to `limit` instances for rows with ids greater than `after`.
    pub fn load_page(
        &mut self,
        table: &str,
        after: Option<RowId>,
        limit: usize,
    ) -> Result<Vec<InstanceId>> {
        self.schema.require(table)?;
        let rows = self.store.rows_after(table, after, limit)?;
        let mut loaded = Vec::with_capacity(rows.len());
        for (id, row) in rows {
            let instance = match self.by_row.get(&(table.to_string(), id)) {
                Some(existing) => *existing,
                None => self.materialize(table, id, row)?,
            };
            loaded.push(instance);
        }
        Ok(loaded)
    }

    fn materialize(&mut self, table: &str, id: RowId, row: Row) -> Result<InstanceId> {
        let doc = Document::from_row(Arc::clone(&self.schema), table, Some(id), row)?;
        let baseline = doc.to_row();
        let instance = self.allocate();
        self.instances.managed.insert(
            instance,
            Managed {
                doc,
                baseline: Some(baseline),
                touched: false,
            },
        );
        self.by_row.insert((table.to_string(), id), instance);

        if let Err(err) = self.listener.on_load(&mut self.instances, instance) {
            self.detach(instance);
            return Err(err);
        }
        Ok(instance)
    }

    fn allocate(&mut self) -> InstanceId {
        let id = InstanceId::new(self.next_instance);
        self.next_instance += 1;
        id
    }

    /// Manage `doc`. A document without a row id is inserted on the next
    /// flush; one with a row id replaces that row, evicting any instance
    /// already managing it.
    pub fn persist(&mut self, doc: Document) -> Result<InstanceId> {
        self.schema.require(doc.table())?;
        if let Some(row_id) = doc.id() {
            if let Some(previous) = self.by_row.get(&(doc.table().to_string(), row_id)).copied() {
                self.detach(previous);
            }
        }

        let instance = self.allocate();
        if let Some(row_id) = doc.id() {
            self.by_row.insert((doc.table().to_string(), row_id), instance);
        }
        self.instances.managed.insert(
            instance,
            Managed {
                doc,
                baseline: None,
                touched: false,
            },
        );
        Ok(instance)
    }

    /// Schedule `id` on the next flush even if unchanged. Returns `false`
    /// when it is not managed.
    pub fn touch(&mut self, id: InstanceId) -> bool {
        match self.instances.managed.get_mut(&id) {
            Some(managed) => {
                managed.touched = true;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: InstanceId) -> Option<&Document> {
        self.instances.managed.get(&id).map(|m| &m.doc)
    }

    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut Document> {
        self.instances.managed.get_mut(&id).map(|m| &mut m.doc)
    }

    /// Whether `id` would be written by the next flush.
    pub fn is_dirty(&self, id: InstanceId) -> bool {
        self.instances
            .managed
            .get(&id)
            .is_some_and(Managed::needs_write)
    }

    /// Write every new, touched or changed instance and commit.
    ///
    /// Returns the number of rows written. If anything fails before the
    /// commit, staged writes are rolled back and listeners get
    /// `on_write_failed`; the instances stay dirty.
    pub fn flush(&mut self) -> Result<usize> {
        let scheduled: Vec<InstanceId> = self
            .instances
            .managed
            .iter()
            .filter(|(_, m)| m.needs_write())
            .map(|(id, _)| *id)
            .collect();
        if scheduled.is_empty() {
            return Ok(0);
        }
        debug!(instances = scheduled.len(), "flushing");

        let inserted = match self.write(&scheduled) {
            Ok(inserted) => inserted,
            Err(err) => {
                self.store.rollback();
                self.listener.on_write_failed(&mut self.instances);
                return Err(err);
            }
        };

        for (instance, row_id) in inserted {
            if let Some(managed) = self.instances.managed.get_mut(&instance) {
                managed.doc.set_id(row_id);
                self.by_row
                    .insert((managed.doc.table().to_string(), row_id), instance);
            }
        }
        for id in &scheduled {
            if let Some(managed) = self.instances.managed.get_mut(id) {
                managed.baseline = Some(managed.doc.to_row());
                managed.touched = false;
            }
        }

        self.listener.on_write_completed(&mut self.instances)?;
        Ok(scheduled.len())
    }

    /// Dispatch scheduled-write hooks, stage the rows and commit. Returns
    /// the row ids assigned to inserted instances.
    fn write(&mut self, scheduled: &[InstanceId]) -> Result<Vec<(InstanceId, RowId)>> {
        let mut rewritten = Vec::new();
        for id in scheduled {
            let before = self.row_of(*id);
            self.listener.on_scheduled_write(&mut self.instances, *id)?;
            if self.row_of(*id) != before {
                rewritten.push(*id);
            }
        }

        // Listener changes alter the change set; give it a look at the
        // recomputed state before anything is staged.
        for id in &rewritten {
            self.listener.on_scheduled_write(&mut self.instances, *id)?;
        }

        let mut inserted = Vec::new();
        for id in scheduled {
            let Some(managed) = self.instances.managed.get(id) else {
                continue;
            };
            let row = managed.doc.to_row();
            match managed.doc.id() {
                Some(row_id) => self.store.update(managed.doc.table(), row_id, row)?,
                None => {
                    let row_id = self.store.insert(managed.doc.table(), row)?;
                    inserted.push((*id, row_id));
                }
            }
        }

        self.store.commit()?;
        Ok(inserted)
    }

    fn row_of(&self, id: InstanceId) -> Option<Row> {
        self.instances.managed.get(&id).map(|m| m.doc.to_row())
    }

    /// Stop managing `id` and return its document.
    pub fn detach(&mut self, id: InstanceId) -> Option<Document> {
        let managed = self.instances.managed.remove(&id)?;
        if let Some(row_id) = managed.doc.id() {
            let key = (managed.doc.table().to_string(), row_id);
            if self.by_row.get(&key) == Some(&id) {
                self.by_row.remove(&key);
            }
        }
        self.listener.on_detach(id);
        Some(managed.doc)
    }

    /// Empty the identity map.
    pub fn clear(&mut self) {
        self.instances.managed.clear();
        self.by_row.clear();
        self.listener.on_clear();
    }

    pub fn len(&self) -> usize {
        self.instances.managed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.managed.is_empty()
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }
}

impl<S: Store, L: LifecycleSubscriber> std::fmt::Debug for Session<S, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("instances", &self.instances.managed.len())
            .field("next_instance", &self.next_instance)
            .finish_non_exhaustive()
    }
}
