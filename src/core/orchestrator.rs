//! Encrypt/decrypt orchestration across the write cycle.
//!
//! Per field, state is derived from the decoded registry, the stored value's
//! marker and the tracker's last observation:
//!
//! | hook | stored value | action |
//! |---|---|---|
//! | load | sealed | decrypt, write plaintext, record as baseline |
//! | load | plaintext / blank | leave, snapshot |
//! | scheduled write | blank | pass through |
//! | scheduled write | plaintext, unchanged, ciphertext known | write known ciphertext |
//! | scheduled write | plaintext otherwise | encrypt |
//! | scheduled write | sealed, known and queued | nothing (recompute pass) |
//! | scheduled write | sealed, known | keep, queue known plaintext |
//! | scheduled write | sealed, unknown | decrypt to recover plaintext, keep |
//! | write completed | queued | write plaintext back, record as baseline |
//!
//! Embedded sub-records are handled before their owner's own fields.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::core::cipher::Encryptor;
use crate::core::entity::Entity;
use crate::core::lifecycle::{FieldPath, InstanceId, LifecycleSubscriber, UnitOfWork};
use crate::core::marker;
use crate::core::metadata::MetadataCache;
use crate::core::tracker::Tracker;
use crate::core::types::FieldValue;
use crate::error::{CipherError, Error, Result};

/// Field-level counters since construction or the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Values passed through the cipher's decrypt.
    pub decrypted: usize,
    /// Values passed through the cipher's encrypt.
    pub encrypted: usize,
    /// Writes that kept a previously persisted ciphertext.
    pub reused: usize,
    /// Null or empty values left untouched.
    pub passed_through: usize,
}

/// One traversal of an instance graph.
struct Walk<'e> {
    id: InstanceId,
    root_type: String,
    encryptor: &'e dyn Encryptor,
    visited: HashSet<(String, usize)>,
    baselines: Vec<(FieldPath, FieldValue)>,
}

impl<'e> Walk<'e> {
    fn new(id: InstanceId, root: &dyn Entity, encryptor: &'e dyn Encryptor) -> Self {
        Self {
            id,
            root_type: root.entity_type().to_string(),
            encryptor,
            visited: HashSet::new(),
            baselines: Vec::new(),
        }
    }

    /// `false` when `entity` was already visited in this traversal.
    fn enter(&mut self, entity: &dyn Entity, path: Option<&FieldPath>) -> bool {
        let address = entity as *const dyn Entity as *const () as usize;
        if self
            .visited
            .insert((entity.entity_type().to_string(), address))
        {
            return true;
        }
        warn!(
            instance = %self.id,
            entity = entity.entity_type(),
            path = path.map(FieldPath::as_str).unwrap_or(""),
            "embedded record reached twice, skipping"
        );
        false
    }

    fn decryption_error(&self, path: &FieldPath, err: Error) -> Error {
        match err {
            Error::Cipher(cause) => CipherError::Decryption {
                entity: self.root_type.clone(),
                field: path.to_string(),
                reason: cause.to_string(),
            }
            .into(),
            other => other,
        }
    }
}

/// Encryption listener for one session.
pub struct Orchestrator {
    metadata: Arc<MetadataCache>,
    configured: Option<Arc<dyn Encryptor>>,
    encryptor: Option<Arc<dyn Encryptor>>,
    tracker: Tracker,
    stats: Stats,
}

impl Orchestrator {
    /// `encryptor` is both the active backend and the one
    /// [`Orchestrator::restore_encryptor`] returns to.
    pub fn new(metadata: Arc<MetadataCache>, encryptor: Option<Arc<dyn Encryptor>>) -> Self {
        Self {
            metadata,
            configured: encryptor.clone(),
            encryptor,
            tracker: Tracker::new(),
            stats: Stats::default(),
        }
    }

    /// Swap the active backend. Tracked state is kept.
    pub fn set_encryptor(&mut self, encryptor: Option<Arc<dyn Encryptor>>) {
        debug!(
            from = self.encryptor_name().unwrap_or("none"),
            to = encryptor.as_ref().map(|e| e.name()).unwrap_or("none"),
            "swapping encryptor"
        );
        self.encryptor = encryptor;
    }

    /// Return to the backend this orchestrator was built with.
    pub fn restore_encryptor(&mut self) {
        self.encryptor = self.configured.clone();
    }

    pub fn encryptor(&self) -> Option<&Arc<dyn Encryptor>> {
        self.encryptor.as_ref()
    }

    pub fn encryptor_name(&self) -> Option<&'static str> {
        self.encryptor.as_ref().map(|e| e.name())
    }

    /// The active backend, for surfaces that must not silently do nothing.
    ///
    /// # Errors
    ///
    /// Returns `Error::EncryptorUnavailable` when none is configured.
    pub fn require_encryptor(&self) -> Result<&Arc<dyn Encryptor>> {
        self.encryptor.as_ref().ok_or(Error::EncryptorUnavailable)
    }

    pub fn metadata(&self) -> &Arc<MetadataCache> {
        &self.metadata
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = Stats::default();
    }

    /// Decrypt a freshly loaded instance in place.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::Decryption` if a sealed value cannot be
    /// decrypted, or `KeyError` if its key cannot be resolved. Either way the
    /// instance is not marked decoded.
    pub fn handle_load(&mut self, uow: &mut dyn UnitOfWork, id: InstanceId) -> Result<()> {
        if self.tracker.is_decoded(id) {
            trace!(instance = %id, "already decoded");
            return Ok(());
        }
        let Some(encryptor) = self.encryptor.clone() else {
            return Ok(());
        };
        let Some(entity) = uow.entity_mut(id) else {
            return Ok(());
        };
        if self.metadata.fields_of(&*entity)?.is_empty() {
            return Ok(());
        }

        let mut walk = Walk::new(id, &*entity, encryptor.as_ref());
        self.decrypt_entity(entity, None, &mut walk)?;

        for (path, value) in walk.baselines {
            uow.record_baseline(id, &path, value.as_deref());
        }
        self.tracker.mark_decoded(id);
        debug!(instance = %id, entity = %walk.root_type, "decoded");
        Ok(())
    }

    /// Encrypt an instance about to be written and queue its plaintext for
    /// restoration. Safe to call again in the same cycle.
    ///
    /// # Errors
    ///
    /// Returns `KeyError` or `CipherError` from the backend. Fields already
    /// rewritten stay queued; [`Orchestrator::handle_write_failed`] puts
    /// their plaintext back.
    pub fn handle_scheduled_write(
        &mut self,
        uow: &mut dyn UnitOfWork,
        id: InstanceId,
    ) -> Result<()> {
        let Some(encryptor) = self.encryptor.clone() else {
            return Ok(());
        };
        let Some(entity) = uow.entity_mut(id) else {
            return Ok(());
        };
        if self.metadata.fields_of(&*entity)?.is_empty() {
            return Ok(());
        }

        self.tracker.unmark_decoded(id);
        let mut walk = Walk::new(id, &*entity, encryptor.as_ref());
        self.encrypt_entity(entity, None, &mut walk)?;
        debug!(instance = %id, entity = %walk.root_type, "sealed for write");
        Ok(())
    }

    /// Put queued plaintext back into live instances after a commit.
    pub fn handle_write_completed(&mut self, uow: &mut dyn UnitOfWork) -> Result<()> {
        let (fields, instances) = self.restore_queued(uow, true)?;
        if fields > 0 {
            debug!(fields, instances, "restored plaintext");
        }
        Ok(())
    }

    /// Put queued plaintext back into live instances after a failed cycle.
    ///
    /// Baselines are left alone, so the host still sees the instances as
    /// changed.
    pub fn handle_write_failed(&mut self, uow: &mut dyn UnitOfWork) -> Result<()> {
        let (fields, instances) = self.restore_queued(uow, false)?;
        if fields > 0 {
            debug!(fields, instances, "restored plaintext after failed write");
        }
        Ok(())
    }

    /// Drain the restore queue into live instances. Returns the number of
    /// queued fields and of instances restored.
    fn restore_queued(
        &mut self,
        uow: &mut dyn UnitOfWork,
        record_baseline: bool,
    ) -> Result<(usize, usize)> {
        let restores = self.tracker.drain_restore_queue();
        if restores.is_empty() {
            return Ok((0, 0));
        }

        let mut restored = BTreeSet::new();
        for restore in &restores {
            let Some(entity) = uow.entity_mut(restore.instance) else {
                debug!(instance = %restore.instance, "detached before restore");
                continue;
            };
            let value = restore.value();
            if self.restore_field(entity, &restore.path, value.clone())? {
                if record_baseline {
                    uow.record_baseline(restore.instance, &restore.path, value.as_deref());
                }
                restored.insert(restore.instance);
            }
        }

        for id in &restored {
            self.tracker.mark_decoded(*id);
        }
        Ok((restores.len(), restored.len()))
    }

    fn decrypt_entity(
        &mut self,
        entity: &mut dyn Entity,
        prefix: Option<&FieldPath>,
        walk: &mut Walk<'_>,
    ) -> Result<()> {
        if !walk.enter(&*entity, prefix) {
            return Ok(());
        }
        let fields = self.metadata.fields_of(&*entity)?;

        for field in fields.iter().filter(|f| f.is_embedded()) {
            let path = FieldPath::under(prefix, field.name());
            if let Some(child) = field.embedded_mut(entity) {
                self.decrypt_entity(child, Some(&path), walk)?;
            }
        }

        for field in fields.iter() {
            let Some(key) = field.key_name() else {
                continue;
            };
            let path = FieldPath::under(prefix, field.name());
            let value = field.read(entity);

            let plaintext = match value.as_deref().and_then(marker::unseal) {
                Some(body) => walk
                    .encryptor
                    .decrypt(body, key)
                    .map_err(|e| walk.decryption_error(&path, e))?,
                None => {
                    if marker::is_blank(value.as_deref()) {
                        self.stats.passed_through += 1;
                    }
                    self.tracker.snapshot(walk.id, &path, value.as_deref());
                    continue;
                }
            };

            trace!(instance = %walk.id, field = %path, "decrypted");
            field.write(entity, Some(plaintext.clone()));
            self.tracker.snapshot(walk.id, &path, Some(plaintext.as_str()));
            if let Some(sealed) = value {
                self.tracker.record_ciphertext(walk.id, &path, sealed);
            }
            self.stats.decrypted += 1;
            walk.baselines.push((path, Some(plaintext)));
        }

        Ok(())
    }

    fn encrypt_entity(
        &mut self,
        entity: &mut dyn Entity,
        prefix: Option<&FieldPath>,
        walk: &mut Walk<'_>,
    ) -> Result<()> {
        if !walk.enter(&*entity, prefix) {
            return Ok(());
        }
        let fields = self.metadata.fields_of(&*entity)?;
        let id = walk.id;

        for field in fields.iter().filter(|f| f.is_embedded()) {
            let path = FieldPath::under(prefix, field.name());
            if let Some(child) = field.embedded_mut(entity) {
                self.encrypt_entity(child, Some(&path), walk)?;
            }
        }

        for field in fields.iter() {
            let Some(key) = field.key_name() else {
                continue;
            };
            let path = FieldPath::under(prefix, field.name());

            let current = match field.read(entity) {
                Some(value) if !value.is_empty() => value,
                blank => {
                    self.tracker.snapshot(id, &path, blank.as_deref());
                    self.tracker.queue_restore(id, &path, blank.as_deref());
                    self.stats.passed_through += 1;
                    continue;
                }
            };

            if let Some(body) = marker::unseal(&current) {
                let known = self
                    .tracker
                    .last_known(id, &path)
                    .is_some_and(|o| o.ciphertext() == Some(current.as_str()));

                if known {
                    if !self.tracker.is_queued(id, &path) {
                        self.tracker.queue_last_known(id, &path);
                        self.stats.reused += 1;
                    }
                    continue;
                }

                // Sealed by someone else: recover the plaintext, keep the ciphertext.
                let plaintext = walk
                    .encryptor
                    .decrypt(body, key)
                    .map_err(|e| walk.decryption_error(&path, e))?;
                self.tracker.snapshot(id, &path, Some(plaintext.as_str()));
                self.tracker.record_ciphertext(id, &path, current.clone());
                self.tracker.queue_restore(id, &path, Some(plaintext.as_str()));
                self.stats.decrypted += 1;
                continue;
            }

            let reusable = self
                .tracker
                .last_known(id, &path)
                .filter(|o| o.matches(Some(current.as_str())))
                .and_then(|o| o.ciphertext())
                .map(str::to_owned);

            let sealed = match reusable {
                Some(sealed) => {
                    self.stats.reused += 1;
                    sealed
                }
                None => {
                    let sealed = marker::seal(&walk.encryptor.encrypt(&current, key)?);
                    trace!(instance = %id, field = %path, "encrypted");
                    self.tracker.snapshot(id, &path, Some(current.as_str()));
                    self.tracker.record_ciphertext(id, &path, sealed.clone());
                    self.stats.encrypted += 1;
                    sealed
                }
            };

            field.write(entity, Some(sealed));
            self.tracker.queue_restore(id, &path, Some(current.as_str()));
        }

        Ok(())
    }

    /// Write `value` into the field at `path`. `false` if the path no longer
    /// resolves (sub-record removed since the write).
    fn restore_field(
        &self,
        entity: &mut dyn Entity,
        path: &FieldPath,
        value: FieldValue,
    ) -> Result<bool> {
        let mut segments = path.segments().peekable();
        let mut current = entity;

        while let Some(segment) = segments.next() {
            let fields = self.metadata.fields_of(&*current)?;
            let Some(field) = fields.iter().find(|f| f.name() == segment) else {
                return Ok(false);
            };
            if segments.peek().is_none() {
                field.write(current, value);
                return Ok(true);
            }
            match field.embedded_mut(current) {
                Some(child) => current = child,
                None => return Ok(false),
            }
        }

        Ok(false)
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("encryptor", &self.encryptor_name())
            .field("tracker", &self.tracker)
            .field("stats", &self.stats)
            .finish()
    }
}

impl LifecycleSubscriber for Orchestrator {
    fn on_load(&mut self, uow: &mut dyn UnitOfWork, id: InstanceId) -> Result<()> {
        self.handle_load(uow, id)
    }

    fn on_scheduled_write(&mut self, uow: &mut dyn UnitOfWork, id: InstanceId) -> Result<()> {
        self.handle_scheduled_write(uow, id)
    }

    fn on_write_completed(&mut self, uow: &mut dyn UnitOfWork) -> Result<()> {
        self.handle_write_completed(uow)
    }

    fn on_write_failed(&mut self, uow: &mut dyn UnitOfWork) {
        if let Err(err) = self.handle_write_failed(uow) {
            warn!(%err, "could not restore plaintext after failed write");
        }
    }

    fn on_detach(&mut self, id: InstanceId) {
        self.tracker.forget(id);
    }

    fn on_clear(&mut self) {
        self.tracker.clear();
    }
}
