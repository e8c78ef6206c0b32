//! Per-session encryption state.
//!
//! Holds, per instance, the last plaintext observed for each eligible field
//! together with the sealed value persisted for it, the registry of instances
//! currently holding plaintext, and the single-shot restore queue drained after
//! each committed write.
//!
//! Embedded fields are keyed by dotted path under the root instance id.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use zeroize::Zeroizing;

use crate::core::lifecycle::{FieldPath, InstanceId};

/// Last observation of one field.
#[derive(Clone, Default)]
pub struct Observation {
    plaintext: Option<Zeroizing<String>>,
    ciphertext: Option<String>,
}

impl Observation {
    /// Last plaintext observed. `None` means the field was null.
    pub fn plaintext(&self) -> Option<&str> {
        self.plaintext.as_deref().map(String::as_str)
    }

    /// Sealed value persisted for [`Observation::plaintext`], if any.
    pub fn ciphertext(&self) -> Option<&str> {
        self.ciphertext.as_deref()
    }

    pub fn matches(&self, value: Option<&str>) -> bool {
        self.plaintext() == value
    }
}

impl fmt::Debug for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observation")
            .field("plaintext", &self.plaintext.as_ref().map(|_| "<redacted>"))
            .field("ciphertext", &self.ciphertext.as_ref().map(String::len))
            .finish()
    }
}

/// Everything tracked for one instance.
#[derive(Debug, Default)]
pub struct InstanceState {
    fields: HashMap<FieldPath, Observation>,
}

impl InstanceState {
    pub fn field(&self, path: &FieldPath) -> Option<&Observation> {
        self.fields.get(path)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// One queued post-write restoration.
pub struct Restore {
    pub instance: InstanceId,
    pub path: FieldPath,
    pub plaintext: Option<Zeroizing<String>>,
}

impl Restore {
    pub fn value(&self) -> Option<String> {
        self.plaintext.as_deref().cloned()
    }
}

impl fmt::Debug for Restore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Restore")
            .field("instance", &self.instance)
            .field("path", &self.path)
            .field("plaintext", &self.plaintext.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Default)]
pub struct Tracker {
    instances: HashMap<InstanceId, InstanceState>,
    decoded: HashSet<InstanceId>,
    pending: BTreeMap<(InstanceId, FieldPath), Option<Zeroizing<String>>>,
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("instances", &self.instances)
            .field("decoded", &self.decoded)
            .field("pending", &self.pending.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` as the last plaintext seen for `path`.
    ///
    /// A repeated snapshot of the same value leaves state untouched. A
    /// different value drops the ciphertext recorded for the old one.
    pub fn snapshot(&mut self, id: InstanceId, path: &FieldPath, value: Option<&str>) {
        let state = self.instances.entry(id).or_default();
        if let Some(existing) = state.fields.get(path) {
            if existing.matches(value) {
                return;
            }
        }
        state.fields.insert(
            path.clone(),
            Observation {
                plaintext: value.map(|v| Zeroizing::new(v.to_string())),
                ciphertext: None,
            },
        );
    }

    /// Attach the sealed value persisted for the current snapshot of `path`.
    /// Ignored when `path` has never been snapshotted.
    pub fn record_ciphertext(&mut self, id: InstanceId, path: &FieldPath, sealed: String) {
        if let Some(observation) = self
            .instances
            .get_mut(&id)
            .and_then(|state| state.fields.get_mut(path))
        {
            observation.ciphertext = Some(sealed);
        }
    }

    /// `None` means no prior observation.
    pub fn last_known(&self, id: InstanceId, path: &FieldPath) -> Option<&Observation> {
        self.instances.get(&id).and_then(|state| state.field(path))
    }

    pub fn state(&self, id: InstanceId) -> Option<&InstanceState> {
        self.instances.get(&id)
    }

    /// Queue `plaintext` to be written back into `path` after the current
    /// write commits. Queuing the same path again replaces the entry.
    pub fn queue_restore(&mut self, id: InstanceId, path: &FieldPath, plaintext: Option<&str>) {
        self.pending.insert(
            (id, path.clone()),
            plaintext.map(|p| Zeroizing::new(p.to_string())),
        );
    }

    /// Queue the last plaintext observed for `path`. Returns `false` when
    /// there is no observation to queue.
    pub fn queue_last_known(&mut self, id: InstanceId, path: &FieldPath) -> bool {
        let Some(plaintext) = self.last_known(id, path).map(|o| o.plaintext.clone()) else {
            return false;
        };
        self.pending.insert((id, path.clone()), plaintext);
        true
    }

    pub fn is_queued(&self, id: InstanceId, path: &FieldPath) -> bool {
        self.pending.contains_key(&(id, path.clone()))
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Take every queued restoration, ordered by instance then path.
    pub fn drain_restore_queue(&mut self) -> Vec<Restore> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|((instance, path), plaintext)| Restore {
                instance,
                path,
                plaintext,
            })
            .collect()
    }

    /// Callers must have set every eligible field of `id` to plaintext.
    pub fn mark_decoded(&mut self, id: InstanceId) {
        self.decoded.insert(id);
    }

    pub fn unmark_decoded(&mut self, id: InstanceId) {
        self.decoded.remove(&id);
    }

    pub fn is_decoded(&self, id: InstanceId) -> bool {
        self.decoded.contains(&id)
    }

    /// Drop all state held for `id`, including queued restorations.
    pub fn forget(&mut self, id: InstanceId) {
        self.instances.remove(&id);
        self.decoded.remove(&id);
        self.pending.retain(|(instance, _), _| *instance != id);
    }

    pub fn clear(&mut self) {
        self.instances.clear();
        self.decoded.clear();
        self.pending.clear();
    }

    pub fn tracked_instances(&self) -> usize {
        self.instances.len()
    }
}
