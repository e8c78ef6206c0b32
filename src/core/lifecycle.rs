//! Lifecycle hook surface between a host persistence engine and listeners.
//!
//! The host owns instances (an identity map) and fires hooks while loading
//! and committing. Listeners get at instances only through [`UnitOfWork`].

use std::fmt;

use crate::core::constants::PATH_SEPARATOR;
use crate::core::entity::Entity;
use crate::error::Result;

/// Stable identity of one managed instance.
///
/// Assigned by the host's identity map; independent of any primary key, so
/// unsaved instances have one too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Dotted path from a root instance to a field (`secret`, `address.street`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath(String);

impl FieldPath {
    /// Path of a field declared directly on the root instance.
    pub fn root(name: &str) -> Self {
        Self(name.to_string())
    }

    /// Path of `name` inside the sub-record at `self`.
    pub fn child(&self, name: &str) -> Self {
        let mut path = String::with_capacity(self.0.len() + name.len() + 1);
        path.push_str(&self.0);
        path.push(PATH_SEPARATOR);
        path.push_str(name);
        Self(path)
    }

    /// Extend an optional prefix: `None` yields a root path.
    pub fn under(prefix: Option<&FieldPath>, name: &str) -> Self {
        match prefix {
            Some(parent) => parent.child(name),
            None => Self::root(name),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(PATH_SEPARATOR)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Access a listener has to the host's current unit of work.
pub trait UnitOfWork {
    /// The live instance for `id`, if the identity map still holds it.
    fn entity_mut(&mut self, id: InstanceId) -> Option<&mut dyn Entity>;

    /// Record `value` as the baseline the host compares `path` against when
    /// computing change sets, so the value is not seen as a pending change.
    fn record_baseline(&mut self, id: InstanceId, path: &FieldPath, value: Option<&str>);
}

/// Hooks fired by the host.
///
/// The host guarantees `on_scheduled_write` fires for every instance with
/// pending changes before `on_write_completed`, and `on_load` fires once per
/// freshly materialized instance. All hooks run synchronously.
pub trait LifecycleSubscriber {
    /// A row was materialized into instance `id`.
    fn on_load(&mut self, uow: &mut dyn UnitOfWork, id: InstanceId) -> Result<()>;

    /// Instance `id` is about to be inserted or updated. May fire more than
    /// once per cycle when the host recomputes change sets.
    fn on_scheduled_write(&mut self, uow: &mut dyn UnitOfWork, id: InstanceId) -> Result<()>;

    /// The write cycle is durably committed.
    fn on_write_completed(&mut self, uow: &mut dyn UnitOfWork) -> Result<()>;

    /// The write cycle failed and the host rolled back. Instances keep their
    /// pending changes and are written again by the next cycle.
    fn on_write_failed(&mut self, _uow: &mut dyn UnitOfWork) {}

    /// Instance `id` left the identity map.
    fn on_detach(&mut self, _id: InstanceId) {}

    /// The identity map was cleared (session boundary).
    fn on_clear(&mut self) {}
}
