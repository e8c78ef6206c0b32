//! Test fixtures: table declarations, typed entities and a minimal host.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use fieldvault::core::cipher::{AgeEncryptor, Encryptor, HexEncryptor};
use fieldvault::core::config::Config;
use fieldvault::core::document::Schema;
use fieldvault::core::entity::{AsAny, Entity, Mapping};
use fieldvault::core::keys::KeyRing;
use fieldvault::core::lifecycle::{FieldPath, InstanceId, UnitOfWork};
use fieldvault::core::metadata::MetadataCache;
use fieldvault::core::orchestrator::Orchestrator;
use fieldvault::core::types::FieldValue;

/// Tables appended to a freshly initialized `.fieldvault.toml`.
pub const USER_TABLES: &str = r#"
[tables.users]
encrypted = { secret = "default" }
embedded = { address = "address" }

[tables.address]
embeddable = true
encrypted = { street = "default" }

[tables.logs]
"#;

/// Parsed form of [`USER_TABLES`].
pub fn user_schema() -> Arc<Schema> {
    let mut toml = String::from("[fieldvault]\nversion = \"0.1.0\"\n");
    toml.push_str(USER_TABLES);
    let config: Config = toml::from_str(&toml).expect("fixture config parses");
    config.schema()
}

pub fn hex() -> Arc<HexEncryptor> {
    Arc::new(HexEncryptor::new())
}

pub fn orchestrator(encryptor: Option<Arc<dyn Encryptor>>) -> Orchestrator {
    Orchestrator::new(Arc::new(MetadataCache::new()), encryptor)
}

/// An age backend with a fresh `default` key under `dir`.
pub fn age(dir: &Path) -> Arc<AgeEncryptor> {
    KeyRing::generate_at(&dir.join("default.key")).expect("failed to generate key");
    let mut ring = KeyRing::new(dir);
    ring.insert("default", "default.key");
    Arc::new(AgeEncryptor::new(ring))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Address {
    pub street: Option<String>,
    pub zip: String,
}

impl Entity for Address {
    fn entity_type(&self) -> &str {
        "Address"
    }

    fn mapping(&self) -> Mapping {
        Mapping::new().plain("zip").encrypted::<Address>(
            "street",
            "default",
            |a| a.street.as_deref(),
            |a, v| a.street = v,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct User {
    pub name: String,
    pub secret: Option<String>,
    pub note: Option<String>,
    pub address: Option<Address>,
}

impl User {
    pub fn new(secret: &str) -> Self {
        Self {
            name: "ada".to_string(),
            secret: Some(secret.to_string()),
            ..Self::default()
        }
    }
}

impl Entity for User {
    fn entity_type(&self) -> &str {
        "User"
    }

    fn mapping(&self) -> Mapping {
        Mapping::new()
            .plain("name")
            .encrypted::<User>(
                "secret",
                "default",
                |u| u.secret.as_deref(),
                |u, v| u.secret = v,
            )
            .encrypted::<User>("note", "notes", |u| u.note.as_deref(), |u, v| u.note = v)
            .embedded::<User>("address", |u| u.address.as_mut().map(|a| a as &mut dyn Entity))
    }
}

/// Identity map for typed entities.
#[derive(Default)]
pub struct Host {
    entities: BTreeMap<InstanceId, Box<dyn Entity>>,
    pub baselines: HashMap<(InstanceId, String), FieldValue>,
}

impl Host {
    pub fn with(entity: impl Entity) -> (Self, InstanceId) {
        let mut host = Self::default();
        let id = InstanceId::new(1);
        host.entities.insert(id, Box::new(entity));
        (host, id)
    }

    pub fn get<T: Entity>(&self, id: InstanceId) -> &T {
        let entity: &dyn Entity = &*self.entities[&id];
        AsAny::as_any(entity)
            .downcast_ref::<T>()
            .expect("fixture type mismatch")
    }

    pub fn get_mut<T: Entity>(&mut self, id: InstanceId) -> &mut T {
        let entity: &mut dyn Entity = &mut **self.entities.get_mut(&id).expect("unknown id");
        AsAny::as_any_mut(entity)
            .downcast_mut::<T>()
            .expect("fixture type mismatch")
    }

    pub fn baseline(&self, id: InstanceId, path: &str) -> Option<&FieldValue> {
        self.baselines.get(&(id, path.to_string()))
    }
}

impl UnitOfWork for Host {
    fn entity_mut(&mut self, id: InstanceId) -> Option<&mut dyn Entity> {
        self.entities.get_mut(&id).map(|b| &mut **b)
    }

    fn record_baseline(&mut self, id: InstanceId, path: &FieldPath, value: Option<&str>) {
        self.baselines
            .insert((id, path.to_string()), value.map(str::to_owned));
    }
}
