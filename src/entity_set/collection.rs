//! Entity set backed by an in-memory list of records.
//!
//! Records are kept in insertion order as normalized raw maps and materialized
//! into typed entities per query. Every stage runs through the generic pipeline.

use log::debug;
use parking_lot::RwLock;
use std::sync::Arc;
use uuid::Uuid;

use super::EntitySet;
use crate::error::ODataError;
use crate::model::entity::{Entity, RawRecord};
use crate::model::entity_type::{DeclaredProperty, EntityType};
use crate::model::errors::ModelError;
use crate::model::types::PrimitiveType;
use crate::model::value::Value;
use crate::query::capabilities::{
    Countable, Creatable, Deletable, EntityIter, Queryable, Readable, Updatable,
};
use crate::query::pipeline::{self, Stages};
use crate::query::{Capabilities, Transaction};

#[derive(Debug, Clone)]
struct StoredRecord {
    key: Option<Value>,
    record: RawRecord,
}

#[derive(Debug)]
pub struct CollectionEntitySet {
    name: String,
    entity_type: Arc<EntityType>,
    capabilities: Capabilities,
    records: RwLock<Vec<StoredRecord>>,
}

impl CollectionEntitySet {
    pub fn new(name: &str, entity_type: Arc<EntityType>) -> Self {
        Self {
            name: name.to_string(),
            entity_type,
            capabilities: Capabilities::all(),
            records: RwLock::new(Vec::new()),
        }
    }

    /// Seeds the set, normalizing every record through the entity type.
    pub fn with_records(self, records: Vec<RawRecord>) -> Result<Self, ModelError> {
        {
            let mut stored = self.records.write();
            for record in &records {
                let entity = Entity::from_record(&self.entity_type, record)?;
                stored.push(StoredRecord {
                    key: entity.id().cloned(),
                    record: entity.to_record(),
                });
            }
        }
        Ok(self)
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn snapshot(&self) -> EntityIter<'static> {
        let records: Vec<RawRecord> = self.records.read().iter().map(|r| r.record.clone()).collect();
        let entity_type = self.entity_type.clone();
        Box::new(
            records
                .into_iter()
                .map(move |record| Entity::from_record(&entity_type, &record).map_err(ODataError::from)),
        )
    }

    fn key_property(&self) -> Result<&DeclaredProperty, ODataError> {
        self.entity_type
            .key()
            .ok_or_else(|| ODataError::NotFound(format!("Entity set `{}` has no key", self.name)))
    }

    fn normalize_key(&self, key: &Value) -> Result<Value, ODataError> {
        let property = self.key_property()?;
        property
            .property_type()
            .element()
            .coerce_value(property.name(), key)
            .map_err(|e| ODataError::bad_request("invalid_key", e.to_string()))
    }

    fn not_found(&self, key: &Value) -> ODataError {
        ODataError::NotFound(format!("No entity with key {} in `{}`", key, self.name))
    }

    fn generate_key(&self, property: &DeclaredProperty, records: &[StoredRecord]) -> Result<Value, ODataError> {
        let key_type = property.property_type().element();
        if key_type.is_integral() {
            let next = match records.iter().filter_map(|r| r.key.as_ref().and_then(Value::as_i64)).max() {
                None => 0,
                Some(max) => max.checked_add(1).ok_or_else(|| {
                    ODataError::bad_request(
                        "key_exhausted",
                        format!("No key above {} is available in `{}`; provide `{}`", max, self.name, property.name()),
                    )
                })?,
            };
            return Ok(Value::Integer(next));
        }
        if *key_type == PrimitiveType::Guid {
            return Ok(Value::Guid(Uuid::new_v4()));
        }
        Err(ODataError::bad_request(
            "missing_key",
            format!("Key property `{}` must be provided", property.name()),
        ))
    }
}

impl EntitySet for CollectionEntitySet {
    fn name(&self) -> &str {
        &self.name
    }

    fn entity_type(&self) -> &Arc<EntityType> {
        &self.entity_type
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn as_countable(&self) -> Option<&dyn Countable> {
        Some(self)
    }

    fn as_queryable(&self) -> Option<&dyn Queryable> {
        Some(self)
    }

    fn as_readable(&self) -> Option<&dyn Readable> {
        Some(self)
    }

    fn as_creatable(&self) -> Option<&dyn Creatable> {
        Some(self)
    }

    fn as_updatable(&self) -> Option<&dyn Updatable> {
        Some(self)
    }

    fn as_deletable(&self) -> Option<&dyn Deletable> {
        Some(self)
    }
}

impl Countable for CollectionEntitySet {
    fn count(&self, tx: &Transaction<'_>) -> Result<u64, ODataError> {
        pipeline::count(tx, self.snapshot(), Stages::from_options(tx.options()))
    }
}

impl Queryable for CollectionEntitySet {
    fn query<'t>(&'t self, tx: &'t Transaction<'t>) -> Result<EntityIter<'t>, ODataError> {
        pipeline::run(tx, self.snapshot(), Stages::from_options(tx.options()))
    }
}

impl Readable for CollectionEntitySet {
    fn read(&self, _tx: &Transaction<'_>, key: &Value) -> Result<Entity, ODataError> {
        let key = self.normalize_key(key)?;
        let records = self.records.read();
        let stored = records
            .iter()
            .find(|r| r.key.as_ref() == Some(&key))
            .ok_or_else(|| self.not_found(&key))?;
        Ok(Entity::from_record(&self.entity_type, &stored.record)?)
    }
}

impl Creatable for CollectionEntitySet {
    fn create(&self, _tx: &Transaction<'_>, mut record: RawRecord) -> Result<Entity, ODataError> {
        let property = self.entity_type.key().ok_or_else(|| {
            ODataError::bad_request(
                "keyless_entity_set",
                format!("Entity set `{}` has no key and cannot create entities", self.name),
            )
        })?;
        let mut records = self.records.write();
        let key = match record.get(property.name()).filter(|raw| !raw.is_null()) {
            Some(raw) => property
                .property_type()
                .coerce(property.name(), raw)
                .map_err(ODataError::invalid_body)?,
            None => self.generate_key(property, &records)?,
        };
        if records.iter().any(|r| r.key.as_ref() == Some(&key)) {
            return Err(ODataError::bad_request(
                "duplicate_key",
                format!("An entity with key {} already exists in `{}`", key, self.name),
            ));
        }
        record.insert(property.name().to_string(), key.to_json());
        let entity = Entity::from_record(&self.entity_type, &record).map_err(ODataError::invalid_body)?;
        records.push(StoredRecord {
            key: Some(key),
            record: entity.to_record(),
        });
        debug!("{} now holds {} records", self.name, records.len());
        Ok(entity)
    }
}

impl Updatable for CollectionEntitySet {
    fn update(&self, _tx: &Transaction<'_>, key: &Value, changes: RawRecord) -> Result<Entity, ODataError> {
        let key = self.normalize_key(key)?;
        let mut records = self.records.write();
        let stored = records
            .iter_mut()
            .find(|r| r.key.as_ref() == Some(&key))
            .ok_or_else(|| self.not_found(&key))?;
        let mut merged = stored.record.clone();
        for (name, value) in changes {
            merged.insert(name, value);
        }
        let entity = Entity::from_record(&self.entity_type, &merged).map_err(ODataError::invalid_body)?;
        stored.record = entity.to_record();
        Ok(entity)
    }
}

impl Deletable for CollectionEntitySet {
    fn delete(&self, _tx: &Transaction<'_>, key: &Value) -> Result<(), ODataError> {
        let key = self.normalize_key(key)?;
        let mut records = self.records.write();
        let index = records
            .iter()
            .position(|r| r.key.as_ref() == Some(&key))
            .ok_or_else(|| self.not_found(&key))?;
        records.remove(index);
        Ok(())
    }
}
