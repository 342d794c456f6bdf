//! Per-request state: the target entity set, its parsed query options and an
//! optional request body. Entity sets are shared and stateless per call; every
//! operation receives the transaction.

use log::debug;
use std::sync::Arc;

use super::capabilities::{Capability, EntityIter};
use super::options::{QueryOptions, RawQueryOptions};
use crate::config::EngineConfig;
use crate::entity_set::EntitySet;
use crate::error::ODataError;
use crate::expression::parser::parse_literal;
use crate::model::entity::{validate_body, BodyMode, Entity, RawRecord};
use crate::model::value::Value;
use crate::model::Model;

#[derive(Debug)]
pub struct Transaction<'m> {
    model: &'m Model,
    entity_set: Arc<dyn EntitySet>,
    options: QueryOptions,
    body: Option<RawRecord>,
}

impl<'m> Transaction<'m> {
    /// Resolves `entity_set` and parses `raw` against it.
    pub fn new(model: &'m Model, entity_set: &str, raw: &RawQueryOptions) -> Result<Self, ODataError> {
        let set = model
            .entity_set(entity_set)
            .ok_or_else(|| ODataError::NotFound(format!("Entity set `{}` not found", entity_set)))?
            .clone();
        let options = QueryOptions::parse(model, set.as_ref(), raw)?;
        Ok(Self::from_options(model, set, options))
    }

    pub fn from_options(model: &'m Model, entity_set: Arc<dyn EntitySet>, options: QueryOptions) -> Self {
        Self {
            model,
            entity_set,
            options,
            body: None,
        }
    }

    pub fn with_body(mut self, body: RawRecord) -> Self {
        self.body = Some(body);
        self
    }

    pub fn model(&self) -> &'m Model {
        self.model
    }

    pub fn config(&self) -> &'m EngineConfig {
        self.model.config()
    }

    pub fn entity_set(&self) -> &Arc<dyn EntitySet> {
        &self.entity_set
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    pub fn body(&self) -> Option<&RawRecord> {
        self.body.as_ref()
    }

    pub fn require_body(&self) -> Result<&RawRecord, ODataError> {
        self.body
            .as_ref()
            .ok_or_else(|| ODataError::bad_request("missing_body", "A request body is required"))
    }

    fn ensure(&self, capability: Capability, operation: &str) -> Result<(), ODataError> {
        if self.entity_set.capabilities().contains(capability) {
            Ok(())
        } else {
            Err(self.not_allowed(operation))
        }
    }

    fn not_allowed(&self, operation: &str) -> ODataError {
        ODataError::MethodNotAllowed(format!("{} on entity set `{}`", operation, self.entity_set.name()))
    }

    /// Number of entities matching filter and search.
    pub fn count(&self) -> Result<u64, ODataError> {
        self.ensure(Capability::Count, "count")?;
        let countable = self.entity_set.as_countable().ok_or_else(|| self.not_allowed("count"))?;
        countable.count(self)
    }

    /// Runs the query, then expands and projects each result.
    pub fn query(&self) -> Result<EntityIter<'_>, ODataError> {
        self.ensure(Capability::Query, "query")?;
        let queryable = self.entity_set.as_queryable().ok_or_else(|| self.not_allowed("query"))?;
        let results = queryable.query(self)?;
        Ok(Box::new(results.map(move |item| self.finish(item?))))
    }

    pub fn collect(&self) -> Result<Vec<Entity>, ODataError> {
        self.query()?.collect()
    }

    pub fn read(&self, key: &Value) -> Result<Entity, ODataError> {
        self.ensure(Capability::Read, "read")?;
        let readable = self.entity_set.as_readable().ok_or_else(|| self.not_allowed("read"))?;
        let entity = readable.read(self, key)?;
        self.finish(entity)
    }

    /// Validates the body and creates an entity from it.
    pub fn create(&self) -> Result<Entity, ODataError> {
        self.ensure(Capability::Create, "create")?;
        let creatable = self.entity_set.as_creatable().ok_or_else(|| self.not_allowed("create"))?;
        let record = validate_body(self.entity_set.entity_type(), self.require_body()?, BodyMode::Create)
            .map_err(ODataError::invalid_body)?;
        let entity = creatable.create(self, record)?;
        debug!("Created {:?} in {}", entity.id(), self.entity_set.name());
        Ok(entity)
    }

    /// Applies the body as a partial update. The key property in the body is ignored.
    pub fn update(&self, key: &Value) -> Result<Entity, ODataError> {
        self.ensure(Capability::Update, "update")?;
        let updatable = self.entity_set.as_updatable().ok_or_else(|| self.not_allowed("update"))?;
        let changes = validate_body(self.entity_set.entity_type(), self.require_body()?, BodyMode::Update)
            .map_err(ODataError::invalid_body)?;
        updatable.update(self, key, changes)
    }

    pub fn delete(&self, key: &Value) -> Result<(), ODataError> {
        self.ensure(Capability::Delete, "delete")?;
        let deletable = self.entity_set.as_deletable().ok_or_else(|| self.not_allowed("delete"))?;
        deletable.delete(self, key)?;
        debug!("Deleted {} from {}", key, self.entity_set.name());
        Ok(())
    }

    /// Parses a key segment literal such as `42` or `'lhr'` into the key property's type.
    pub fn parse_key(&self, raw: &str) -> Result<Value, ODataError> {
        let entity_type = self.entity_set.entity_type();
        let key = entity_type
            .key()
            .ok_or_else(|| ODataError::NotFound(format!("Entity set `{}` has no key", self.entity_set.name())))?;
        let literal = parse_literal(self.model, raw)?;
        key.property_type()
            .element()
            .coerce_value(key.name(), &literal)
            .map_err(|e| ODataError::bad_request("invalid_key", e.to_string()))
    }

    fn finish(&self, mut entity: Entity) -> Result<Entity, ODataError> {
        for request in &self.options.expand {
            self.model.expand_entity(&mut entity, request)?;
        }
        if let Some(names) = &self.options.select {
            entity.retain_properties(names);
        }
        Ok(entity)
    }
}
