//! Entity sets backed by SQL tables.
//!
//! Filter and search are compiled to SQL when every construct translates. If
//! either cannot be pushed down, the set selects the rows matching whatever did
//! translate and runs the remaining stages through the in-memory pipeline.
//! Ordering and paging are pushed only when everything before them was and
//! the ordering itself translates.

pub mod compiler;
pub mod connection;
pub mod dialect;
pub mod errors;
pub mod function_registry;
pub mod joins;
pub mod sqlite;

use log::{debug, warn};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use uuid::Uuid;

use self::compiler::{SelectParts, SqlBuilder, SqlStatement, SqlTable, ROOT_ALIAS};
use self::connection::{ConnectionProvider, SqlConnection};
use self::dialect::SqlDialect;
use self::errors::SqlError;
use super::EntitySet;
use crate::error::ODataError;
use crate::model::entity::{Entity, RawRecord};
use crate::model::entity_type::{DeclaredProperty, EntityType};
use crate::model::types::PrimitiveType;
use crate::model::value::Value;
use crate::model::Model;
use crate::query::capabilities::{
    Countable, Creatable, Deletable, EntityIter, Queryable, Readable, Updatable,
};
use crate::query::pipeline::{self, Stages};
use crate::query::{Capabilities, QueryOptions, Transaction};

#[derive(Debug)]
pub struct SqlEntitySet {
    name: String,
    entity_type: Arc<EntityType>,
    table: String,
    provider: Arc<dyn ConnectionProvider>,
    capabilities: Capabilities,
}

/// Filter and search conditions that compiled, and which stages remain for the pipeline.
struct Pushdown<'t> {
    conditions: Vec<String>,
    residual: Stages<'t>,
}

impl<'t> Pushdown<'t> {
    fn complete(&self) -> bool {
        self.residual.filter.is_none() && self.residual.search.is_none()
    }
}

impl SqlEntitySet {
    pub fn new(
        name: &str,
        table: &str,
        entity_type: Arc<EntityType>,
        provider: Arc<dyn ConnectionProvider>,
    ) -> Self {
        Self {
            name: name.to_string(),
            entity_type,
            table: table.to_string(),
            provider,
            capabilities: Capabilities::all(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn table(&self) -> SqlTable {
        SqlTable {
            name: self.table.clone(),
            entity_type: self.entity_type.clone(),
        }
    }

    fn dialect(&self) -> SqlDialect {
        self.provider.dialect()
    }

    /// Tables of the SQL sets sharing this set's database.
    fn resolver<'m>(&'m self, model: &'m Model) -> impl Fn(&str) -> Option<SqlTable> + 'm {
        move |name| {
            model
                .entity_set(name)
                .and_then(|set| set.as_sql())
                .filter(|set| std::ptr::addr_eq(Arc::as_ptr(&set.provider), Arc::as_ptr(&self.provider)))
                .map(SqlEntitySet::table)
        }
    }

    fn push_down<'t>(
        &self,
        builder: &mut SqlBuilder<'_>,
        options: &'t QueryOptions,
        tx: &Transaction<'_>,
    ) -> Result<Pushdown<'t>, ODataError> {
        let mut pushdown = Pushdown {
            conditions: Vec::new(),
            residual: Stages::from_options(options),
        };
        let config = tx.config();

        if let Some(filter) = &options.filter {
            match builder.attempt(|b| b.compile_filter(filter)) {
                Ok(condition) => {
                    pushdown.conditions.push(condition);
                    pushdown.residual.filter = None;
                }
                Err(SqlError::Unsupported(reason)) => self.fall_back("$filter", reason, config.sql_fallback)?,
                Err(e) => return Err(e.into()),
            }
        }
        if let Some(search) = &options.search {
            match builder.attempt(|b| b.compile_search(search, config.search_case_sensitive)) {
                Ok(condition) => {
                    pushdown.conditions.push(condition);
                    pushdown.residual.search = None;
                }
                Err(SqlError::Unsupported(reason)) => self.fall_back("$search", reason, config.sql_fallback)?,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(pushdown)
    }

    fn fall_back(&self, option: &str, reason: String, allowed: bool) -> Result<(), ODataError> {
        if !allowed {
            return Err(ODataError::NotImplemented(reason));
        }
        warn!(
            "{} on {} cannot be pushed down ({}); evaluating in memory",
            option, self.name, reason
        );
        Ok(())
    }

    fn materialize(&self, rows: Vec<RawRecord>) -> Result<Vec<Entity>, ODataError> {
        rows.iter()
            .map(|row| Entity::from_record(&self.entity_type, row).map_err(ODataError::from))
            .collect()
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

    fn key_condition(&self, builder: &mut SqlBuilder<'_>, key: &Value) -> Result<String, ODataError> {
        let property = self.key_property()?;
        let column = format!(
            "{}.{}",
            self.dialect().quote(ROOT_ALIAS),
            self.dialect().quote(property.column())
        );
        Ok(format!("({} = {})", column, builder.bind(key.clone())))
    }

    fn select_by_key(&self, connection: &mut dyn SqlConnection, key: &Value) -> Result<Option<Entity>, ODataError> {
        let no_joins = |_: &str| -> Option<SqlTable> { None };
        let mut builder = SqlBuilder::new(self.dialect(), self.table(), &no_joins);
        let condition = self.key_condition(&mut builder, key)?;
        let statement = builder.select_statement(SelectParts {
            conditions: vec![condition],
            ..Default::default()
        });
        let rows = connection.query(&statement)?;
        Ok(self.materialize(rows)?.into_iter().next())
    }

    /// Typed values for the declared properties present in `record`.
    fn assignments<'a>(&'a self, record: &RawRecord) -> Result<Vec<(&'a DeclaredProperty, Value)>, ODataError> {
        self.entity_type
            .declared_properties()
            .iter()
            .filter_map(|property| record.get(property.name()).map(|raw| (property, raw)))
            .map(|(property, raw)| {
                let value = property
                    .property_type()
                    .coerce(property.name(), raw)
                    .map_err(ODataError::invalid_body)?;
                Ok((property, value))
            })
            .collect()
    }
}

impl EntitySet for SqlEntitySet {
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

    fn as_sql(&self) -> Option<&SqlEntitySet> {
        Some(self)
    }
}

impl Queryable for SqlEntitySet {
    fn query<'t>(&'t self, tx: &'t Transaction<'t>) -> Result<EntityIter<'t>, ODataError> {
        let options = tx.options();
        let resolve = self.resolver(tx.model());
        let mut builder = SqlBuilder::new(self.dialect(), self.table(), &resolve);
        let mut pushdown = self.push_down(&mut builder, options, tx)?;

        let order_by = if pushdown.complete() {
            match builder.compile_orderby(&options.orderby) {
                Ok(order_by) => Some(order_by),
                Err(SqlError::Unsupported(reason)) => {
                    self.fall_back("$orderby", reason, tx.config().sql_fallback)?;
                    None
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            None
        };
        let parts = match order_by {
            Some(order_by) => {
                pushdown.residual = pushdown.residual.unpaged();
                SelectParts {
                    order_by,
                    skip: options.skip,
                    top: options.top,
                    conditions: pushdown.conditions,
                }
            }
            None => {
                debug!("Partial pushdown for {}; ordering and paging run in memory", self.name);
                SelectParts {
                    order_by: builder.compile_orderby(&[])?,
                    conditions: pushdown.conditions,
                    ..Default::default()
                }
            }
        };
        let statement = builder.select_statement(parts);
        let rows = self.provider.acquire()?.query(&statement)?;
        let entities = self.materialize(rows)?;

        let source: EntityIter<'t> = Box::new(entities.into_iter().map(Ok));
        if pushdown.residual.is_empty() {
            return Ok(source);
        }
        pipeline::run(tx, source, pushdown.residual)
    }
}

impl Countable for SqlEntitySet {
    fn count(&self, tx: &Transaction<'_>) -> Result<u64, ODataError> {
        let options = tx.options();
        let resolve = self.resolver(tx.model());
        let mut builder = SqlBuilder::new(self.dialect(), self.table(), &resolve);
        let pushdown = self.push_down(&mut builder, options, tx)?;

        if pushdown.complete() {
            let statement = builder.count_statement(&pushdown.conditions);
            let rows = self.provider.acquire()?.query(&statement)?;
            return rows
                .first()
                .and_then(|row| row.get("count"))
                .and_then(JsonValue::as_u64)
                .ok_or_else(|| SqlError::UnexpectedResult("COUNT(*) returned no row".into()).into());
        }

        let statement = builder.select_statement(SelectParts {
            conditions: pushdown.conditions,
            ..Default::default()
        });
        let rows = self.provider.acquire()?.query(&statement)?;
        let source: EntityIter<'_> = Box::new(self.materialize(rows)?.into_iter().map(Ok));
        pipeline::count(tx, source, pushdown.residual)
    }
}

impl Readable for SqlEntitySet {
    fn read(&self, _tx: &Transaction<'_>, key: &Value) -> Result<Entity, ODataError> {
        let key = self.normalize_key(key)?;
        let mut connection = self.provider.acquire()?;
        self.select_by_key(&mut *connection, &key)?
            .ok_or_else(|| self.not_found(&key))
    }
}

impl Creatable for SqlEntitySet {
    fn create(&self, _tx: &Transaction<'_>, mut record: RawRecord) -> Result<Entity, ODataError> {
        let key = self.entity_type.key().ok_or_else(|| {
            ODataError::bad_request(
                "keyless_entity_set",
                format!("Entity set `{}` has no key and cannot create entities", self.name),
            )
        })?;
        let key_missing = record.get(key.name()).is_none_or(JsonValue::is_null);
        if key_missing && *key.property_type().element() == PrimitiveType::Guid {
            record.insert(key.name().to_string(), JsonValue::String(Uuid::new_v4().to_string()));
        }

        let dialect = self.dialect();
        let no_joins = |_: &str| -> Option<SqlTable> { None };
        let mut builder = SqlBuilder::new(dialect, self.table(), &no_joins);
        let assignments = self.assignments(&record)?;
        let sql = if assignments.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", dialect.quote(&self.table))
        } else {
            let columns: Vec<String> = assignments.iter().map(|(p, _)| dialect.quote(p.column())).collect();
            let placeholders: Vec<String> = assignments
                .iter()
                .map(|(_, value)| builder.bind(value.clone()))
                .collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                dialect.quote(&self.table),
                columns.join(", "),
                placeholders.join(", ")
            )
        };
        let statement = builder.finish(sql);

        let mut connection = self.provider.acquire()?;
        let outcome = connection.execute(&statement)?;
        let id = match assignments.iter().find(|(p, _)| p.name() == key.name()) {
            Some((_, value)) if !value.is_null() => value.clone(),
            _ => outcome
                .last_insert_id
                .map(Value::Integer)
                .ok_or_else(|| SqlError::UnexpectedResult("no generated key reported".into()))?,
        };
        debug!("Inserted {} into {}", id, self.table);
        self.select_by_key(&mut *connection, &id)?
            .ok_or_else(|| SqlError::UnexpectedResult(format!("inserted row {} not found", id)).into())
    }
}

impl Updatable for SqlEntitySet {
    fn update(&self, _tx: &Transaction<'_>, key: &Value, changes: RawRecord) -> Result<Entity, ODataError> {
        let key = self.normalize_key(key)?;
        let dialect = self.dialect();
        let assignments = self.assignments(&changes)?;
        let mut connection = self.provider.acquire()?;

        if !assignments.is_empty() {
            let no_joins = |_: &str| -> Option<SqlTable> { None };
            let mut builder = SqlBuilder::new(dialect, self.table(), &no_joins);
            let sets: Vec<String> = assignments
                .iter()
                .map(|(p, value)| format!("{} = {}", dialect.quote(p.column()), builder.bind(value.clone())))
                .collect();
            let key_column = dialect.quote(self.key_property()?.column());
            let key_placeholder = builder.bind(key.clone());
            let sql = format!(
                "UPDATE {} SET {} WHERE {} = {}",
                dialect.quote(&self.table),
                sets.join(", "),
                key_column,
                key_placeholder
            );
            let outcome = connection.execute(&builder.finish(sql))?;
            if outcome.rows_affected == 0 {
                return Err(self.not_found(&key));
            }
        }
        self.select_by_key(&mut *connection, &key)?
            .ok_or_else(|| self.not_found(&key))
    }
}

impl Deletable for SqlEntitySet {
    fn delete(&self, _tx: &Transaction<'_>, key: &Value) -> Result<(), ODataError> {
        let key = self.normalize_key(key)?;
        let dialect = self.dialect();
        let no_joins = |_: &str| -> Option<SqlTable> { None };
        let mut builder = SqlBuilder::new(dialect, self.table(), &no_joins);
        let key_placeholder = builder.bind(key.clone());
        let sql = format!(
            "DELETE FROM {} WHERE {} = {}",
            dialect.quote(&self.table),
            dialect.quote(self.key_property()?.column()),
            key_placeholder
        );
        let outcome = self
            .provider
            .acquire()?
            .execute(&builder.finish(sql))
            .map_err(|e| ODataError::internal("deletion_error", e))?;
        if outcome.rows_affected == 0 {
            return Err(self.not_found(&key));
        }
        Ok(())
    }
}

/// The statement the pushdown layer emits for `options` over `entity_set`, for
/// the model's configured dialect. Set names stand in for table names unless the
/// set is SQL-backed. Fails when any option cannot be translated.
pub fn explain(model: &Model, entity_set: &str, options: &QueryOptions) -> Result<SqlStatement, ODataError> {
    let resolve = |name: &str| -> Option<SqlTable> {
        let set = model.entity_set(name)?;
        Some(match set.as_sql() {
            Some(sql) => sql.table(),
            None => SqlTable {
                name: name.to_string(),
                entity_type: set.entity_type().clone(),
            },
        })
    };
    let table = resolve(entity_set)
        .ok_or_else(|| ODataError::NotFound(format!("Entity set `{}` not found", entity_set)))?;
    let config = model.config();
    let mut builder = SqlBuilder::new(config.sql_dialect, table, &resolve);

    let mut conditions = Vec::new();
    if let Some(filter) = &options.filter {
        conditions.push(builder.compile_filter(filter)?);
    }
    if let Some(search) = &options.search {
        conditions.push(builder.compile_search(search, config.search_case_sensitive)?);
    }
    let order_by = builder.compile_orderby(&options.orderby)?;
    Ok(builder.select_statement(SelectParts {
        conditions,
        order_by,
        skip: options.skip,
        top: options.top,
    }))
}
