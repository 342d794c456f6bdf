//! OData v4 query-expression and entity-set execution core.
//!
//! Query option strings (`$filter`, `$search`, `$orderby`, `$skip`, `$top`,
//! `$select`, `$expand`, `$count`) are parsed into typed trees against an entity
//! data [`model::Model`], then executed either in memory by
//! [`entity_set::collection::CollectionEntitySet`] or pushed down to SQL by
//! [`entity_set::sql::SqlEntitySet`].

pub mod config;
pub mod entity_set;
pub mod error;
pub mod expression;
pub mod model;
pub mod query;

#[cfg(test)]
pub(crate) mod testing;

pub use config::EngineConfig;
pub use error::ODataError;
pub use model::{Entity, Model, ModelBuilder, Value};
pub use query::{RawQueryOptions, Transaction};
