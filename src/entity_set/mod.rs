//! Entity set providers.
//!
//! An [`EntitySet`] names a collection of entities of one type and exposes the
//! behaviours it implements through the `as_*` accessors. Options and operations a
//! set does not support are rejected before it is called.

use std::fmt::Debug;
use std::sync::Arc;

use crate::model::entity_type::EntityType;
use crate::query::capabilities::{Countable, Creatable, Deletable, Queryable, Readable, Updatable};
use crate::query::Capabilities;

pub mod collection;
pub mod sql;

pub trait EntitySet: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn entity_type(&self) -> &Arc<EntityType>;

    fn capabilities(&self) -> Capabilities;

    fn as_countable(&self) -> Option<&dyn Countable> {
        None
    }

    fn as_queryable(&self) -> Option<&dyn Queryable> {
        None
    }

    fn as_readable(&self) -> Option<&dyn Readable> {
        None
    }

    fn as_creatable(&self) -> Option<&dyn Creatable> {
        None
    }

    fn as_updatable(&self) -> Option<&dyn Updatable> {
        None
    }

    fn as_deletable(&self) -> Option<&dyn Deletable> {
        None
    }

    /// The SQL-backed implementation, used to resolve join targets during pushdown.
    fn as_sql(&self) -> Option<&sql::SqlEntitySet> {
        None
    }
}
