//! What an entity set can do: option capability flags and the behaviour traits
//! a set implements to serve each operation.

use serde::{Deserialize, Serialize};

use super::transaction::Transaction;
use crate::error::ODataError;
use crate::model::entity::{Entity, RawRecord};
use crate::model::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Count,
    Query,
    Read,
    Create,
    Update,
    Delete,
    Filter,
    Search,
    Paginate,
    Sort,
    Expand,
    Select,
}

impl Capability {
    const ALL: [Capability; 12] = [
        Capability::Count,
        Capability::Query,
        Capability::Read,
        Capability::Create,
        Capability::Update,
        Capability::Delete,
        Capability::Filter,
        Capability::Search,
        Capability::Paginate,
        Capability::Sort,
        Capability::Expand,
        Capability::Select,
    ];

    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

/// Set of [`Capability`] flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u16);

impl Capabilities {
    pub fn none() -> Self {
        Capabilities(0)
    }

    pub fn all() -> Self {
        Capability::ALL.into_iter().collect()
    }

    pub fn with(self, capability: Capability) -> Self {
        Capabilities(self.0 | capability.bit())
    }

    pub fn without(self, capability: Capability) -> Self {
        Capabilities(self.0 & !capability.bit())
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL.into_iter().filter(|c| self.contains(*c))
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter().fold(Capabilities::none(), Capabilities::with)
    }
}

/// Lazy, finite stream of query results.
pub type EntityIter<'t> = Box<dyn Iterator<Item = Result<Entity, ODataError>> + 't>;

pub trait Countable {
    /// Number of records matching filter and search, ignoring paging.
    fn count(&self, tx: &Transaction<'_>) -> Result<u64, ODataError>;
}

pub trait Queryable {
    fn query<'t>(&'t self, tx: &'t Transaction<'t>) -> Result<EntityIter<'t>, ODataError>;
}

pub trait Readable {
    fn read(&self, tx: &Transaction<'_>, key: &Value) -> Result<Entity, ODataError>;
}

pub trait Creatable {
    /// Inserts a validated record and returns the stored entity with its assigned key.
    fn create(&self, tx: &Transaction<'_>, record: RawRecord) -> Result<Entity, ODataError>;
}

pub trait Updatable {
    fn update(&self, tx: &Transaction<'_>, key: &Value, changes: RawRecord) -> Result<Entity, ODataError>;
}

pub trait Deletable {
    fn delete(&self, tx: &Transaction<'_>, key: &Value) -> Result<(), ODataError>;
}
