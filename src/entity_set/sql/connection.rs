//! Connection seam between the SQL entity set and a database driver.

use std::fmt::Debug;

use super::compiler::SqlStatement;
use super::dialect::SqlDialect;
use super::errors::SqlError;
use crate::model::entity::RawRecord;

/// Outcome of a statement that returns no rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecuteOutcome {
    pub rows_affected: u64,
    pub last_insert_id: Option<i64>,
}

/// A live connection. Result rows are keyed by column alias.
pub trait SqlConnection {
    fn query(&mut self, statement: &SqlStatement) -> Result<Vec<RawRecord>, SqlError>;

    fn execute(&mut self, statement: &SqlStatement) -> Result<ExecuteOutcome, SqlError>;
}

/// Hands out connections to the database backing one or more entity sets.
pub trait ConnectionProvider: Send + Sync + Debug {
    fn dialect(&self) -> SqlDialect;

    fn acquire(&self) -> Result<Box<dyn SqlConnection + '_>, SqlError>;
}
