//! SQLite connection provider backed by sqlx.
//!
//! The engine API is synchronous, so the provider owns a current-thread tokio
//! runtime and blocks on each statement. A single connection is shared behind a
//! mutex; `sqlite::memory:` databases live as long as the provider.

use chrono::SecondsFormat;
use log::{debug, info};
use parking_lot::{Mutex, MutexGuard};
use serde_json::Value as JsonValue;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Column, Connection, Row, TypeInfo, ValueRef};
use std::fmt;
use std::str::FromStr;
use tokio::runtime::Runtime;

use super::compiler::{decimal_to_f64, SqlStatement};
use super::connection::{ConnectionProvider, ExecuteOutcome, SqlConnection};
use super::dialect::SqlDialect;
use super::errors::SqlError;
use crate::model::entity::RawRecord;
use crate::model::value::{format_duration, Value};

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

pub struct SqliteProvider {
    url: String,
    runtime: Runtime,
    connection: Mutex<SqliteConnection>,
}

impl fmt::Debug for SqliteProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteProvider").field("url", &self.url).finish()
    }
}

impl SqliteProvider {
    /// Opens `url` (e.g. `sqlite://flights.db`), creating the file if missing.
    pub fn open(url: &str) -> Result<Self, SqlError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SqlError::Connection(format!("failed to start runtime: {}", e)))?;
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let connection = runtime.block_on(SqliteConnection::connect_with(&options))?;
        info!("Opened SQLite database {}", url);
        Ok(Self {
            url: url.to_string(),
            runtime,
            connection: Mutex::new(connection),
        })
    }

    pub fn in_memory() -> Result<Self, SqlError> {
        Self::open("sqlite::memory:")
    }

    /// Runs a script of `;`-separated statements, e.g. schema setup.
    pub fn execute_batch(&self, script: &str) -> Result<(), SqlError> {
        let mut connection = self.connection.lock();
        self.runtime
            .block_on(sqlx::raw_sql(script).execute(&mut *connection))?;
        Ok(())
    }
}

impl ConnectionProvider for SqliteProvider {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Sqlite
    }

    fn acquire(&self) -> Result<Box<dyn SqlConnection + '_>, SqlError> {
        Ok(Box::new(SqliteSession {
            runtime: &self.runtime,
            connection: self.connection.lock(),
        }))
    }
}

struct SqliteSession<'p> {
    runtime: &'p Runtime,
    connection: MutexGuard<'p, SqliteConnection>,
}

impl SqliteSession<'_> {
    fn prepare<'q>(statement: &'q SqlStatement) -> SqliteQuery<'q> {
        statement
            .params
            .iter()
            .fold(sqlx::query(&statement.sql), bind_value)
    }
}

impl SqlConnection for SqliteSession<'_> {
    fn query(&mut self, statement: &SqlStatement) -> Result<Vec<RawRecord>, SqlError> {
        debug!("sqlite query: {}", statement.sql);
        let query = Self::prepare(statement);
        let rows = self.runtime.block_on(query.fetch_all(&mut *self.connection))?;
        rows.iter().map(decode_row).collect()
    }

    fn execute(&mut self, statement: &SqlStatement) -> Result<ExecuteOutcome, SqlError> {
        debug!("sqlite execute: {}", statement.sql);
        let query = Self::prepare(statement);
        let result = self.runtime.block_on(query.execute(&mut *self.connection))?;
        Ok(ExecuteOutcome {
            rows_affected: result.rows_affected(),
            last_insert_id: Some(result.last_insert_rowid()),
        })
    }
}

fn bind_value<'q>(query: SqliteQuery<'q>, value: &Value) -> SqliteQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Boolean(b) => query.bind(*b),
        Value::Integer(i) => query.bind(*i),
        Value::Decimal(d) => query.bind(decimal_to_f64(d)),
        Value::Double(d) => query.bind(*d),
        Value::String(s) => query.bind(s.clone()),
        Value::Date(d) => query.bind(d.format("%Y-%m-%d").to_string()),
        // fixed precision keeps stored timestamps comparable as text
        Value::DateTimeOffset(dt) => query.bind(dt.to_utc().to_rfc3339_opts(SecondsFormat::Micros, true)),
        Value::TimeOfDay(t) => query.bind(t.format("%H:%M:%S%.f").to_string()),
        Value::Duration(d) => query.bind(format_duration(d)),
        Value::Guid(g) => query.bind(g.hyphenated().to_string()),
        Value::Enum(e) => query.bind(e.value()),
        Value::Collection(_) => query.bind(value.to_json().to_string()),
    }
}

fn decode_row(row: &SqliteRow) -> Result<RawRecord, SqlError> {
    let mut record = RawRecord::new();
    for (i, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(i)?;
        let value = if raw.is_null() {
            JsonValue::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" | "BOOLEAN" => JsonValue::from(row.try_get::<i64, _>(i)?),
                "REAL" => serde_json::Number::from_f64(row.try_get::<f64, _>(i)?)
                    .map(JsonValue::Number)
                    .unwrap_or(JsonValue::Null),
                "TEXT" | "DATE" | "TIME" | "DATETIME" => JsonValue::String(row.try_get::<String, _>(i)?),
                other => {
                    return Err(SqlError::UnexpectedResult(format!(
                        "column `{}` holds unsupported type {}",
                        column.name(),
                        other
                    )))
                }
            }
        };
        record.insert(column.name().to_string(), value);
    }
    Ok(record)
}
