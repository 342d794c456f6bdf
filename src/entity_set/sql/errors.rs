use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqlError {
    /// The construct has no SQL translation; callers may evaluate it in memory instead.
    #[error("Cannot translate to SQL: {0}")]
    Unsupported(String),

    #[error("Unknown column for property `{0}`")]
    UnknownProperty(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Statement execution failed")]
    Execution(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Unexpected result: {0}")]
    UnexpectedResult(String),
}

impl From<sqlx::Error> for SqlError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::Configuration(e) => SqlError::Connection(e.to_string()),
            sqlx::Error::Io(e) => SqlError::Connection(e.to_string()),
            pool @ (sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed) => SqlError::Connection(pool.to_string()),
            other => SqlError::Execution(Box::new(other)),
        }
    }
}
