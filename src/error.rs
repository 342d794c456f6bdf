use thiserror::Error;

use crate::entity_set::sql::errors::SqlError;
use crate::expression::errors::ExpressionError;
use crate::model::errors::ModelError;

/// Request-level error, classified for the protocol layer.
///
/// Client-class variants describe malformed or unsupported requests. Server-class
/// variants wrap store and model failures; their display text never includes the
/// underlying driver message, which stays reachable through `source()`.
#[derive(Debug, Error)]
pub enum ODataError {
    #[error(transparent)]
    Expression(#[from] ExpressionError),

    #[error("{message}")]
    BadRequest { code: &'static str, message: String },

    #[error("The {0} query option is not supported by this entity set")]
    UnsupportedOption(&'static str),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Internal server error ({code})")]
    Internal {
        code: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ODataError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        ODataError::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn internal(
        code: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        ODataError::Internal {
            code,
            source: source.into(),
        }
    }

    /// Wraps a model error raised while validating a request body.
    pub fn invalid_body(error: ModelError) -> Self {
        ODataError::bad_request("invalid_body", error.to_string())
    }

    /// HTTP status code a protocol layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            ODataError::Expression(_)
            | ODataError::BadRequest { .. }
            | ODataError::UnsupportedOption(_) => 400,
            ODataError::NotFound(_) => 404,
            ODataError::MethodNotAllowed(_) => 405,
            ODataError::NotImplemented(_) => 501,
            ODataError::Internal { .. } => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &str {
        match self {
            ODataError::Expression(_) => "invalid_expression",
            ODataError::BadRequest { code, .. } => code,
            ODataError::UnsupportedOption(_) => "unsupported_query_option",
            ODataError::MethodNotAllowed(_) => "method_not_allowed",
            ODataError::NotFound(_) => "not_found",
            ODataError::NotImplemented(_) => "not_implemented",
            ODataError::Internal { code, .. } => code,
        }
    }
}

impl From<SqlError> for ODataError {
    fn from(error: SqlError) -> Self {
        match error {
            SqlError::Unsupported(reason) => ODataError::NotImplemented(reason),
            other => ODataError::internal("store_error", other),
        }
    }
}

impl From<ModelError> for ODataError {
    fn from(error: ModelError) -> Self {
        ODataError::internal("model_error", error)
    }
}
