use thiserror::Error;

/// Errors raised while lexing, parsing or type-checking a query option expression.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExpressionError {
    #[error("Syntax error at offset {offset} near `{near}`: {message}")]
    Syntax {
        offset: usize,
        near: String,
        message: String,
    },

    #[error("Unknown property `{0}`")]
    UnknownProperty(String),

    #[error("Unknown function `{0}`")]
    UnknownFunction(String),

    #[error("Unknown entity set `{0}`")]
    UnknownEntitySet(String),

    #[error("Unknown enumeration type `{0}`")]
    UnknownEnumeration(String),

    #[error("Invalid enumeration member `{member}` for `{enumeration}`")]
    InvalidEnumMember { enumeration: String, member: String },

    #[error("Incompatible operand types for `{operator}`: {left} and {right}")]
    TypeMismatch {
        operator: String,
        left: String,
        right: String,
    },

    #[error("Function `{function}` expects {expected}, found {found}")]
    InvalidArguments {
        function: String,
        expected: String,
        found: String,
    },

    #[error("Filter expression must be boolean, found {0}")]
    NotBoolean(String),

    #[error("Navigation property `{0}` has no entity set binding")]
    UnboundNavigation(String),

    #[error("Collection `{0}` must be used with any() or all()")]
    CollectionNotQuantified(String),

    #[error("Lambda variable `{0}` is already in scope")]
    DuplicateVariable(String),

    #[error("Expression is nested deeper than {0} levels")]
    TooDeep(usize),
}

impl ExpressionError {
    pub fn syntax(input: &str, offset: usize, message: impl Into<String>) -> Self {
        let offset = offset.min(input.len());
        let near: String = input
            .get(offset..)
            .unwrap_or_default()
            .chars()
            .take(16)
            .collect();
        ExpressionError::Syntax {
            offset,
            near,
            message: message.into(),
        }
    }

    pub fn type_mismatch(operator: impl Into<String>, left: impl ToString, right: impl ToString) -> Self {
        ExpressionError::TypeMismatch {
            operator: operator.into(),
            left: left.to_string(),
            right: right.to_string(),
        }
    }
}
