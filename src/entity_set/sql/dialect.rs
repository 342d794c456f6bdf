use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::UnknownVariant;

/// SQL flavour emitted by the pushdown compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    #[default]
    Sqlite,
    Postgres,
    MySql,
}

impl FromStr for SqlDialect {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(SqlDialect::Sqlite),
            "postgres" | "postgresql" => Ok(SqlDialect::Postgres),
            "mysql" => Ok(SqlDialect::MySql),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlDialect::Sqlite => write!(f, "sqlite"),
            SqlDialect::Postgres => write!(f, "postgres"),
            SqlDialect::MySql => write!(f, "mysql"),
        }
    }
}

impl SqlDialect {
    pub fn quote(&self, identifier: &str) -> String {
        match self {
            SqlDialect::MySql => format!("`{}`", identifier.replace('`', "``")),
            _ => format!("\"{}\"", identifier.replace('"', "\"\"")),
        }
    }

    /// Placeholder for the 1-based parameter `index`.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::Sqlite => format!("?{}", index),
            SqlDialect::Postgres => format!("${}", index),
            SqlDialect::MySql => "?".to_string(),
        }
    }

    /// Whether a placeholder may be referenced more than once in a statement.
    pub fn numbered_placeholders(&self) -> bool {
        !matches!(self, SqlDialect::MySql)
    }

    /// `ORDER BY` term with nulls first ascending and last descending.
    pub fn order_term(&self, expression: &str, descending: bool) -> String {
        match (self, descending) {
            (SqlDialect::Postgres, false) => format!("{} ASC NULLS FIRST", expression),
            (SqlDialect::Postgres, true) => format!("{} DESC NULLS LAST", expression),
            (_, false) => format!("{} ASC", expression),
            (_, true) => format!("{} DESC", expression),
        }
    }

    pub fn false_literal(&self) -> &'static str {
        match self {
            SqlDialect::Postgres => "FALSE",
            _ => "0",
        }
    }

    pub fn real_cast(&self, expression: &str) -> String {
        match self {
            SqlDialect::Sqlite => format!("CAST({} AS REAL)", expression),
            SqlDialect::Postgres => format!("CAST({} AS DOUBLE PRECISION)", expression),
            SqlDialect::MySql => format!("CAST({} AS DOUBLE)", expression),
        }
    }

    pub fn integer_division(&self, left: &str, right: &str) -> String {
        match self {
            SqlDialect::MySql => format!("({} DIV {})", left, right),
            _ => format!("({} / {})", left, right),
        }
    }

    pub fn modulo(&self, left: &str, right: &str) -> String {
        match self {
            SqlDialect::Sqlite => format!("({} % {})", left, right),
            _ => format!("MOD({}, {})", left, right),
        }
    }

    /// Case-sensitive substring test.
    pub fn contains(&self, haystack: &str, needle: &str) -> String {
        match self {
            SqlDialect::Postgres => format!("(STRPOS({}, {}) > 0)", haystack, needle),
            _ => format!("(INSTR({}, {}) > 0)", haystack, needle),
        }
    }

    /// Paging clause. Values beyond the signed 64-bit range drivers accept are
    /// clamped, which still selects every remaining row.
    pub fn limit_clause(&self, skip: Option<u64>, top: Option<u64>) -> Option<String> {
        let clamp = |n: u64| n.min(i64::MAX as u64);
        match (skip.map(clamp), top.map(clamp)) {
            (None, None) => None,
            (None, Some(top)) => Some(format!("LIMIT {}", top)),
            (Some(skip), Some(top)) => Some(format!("LIMIT {} OFFSET {}", top, skip)),
            (Some(skip), None) => Some(match self {
                SqlDialect::Sqlite => format!("LIMIT -1 OFFSET {}", skip),
                SqlDialect::Postgres => format!("OFFSET {}", skip),
                SqlDialect::MySql => format!("LIMIT 18446744073709551615 OFFSET {}", skip),
            }),
        }
    }
}
