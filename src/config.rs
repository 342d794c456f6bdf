use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use validator::Validate;

use crate::entity_set::sql::dialect::SqlDialect;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// How `$search` input is split into terms.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchTokenization {
    /// Whitespace-separated terms with AND / OR / NOT and quoted phrases.
    #[default]
    Words,
    /// The whole input is a single term.
    Phrase,
}

#[derive(Debug, Error)]
#[error("unknown variant `{0}`")]
pub struct UnknownVariant(pub String);

impl FromStr for SearchTokenization {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "words" => Ok(SearchTokenization::Words),
            "phrase" => Ok(SearchTokenization::Phrase),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

impl fmt::Display for SearchTokenization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchTokenization::Words => write!(f, "words"),
            SearchTokenization::Phrase => write!(f, "phrase"),
        }
    }
}

/// Engine configuration with validation
#[derive(Clone, Debug, Validate, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum nesting depth accepted by the filter parser
    #[validate(range(
        min = 1,
        max = 1000,
        message = "Max expression depth must be between 1 and 1000"
    ))]
    pub max_expression_depth: u32,

    /// Whether `$search` terms match case-sensitively
    pub search_case_sensitive: bool,

    pub search_tokenization: SearchTokenization,

    /// Dialect used when rendering SQL outside a live connection (explain output)
    pub sql_dialect: SqlDialect,

    /// Evaluate untranslatable filter/search stages in memory instead of failing
    pub sql_fallback: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_expression_depth: 64,
            search_case_sensitive: false,
            search_tokenization: SearchTokenization::Words,
            sql_dialect: SqlDialect::Sqlite,
            sql_fallback: true,
        }
    }
}

impl EngineConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            max_expression_depth: parse_env_var("ODATA_MAX_EXPRESSION_DEPTH", "64")?,
            search_case_sensitive: parse_env_var("ODATA_SEARCH_CASE_SENSITIVE", "false")?,
            search_tokenization: parse_env_var("ODATA_SEARCH_TOKENIZATION", "words")?,
            sql_dialect: parse_env_var("ODATA_SQL_DIALECT", "sqlite")?,
            sql_fallback: parse_env_var("ODATA_SQL_FALLBACK", "true")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from CLI arguments with validation
    pub fn from_cli(cli: CliConfig) -> Result<Self, ConfigError> {
        let config = Self {
            max_expression_depth: cli.max_expression_depth,
            search_case_sensitive: cli.search_case_sensitive,
            search_tokenization: cli.search_tokenization,
            sql_dialect: cli.sql_dialect,
            sql_fallback: !cli.no_sql_fallback,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from YAML file
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content.to_string(),
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }
}

/// CLI configuration (parsed from command line arguments)
#[derive(Clone, Debug)]
pub struct CliConfig {
    pub max_expression_depth: u32,
    pub search_case_sensitive: bool,
    pub search_tokenization: SearchTokenization,
    pub sql_dialect: SqlDialect,
    pub no_sql_fallback: bool,
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}
