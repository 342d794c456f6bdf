//! Engine configuration loaded from files and the environment.

#[cfg(test)]
mod config_loading_tests {
    use odata_engine::config::{ConfigError, SearchTokenization};
    use odata_engine::entity_set::sql::dialect::SqlDialect;
    use odata_engine::EngineConfig;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_yaml_file_with_partial_settings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "search_tokenization: phrase").unwrap();
        writeln!(file, "sql_dialect: postgres").unwrap();
        writeln!(file, "sql_fallback: false").unwrap();

        let config = EngineConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.search_tokenization, SearchTokenization::Phrase);
        assert_eq!(config.sql_dialect, SqlDialect::Postgres);
        assert!(!config.sql_fallback);
        // untouched fields keep their defaults
        assert_eq!(config.max_expression_depth, 64);
        assert!(!config.search_case_sensitive);
    }

    #[test]
    fn test_yaml_file_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_expression_depth: 0").unwrap();
        assert!(matches!(
            EngineConfig::from_yaml_file(file.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_missing_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(EngineConfig::from_yaml_file(dir.path().join("absent.yaml")).is_err());
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        std::env::set_var("ODATA_SEARCH_CASE_SENSITIVE", "true");
        std::env::set_var("ODATA_SQL_DIALECT", "mysql");
        let config = EngineConfig::from_env();
        std::env::remove_var("ODATA_SEARCH_CASE_SENSITIVE");
        std::env::remove_var("ODATA_SQL_DIALECT");

        let config = config.unwrap();
        assert!(config.search_case_sensitive);
        assert_eq!(config.sql_dialect, SqlDialect::MySql);
        assert!(config.sql_fallback);
    }

    #[test]
    #[serial]
    fn test_environment_rejects_unknown_tokenization() {
        std::env::set_var("ODATA_SEARCH_TOKENIZATION", "ngrams");
        let result = EngineConfig::from_env();
        std::env::remove_var("ODATA_SEARCH_TOKENIZATION");

        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}
