//! Query options evaluated end to end over in-memory entity sets.

#[cfg(test)]
mod collection_query_tests {
    use crate::fixtures::{self, column};
    use odata_engine::config::SearchTokenization;
    use odata_engine::model::ModelDocument;
    use odata_engine::{EngineConfig, Model, Transaction};
    use serde_json::json;
    use test_case::test_case;

    const LETTERS: &str = r#"
entity_types:
  - name: Letter
    properties:
      - { name: name, type: Edm.String, searchable: true }
entity_sets:
  - name: letters
    type: Letter
    records:
      - { name: Alpha }
      - { name: Beta }
      - { name: Charlie }
      - { name: Delta }
      - { name: Echo }
"#;

    fn letters() -> Model {
        ModelDocument::from_yaml_str(LETTERS).unwrap().build(None).unwrap()
    }

    fn names(model: &Model, pairs: &[(&str, &str)]) -> Vec<serde_json::Value> {
        column(&fixtures::query_json(model, "letters", pairs), "name")
    }

    #[test]
    fn test_filter_equality() {
        assert_eq!(names(&letters(), &[("$filter", "name eq 'Alpha'")]), vec![json!("Alpha")]);
    }

    #[test]
    fn test_search_substring() {
        assert_eq!(names(&letters(), &[("$search", "lph")]), vec![json!("Alpha")]);
    }

    #[test]
    fn test_skip_and_top_on_keyless_set() {
        assert_eq!(
            names(&letters(), &[("$skip", "1"), ("$top", "2")]),
            vec![json!("Beta"), json!("Charlie")]
        );
    }

    #[test]
    fn test_count_ignores_paging() {
        let model = letters();
        let raw = fixtures::options(&[("$filter", "name ne 'Echo'"), ("$top", "1"), ("$count", "true")]);
        let tx = Transaction::new(&model, "letters", &raw).unwrap();
        assert_eq!(tx.count().unwrap(), 4);
        assert_eq!(tx.collect().unwrap().len(), 1);
    }

    #[test]
    fn test_lambda_over_related_entities() {
        let model = fixtures::memory_model();
        let found = fixtures::query_json(&model, "countries", &[("$filter", "airports/any(d:d/name eq 'Gatwick')")]);
        assert_eq!(column(&found, "name"), vec![json!("UK")]);

        // Spain has no airports at all
        let found = fixtures::query_json(&model, "countries", &[("$filter", "airports/all(d:d/is_big)")]);
        assert_eq!(column(&found, "name"), vec![json!("France"), json!("Spain")]);

        let found = fixtures::query_json(&model, "countries", &[("$filter", "airports/any()")]);
        assert_eq!(column(&found, "id"), vec![json!(1), json!(2)]);
    }

    #[test_case("originAirport/country_id eq 1", &[1, 2] ; "navigation")]
    #[test_case("gate add 1 gt 10", &[1, 4] ; "arithmetic skips null")]
    #[test_case("gate eq null", &[2] ; "null literal")]
    #[test_case("priority has Priorities'high'", &[1, 3] ; "flags")]
    #[test_case("priority eq Priorities'medium' or destination in ('cdg', 'sfo')", &[1, 2, 4] ; "in and enum")]
    #[test_case("startswith(origin, 'l') and not endswith(destination, 'o')", &[1] ; "string functions")]
    #[test_case("destinationAirport/construction_date lt 1950-01-01", &[2, 3, 4] ; "dates")]
    fn test_flight_filters(filter: &str, expected: &[i64]) {
        let model = fixtures::memory_model();
        let found = fixtures::query_json(&model, "flights", &[("$filter", filter)]);
        let expected: Vec<serde_json::Value> = expected.iter().map(|id| json!(id)).collect();
        assert_eq!(column(&found, "id"), expected);
    }

    #[test]
    fn test_orderby_with_nulls_and_ties() {
        let model = fixtures::memory_model();
        let found = fixtures::query_json(&model, "flights", &[("$orderby", "gate")]);
        assert_eq!(column(&found, "id"), vec![json!(2), json!(3), json!(1), json!(4)]);

        let found = fixtures::query_json(&model, "airports", &[("$orderby", "is_big desc, name")]);
        assert_eq!(column(&found, "code"), vec![json!("cdg"), json!("lhr"), json!("sfo"), json!("lgw")]);
    }

    #[test]
    fn test_search_operators() {
        let model = fixtures::memory_model();
        let found = fixtures::query_json(&model, "airports", &[("$search", "heath OR GAT")]);
        assert_eq!(column(&found, "code"), vec![json!("lhr"), json!("lgw")]);

        let found = fixtures::query_json(&model, "airports", &[("$search", "NOT l")]);
        assert_eq!(column(&found, "code"), vec![json!("sfo")]);

        let found = fixtures::query_json(&model, "airports", &[("$search", "\"de Gaulle\"")]);
        assert_eq!(column(&found, "code"), vec![json!("cdg")]);
    }

    #[test]
    fn test_search_configuration() {
        let model = fixtures::memory_model_with_config(EngineConfig {
            search_case_sensitive: true,
            ..Default::default()
        });
        assert!(fixtures::query_json(&model, "airports", &[("$search", "heath")]).is_empty());
        assert_eq!(fixtures::query_json(&model, "airports", &[("$search", "Heath")]).len(), 1);

        let model = fixtures::memory_model_with_config(EngineConfig {
            search_tokenization: SearchTokenization::Phrase,
            ..Default::default()
        });
        assert!(fixtures::query_json(&model, "airports", &[("$search", "san OR heath")]).is_empty());
        let found = fixtures::query_json(&model, "airports", &[("$search", "san fran")]);
        assert_eq!(column(&found, "code"), vec![json!("sfo")]);
    }

    #[test]
    fn test_option_errors_are_client_errors() {
        let model = fixtures::memory_model();
        for pairs in [
            vec![("$top", "-1")],
            vec![("$orderby", "originAirport/name")],
            vec![("$filter", "gate eq 'x'")],
            vec![("$select", "colour")],
            vec![("$count", "yes")],
        ] {
            let raw = fixtures::options(&pairs);
            let err = Transaction::new(&model, "flights", &raw).unwrap_err();
            assert_eq!(err.status_code(), 400, "{:?}", pairs);
        }
    }
}
