//! `$expand` and `$select` shaping the serialized results.

#[cfg(test)]
mod expand_select_tests {
    use crate::fixtures;
    use odata_engine::Model;
    use serde_json::json;
    use test_case::test_case;

    #[test_case(fixtures::memory_model ; "memory")]
    #[test_case(fixtures::sql_model ; "sqlite")]
    fn test_single_valued_expand_with_select_keeps_keys(build: fn() -> Model) {
        let model = build();
        let found = fixtures::query_json(
            &model,
            "flights",
            &[
                ("$select", "id,gate"),
                ("$expand", "originAirport($select=code,country_id)"),
                ("$top", "2"),
            ],
        );
        assert_eq!(
            found,
            vec![
                json!({"id": 1, "gate": 12, "originAirport": {"id": 1, "code": "lhr", "country_id": 1}}),
                json!({"id": 2, "gate": null, "originAirport": {"id": 2, "code": "lgw", "country_id": 1}}),
            ]
        );
    }

    #[test_case(fixtures::memory_model ; "memory")]
    #[test_case(fixtures::sql_model ; "sqlite")]
    fn test_collection_expand_with_nested_options(build: fn() -> Model) {
        let model = build();
        let found = fixtures::query_json(
            &model,
            "countries",
            &[("$expand", "airports($orderby=name desc;$top=1;$select=code)")],
        );
        assert_eq!(
            found,
            vec![
                json!({"id": 1, "name": "UK", "airports": [{"id": 1, "code": "lhr"}]}),
                json!({"id": 2, "name": "France", "airports": [{"id": 3, "code": "cdg"}]}),
                json!({"id": 3, "name": "Spain", "airports": []}),
            ]
        );
    }

    #[test]
    fn test_expand_of_null_reference() {
        let model = fixtures::memory_model();
        let found = fixtures::query_json(
            &model,
            "airports",
            &[("$filter", "code eq 'sfo'"), ("$select", "code")],
        );
        assert_eq!(found, vec![json!({"id": 4, "code": "sfo"})]);

        let found = fixtures::query_json(
            &model,
            "flights",
            &[("$filter", "id eq 2"), ("$select", "id"), ("$expand", "destinationAirport($filter=is_big eq false)")],
        );
        assert_eq!(found, vec![json!({"id": 2, "destinationAirport": null})]);
    }

    #[test]
    fn test_unbound_or_unknown_expansions() {
        let model = fixtures::memory_model();
        for expand in ["runways", "airports"] {
            let raw = fixtures::options(&[("$expand", expand)]);
            let err = odata_engine::Transaction::new(&model, "flights", &raw).unwrap_err();
            assert_eq!(err.status_code(), 400, "{}", expand);
        }
    }
}
