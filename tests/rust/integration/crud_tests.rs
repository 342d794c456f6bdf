//! Create, read, update and delete through transactions, on both storage backends.

#[cfg(test)]
mod crud_tests {
    use crate::fixtures;
    use odata_engine::model::RawRecord;
    use odata_engine::{Model, RawQueryOptions, Transaction, Value};
    use serde_json::json;
    use test_case::test_case;

    fn body(value: serde_json::Value) -> RawRecord {
        value.as_object().cloned().unwrap()
    }

    fn tx<'m>(model: &'m Model, set: &str) -> Transaction<'m> {
        Transaction::new(model, set, &RawQueryOptions::default()).unwrap()
    }

    #[test_case(fixtures::memory_model ; "memory")]
    #[test_case(fixtures::sql_model ; "sqlite")]
    fn test_create_generates_next_integer_key(build: fn() -> Model) {
        let model = build();
        let created = tx(&model, "airports")
            .with_body(body(json!({"code": "jfk", "name": "John F. Kennedy", "is_big": true})))
            .create()
            .unwrap();
        assert_eq!(created.id(), Some(&Value::Integer(5)));
        assert_eq!(created.get("review_score"), Some(&Value::Null));

        let read = tx(&model, "airports").read(&Value::Integer(5)).unwrap();
        assert_eq!(read.get("code"), Some(&Value::String("jfk".into())));
        assert_eq!(read.get("is_big"), Some(&Value::Boolean(true)));
    }

    #[test_case(fixtures::memory_model ; "memory")]
    #[test_case(fixtures::sql_model ; "sqlite")]
    fn test_update_is_partial(build: fn() -> Model) {
        let model = build();
        let updated = tx(&model, "flights")
            .with_body(body(json!({"id": 99, "gate": 7, "priority": "high,medium"})))
            .update(&Value::Integer(2))
            .unwrap();
        assert_eq!(updated.id(), Some(&Value::Integer(2)));
        assert_eq!(updated.get("gate"), Some(&Value::Integer(7)));
        assert_eq!(updated.get("origin"), Some(&Value::String("lgw".into())));
        assert_eq!(serde_json::to_value(&updated).unwrap()["priority"], json!("medium,high"));

        let raw = fixtures::options(&[("$filter", "priority has Priorities'medium'")]);
        let found = Transaction::new(&model, "flights", &raw).unwrap().collect().unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test_case(fixtures::memory_model ; "memory")]
    #[test_case(fixtures::sql_model ; "sqlite")]
    fn test_missing_entities(build: fn() -> Model) {
        let model = build();
        let airports = tx(&model, "airports").with_body(body(json!({"name": "Nowhere"})));
        assert_eq!(airports.read(&Value::Integer(42)).unwrap_err().status_code(), 404);
        assert_eq!(airports.update(&Value::Integer(42)).unwrap_err().status_code(), 404);
        assert_eq!(airports.delete(&Value::Integer(42)).unwrap_err().status_code(), 404);
    }

    #[test_case(fixtures::memory_model ; "memory")]
    #[test_case(fixtures::sql_model ; "sqlite")]
    fn test_invalid_bodies(build: fn() -> Model) {
        let model = build();
        let cases = [
            json!({"name": "No code"}),
            json!({"code": "xyz", "runway": 3}),
            json!({"code": "xyz", "is_big": "very"}),
        ];
        for case in cases {
            let err = tx(&model, "airports").with_body(body(case.clone())).create().unwrap_err();
            assert_eq!(err.code(), "invalid_body", "{}", case);
            assert_eq!(err.status_code(), 400);
        }
        assert_eq!(tx(&model, "airports").create().unwrap_err().code(), "missing_body");
    }

    #[test_case(fixtures::memory_model ; "memory")]
    #[test_case(fixtures::sql_model ; "sqlite")]
    fn test_delete_then_query(build: fn() -> Model) {
        let model = build();
        tx(&model, "flights").delete(&Value::Integer(3)).unwrap();
        let remaining = fixtures::query_json(&model, "flights", &[]);
        assert_eq!(fixtures::column(&remaining, "id"), vec![json!(1), json!(2), json!(4)]);
    }

    #[test]
    fn test_key_segments() {
        let model = fixtures::sql_model();
        let airports = tx(&model, "airports");
        let key = airports.parse_key("3").unwrap();
        assert_eq!(airports.read(&key).unwrap().get("code"), Some(&Value::String("cdg".into())));
        assert_eq!(airports.parse_key("'three'").unwrap_err().code(), "invalid_key");
    }

    #[test]
    fn test_referenced_row_cannot_be_deleted() {
        let model = fixtures::sql_model();
        let err = tx(&model, "airports").delete(&Value::Integer(1)).unwrap_err();
        assert_eq!(err.code(), "deletion_error");
        assert_eq!(err.status_code(), 500);

        // still there
        assert!(tx(&model, "airports").read(&Value::Integer(1)).is_ok());
    }

    #[test]
    fn test_duplicate_key_on_sqlite_is_store_error() {
        let model = fixtures::sql_model();
        let err = tx(&model, "countries")
            .with_body(body(json!({"id": 1, "name": "Elsewhere"})))
            .create()
            .unwrap_err();
        assert_eq!(err.status_code(), 500);
    }
}
