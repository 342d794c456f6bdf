//! Building models from YAML documents and the validation applied on the way.

#[cfg(test)]
mod model_document_tests {
    use odata_engine::model::{ModelDocument, ModelError};
    use odata_engine::query::Capability;
    use odata_engine::{Model, RawQueryOptions, Transaction, Value};
    use std::io::Write;

    const AIRPORTS: &str = r#"
enumerations:
  - name: Size
    members:
      - { name: small, value: 0 }
      - { name: large, value: 1 }
entity_types:
  - name: Airport
    key: id
    properties:
      - { name: id, type: Edm.Int32, nullable: false }
      - { name: code, type: Edm.String, nullable: false, searchable: true }
      - { name: size, type: Size }
      - { name: opened, type: Edm.Date, source: opened_on }
entity_sets:
  - name: airports
    type: Airport
    capabilities: [query, read, filter, count]
    records:
      - { id: 1, code: lhr, size: large, opened: "1946-03-25" }
      - { id: 2, code: lcy, size: small, opened: "1987-10-26" }
"#;

    fn build(document: &str) -> Result<Model, ModelError> {
        ModelDocument::from_yaml_str(document)?.build(None)
    }

    #[test]
    fn test_records_and_enumerations() {
        let model = build(AIRPORTS).unwrap();
        assert!(model.enumeration("Size").is_some());

        let raw = RawQueryOptions {
            filter: Some("size eq Size'large' and opened lt 1950-01-01".into()),
            count: Some("true".into()),
            ..Default::default()
        };
        let tx = Transaction::new(&model, "airports", &raw).unwrap();
        let found = tx.collect().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get("code"), Some(&Value::String("lhr".into())));
        assert_eq!(tx.count().unwrap(), 1);
    }

    #[test]
    fn test_capabilities_from_document() {
        let model = build(AIRPORTS).unwrap();
        let airports = model.entity_set("airports").unwrap();
        assert!(airports.capabilities().contains(Capability::Count));
        assert!(!airports.capabilities().contains(Capability::Search));

        let raw = RawQueryOptions {
            search: Some("lhr".into()),
            ..Default::default()
        };
        let err = Transaction::new(&model, "airports", &raw).unwrap_err();
        assert_eq!(err.code(), "unsupported_query_option");
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(AIRPORTS.as_bytes()).unwrap();
        let model = ModelDocument::from_yaml_file(file.path()).unwrap().build(None).unwrap();
        assert_eq!(model.entity_sets().count(), 1);
    }

    #[test]
    fn test_invalid_documents() {
        assert!(matches!(
            ModelDocument::from_yaml_str("entity_types: [ {name: "),
            Err(ModelError::Parse(_))
        ));

        let unknown_type = "entity_sets:\n  - { name: things, type: Thing }\n";
        assert_eq!(
            build(unknown_type).unwrap_err(),
            ModelError::UnknownEntityType("Thing".into())
        );

        let searchable_number = r#"
entity_types:
  - name: T
    key: id
    properties:
      - { name: id, type: Edm.Int32, nullable: false, searchable: true }
entity_sets:
  - { name: ts, type: T }
"#;
        assert!(matches!(
            build(searchable_number),
            Err(ModelError::InvalidSearchableProperty { .. })
        ));

        let bad_record = r#"
entity_types:
  - name: T
    key: id
    properties:
      - { name: id, type: Edm.Int32, nullable: false }
entity_sets:
  - name: ts
    type: T
    records:
      - { id: "not a number" }
"#;
        assert!(matches!(build(bad_record), Err(ModelError::InvalidValue { .. })));
    }

    #[test]
    fn test_binding_must_match_target_type() {
        let document = r#"
entity_types:
  - name: City
    key: id
    properties:
      - { name: id, type: Edm.Int32, nullable: false }
  - name: Street
    key: id
    properties:
      - { name: id, type: Edm.Int32, nullable: false }
      - { name: city_id, type: Edm.Int32 }
    navigation:
      - name: city
        target: City
        constraint: { property: city_id, referenced_property: id }
entity_sets:
  - { name: cities, type: City }
  - name: streets
    type: Street
    bindings:
      - { navigation: city, target: streets }
"#;
        assert!(matches!(build(document), Err(ModelError::BindingTypeMismatch { .. })));
    }
}
