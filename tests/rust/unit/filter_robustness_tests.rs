//! Malformed and edge-case `$filter` input must produce errors, never panics.

#[cfg(test)]
mod filter_robustness_tests {
    use odata_engine::expression::{generate_tree, ExpressionError};
    use odata_engine::model::ModelDocument;
    use odata_engine::{EngineConfig, Model, ODataError, RawQueryOptions, Transaction};
    use test_case::test_case;

    const MODEL: &str = r#"
entity_types:
  - name: Item
    key: id
    properties:
      - { name: id, type: Edm.Int32, nullable: false }
      - { name: name, type: Edm.String, searchable: true }
      - { name: price, type: Edm.Decimal }
      - { name: tags, type: Collection(Edm.String) }
entity_sets:
  - name: items
    type: Item
"#;

    fn model() -> Model {
        ModelDocument::from_yaml_str(MODEL).unwrap().build(None).unwrap()
    }

    /// Test that malformed filters don't cause panics
    #[test]
    fn test_malformed_filters_no_panic() {
        let model = model();
        let malformed = vec![
            "",
            "name eq",
            "eq 'x'",
            "(name eq 'x'",
            "name eq 'x')",
            "name eq 'unterminated",
            "name eq 'x' and",
            "not",
            "tags/any(",
            "tags/any(t:",
            "tags/any(t t eq 'a')",
            "contains(name,",
            "contains(name 'x')",
            "name eq x'",
            "\u{0}",
            "((((((((((",
        ];

        for filter in malformed {
            let result = generate_tree(&model, "items", filter);
            assert!(result.is_err(), "`{}` should not parse", filter);
        }
    }

    #[test_case("name eq 'Alpha'" ; "comparison")]
    #[test_case("not (id lt 3) or name ne null" ; "logical")]
    #[test_case("price mul 2 ge 10.5" ; "arithmetic")]
    #[test_case("tags/any(t:startswith(t, 'a'))" ; "primitive lambda")]
    #[test_case("tags/all(t:t ne 'x') and tags/any()" ; "all and empty any")]
    #[test_case("contains(tolower(name), 'lph')" ; "nested functions")]
    #[test_case("name in ('a', 'b')" ; "in operator")]
    fn test_valid_filters_parse(filter: &str) {
        let model = model();
        assert!(generate_tree(&model, "items", filter).is_ok(), "`{}` should parse", filter);
    }

    #[test]
    fn test_missing_operand_is_client_error() {
        let model = model();
        let raw = RawQueryOptions {
            filter: Some("name eq".into()),
            ..Default::default()
        };
        let err = Transaction::new(&model, "items", &raw).unwrap_err();
        assert!(matches!(err, ODataError::Expression(ExpressionError::Syntax { .. })));
        assert_eq!(err.status_code(), 400);
        assert!(err.is_client_error());
    }

    #[test]
    fn test_unknown_names_are_rejected() {
        let model = model();
        assert!(matches!(
            generate_tree(&model, "items", "colour eq 'red'"),
            Err(ExpressionError::UnknownProperty(_))
        ));
        assert!(matches!(
            generate_tree(&model, "items", "frobnicate(name)"),
            Err(ExpressionError::UnknownFunction(_))
        ));
        assert!(generate_tree(&model, "missing", "id eq 1").is_err());
    }

    #[test]
    fn test_deep_nesting_is_bounded() {
        let config = EngineConfig {
            max_expression_depth: 16,
            ..Default::default()
        };
        let model = ModelDocument::from_yaml_str(MODEL).unwrap().build(Some(config)).unwrap();

        let shallow = format!("{}id eq 1{}", "(".repeat(4), ")".repeat(4));
        assert!(generate_tree(&model, "items", &shallow).is_ok());

        let deep = format!("{}id eq 1{}", "(".repeat(200), ")".repeat(200));
        assert!(matches!(
            generate_tree(&model, "items", &deep),
            Err(ExpressionError::TooDeep(16))
        ));
    }
}
