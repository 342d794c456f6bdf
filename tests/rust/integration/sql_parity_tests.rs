//! The SQLite-backed sets must return exactly what the in-memory sets return
//! for the same records and query options.

#[cfg(test)]
mod sql_parity_tests {
    use crate::fixtures;
    use odata_engine::entity_set::sql::explain;
    use odata_engine::{EngineConfig, Model, Transaction};
    use test_case::test_case;

    fn assert_parity(memory: &Model, sql: &Model, set: &str, pairs: &[(&str, &str)]) {
        let expected = fixtures::query_json(memory, set, pairs);
        let actual = fixtures::query_json(sql, set, pairs);
        assert_eq!(actual, expected, "{} {:?}", set, pairs);

        let raw = fixtures::options(pairs);
        let memory_count = Transaction::new(memory, set, &raw).unwrap().count().unwrap();
        let sql_count = Transaction::new(sql, set, &raw).unwrap().count().unwrap();
        assert_eq!(sql_count, memory_count, "count of {} {:?}", set, pairs);
    }

    #[test_case("airports", "name eq 'Heathrow'" ; "equality")]
    #[test_case("airports", "review_score gt 4" ; "null comparison")]
    #[test_case("airports", "is_big eq true and construction_date lt 1950-01-01" ; "boolean and date")]
    #[test_case("airports", "contains(tolower(name), 'an')" ; "string functions")]
    #[test_case("airports", "country_id eq null or review_score lt 4" ; "null literal")]
    #[test_case("airports", "not (is_big eq false)" ; "negation")]
    #[test_case("flights", "originAirport/code eq 'lhr'" ; "navigation")]
    #[test_case("flights", "destinationAirport/country_id ne 1" ; "navigation to null")]
    #[test_case("flights", "gate add 1 gt 10" ; "arithmetic")]
    #[test_case("flights", "gate mod 2 eq 0" ; "modulo")]
    #[test_case("flights", "priority has Priorities'high'" ; "flags")]
    #[test_case("flights", "priority eq Priorities'medium'" ; "enum equality")]
    #[test_case("flights", "origin in ('lhr', 'sfo')" ; "in list")]
    #[test_case("airports", "endswith(name, 'row')" ; "endswith")]
    #[test_case("airports", "endswith(name, '')" ; "endswith empty suffix")]
    #[test_case("airports", "endswith(name, 'Heathrow Airport')" ; "endswith longer suffix")]
    #[test_case("turnarounds", "took eq duration'PT10M'" ; "duration equality")]
    #[test_case("turnarounds", "took lt duration'PT10M'" ; "duration less than")]
    #[test_case("turnarounds", "took ge duration'PT10M' or flight_id eq 1" ; "duration in disjunction")]
    #[test_case("countries", "airports/any(d:d/name eq 'Gatwick')" ; "any")]
    #[test_case("countries", "airports/all(d:d/is_big eq true)" ; "all over empty")]
    #[test_case("countries", "airports/any()" ; "any without predicate")]
    #[test_case("countries", "airports/any(d:d/review_score gt 4 and d/country_id eq $it/id)" ; "root reference")]
    fn test_filter_parity(set: &str, filter: &str) {
        let memory = fixtures::memory_model();
        let sql = fixtures::sql_model();
        assert_parity(&memory, &sql, set, &[("$filter", filter)]);
    }

    #[test_case("airports", &[("$orderby", "name desc"), ("$top", "2")] ; "order and top")]
    #[test_case("flights", &[("$orderby", "gate"), ("$skip", "1")] ; "nulls first and skip")]
    #[test_case("airports", &[("$orderby", "is_big desc, code"), ("$skip", "1"), ("$top", "2")] ; "two keys")]
    #[test_case("airports", &[("$top", "18446744073709551615")] ; "top beyond signed range")]
    #[test_case("airports", &[("$skip", "18446744073709551615")] ; "skip beyond signed range")]
    #[test_case("airports", &[("$skip", "1"), ("$top", "9223372036854775808")] ; "skip and huge top")]
    #[test_case("turnarounds", &[("$orderby", "took")] ; "duration order")]
    #[test_case("turnarounds", &[("$orderby", "took desc"), ("$skip", "1"), ("$top", "2")] ; "duration order and paging")]
    #[test_case("airports", &[("$search", "an")] ; "search term")]
    #[test_case("airports", &[("$search", "heath OR (gat AND NOT x)")] ; "search operators")]
    #[test_case("airports", &[("$search", "LHR"), ("$filter", "is_big")] ; "search and filter")]
    #[test_case("countries", &[("$search", "a"), ("$orderby", "name"), ("$top", "1")] ; "search order top")]
    fn test_option_parity(set: &str, pairs: &[(&str, &str)]) {
        let memory = fixtures::memory_model();
        let sql = fixtures::sql_model();
        assert_parity(&memory, &sql, set, pairs);
    }

    #[test]
    fn test_untranslatable_filter_falls_back() {
        let memory = fixtures::memory_model();
        let sql = fixtures::sql_model();
        let pairs = [
            ("$filter", "matchesPattern(code, '^l') and is_big eq true"),
            ("$orderby", "code desc"),
            ("$top", "1"),
        ];
        assert_parity(&memory, &sql, "airports", &pairs);
        let found = fixtures::query_json(&sql, "airports", &pairs);
        assert_eq!(fixtures::column(&found, "code"), vec![serde_json::json!("lhr")]);
    }

    #[test]
    fn test_fallback_can_be_disabled() {
        let sql = fixtures::sql_model_with_config(EngineConfig {
            sql_fallback: false,
            ..Default::default()
        });
        let raw = fixtures::options(&[("$filter", "matchesPattern(code, '^l')")]);
        let tx = Transaction::new(&sql, "airports", &raw).unwrap();
        assert_eq!(tx.collect().unwrap_err().status_code(), 501);
        assert_eq!(tx.count().unwrap_err().status_code(), 501);

        // translatable filters are unaffected
        let raw = fixtures::options(&[("$filter", "code eq 'lhr'")]);
        assert_eq!(Transaction::new(&sql, "airports", &raw).unwrap().count().unwrap(), 1);
    }

    #[test]
    fn test_durations_compare_by_length() {
        let sql = fixtures::sql_model();
        let shorter = fixtures::query_json(&sql, "turnarounds", &[("$filter", "took lt duration'PT10M'")]);
        assert_eq!(fixtures::column(&shorter, "id"), vec![serde_json::json!(1)]);

        let ordered = fixtures::query_json(&sql, "turnarounds", &[("$orderby", "took")]);
        assert_eq!(
            fixtures::column(&ordered, "took"),
            vec![
                serde_json::Value::Null,
                serde_json::json!("PT9M"),
                serde_json::json!("PT10M"),
                serde_json::json!("PT1H5M"),
            ]
        );
    }

    #[test]
    fn test_duration_ordering_needs_fallback() {
        let sql = fixtures::sql_model_with_config(EngineConfig {
            sql_fallback: false,
            ..Default::default()
        });
        let raw = fixtures::options(&[("$orderby", "took")]);
        let tx = Transaction::new(&sql, "turnarounds", &raw).unwrap();
        assert_eq!(tx.collect().unwrap_err().status_code(), 501);
        assert_eq!(explain(&sql, "turnarounds", tx.options()).unwrap_err().status_code(), 501);
        // counting ignores ordering
        assert_eq!(tx.count().unwrap(), 4);

        let raw = fixtures::options(&[("$filter", "took eq duration'PT9M'")]);
        assert_eq!(Transaction::new(&sql, "turnarounds", &raw).unwrap().count().unwrap(), 1);
    }

    #[test]
    fn test_explain_over_sql_sets() {
        let sql = fixtures::sql_model();
        let raw = fixtures::options(&[("$filter", "airports/any(d:d/is_big)"), ("$top", "5")]);
        let tx = Transaction::new(&sql, "countries", &raw).unwrap();
        let statement = explain(&sql, "countries", tx.options()).unwrap();
        assert!(statement.sql.starts_with("SELECT \"$it\".\"id\" AS \"id\""));
        assert!(statement.sql.contains("EXISTS (SELECT 1 FROM \"airports\" AS \"d\""));
        assert!(statement.sql.ends_with("LIMIT 5"));
    }
}
