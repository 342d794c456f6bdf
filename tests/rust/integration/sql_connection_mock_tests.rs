//! SQL entity sets driving a mocked connection: the statements sent for each
//! operation, and how driver results and failures come back.

#[cfg(test)]
mod sql_connection_mock_tests {
    use crate::fixtures;
    use mockall::mock;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::fmt;
    use std::sync::{Arc, Mutex};

    use odata_engine::entity_set::sql::compiler::SqlStatement;
    use odata_engine::entity_set::sql::connection::{ConnectionProvider, ExecuteOutcome, SqlConnection};
    use odata_engine::entity_set::sql::dialect::SqlDialect;
    use odata_engine::entity_set::sql::errors::SqlError;
    use odata_engine::entity_set::sql::SqlEntitySet;
    use odata_engine::model::RawRecord;
    use odata_engine::{Model, RawQueryOptions, Transaction, Value};

    mock! {
        pub Connection {}
        impl SqlConnection for Connection {
            fn query(&mut self, statement: &SqlStatement) -> Result<Vec<RawRecord>, SqlError>;
            fn execute(&mut self, statement: &SqlStatement) -> Result<ExecuteOutcome, SqlError>;
        }
    }

    /// Hands out the scripted connections in order.
    struct ScriptedProvider {
        dialect: SqlDialect,
        connections: Mutex<VecDeque<MockConnection>>,
    }

    impl fmt::Debug for ScriptedProvider {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("ScriptedProvider").field("dialect", &self.dialect).finish()
        }
    }

    impl ConnectionProvider for ScriptedProvider {
        fn dialect(&self) -> SqlDialect {
            self.dialect
        }

        fn acquire(&self) -> Result<Box<dyn SqlConnection + '_>, SqlError> {
            let connection = self
                .connections
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| SqlError::Connection("no scripted connection left".into()))?;
            Ok(Box::new(connection))
        }
    }

    fn record(value: serde_json::Value) -> RawRecord {
        value.as_object().cloned().unwrap()
    }

    fn flight_row(id: i64, origin: &str, gate: i64) -> RawRecord {
        record(json!({"id": id, "origin": origin, "destination": "lhr", "gate": gate, "priority": 4}))
    }

    fn flights_model(dialect: SqlDialect, connections: Vec<MockConnection>) -> Model {
        let types = fixtures::memory_model();
        let provider = Arc::new(ScriptedProvider {
            dialect,
            connections: Mutex::new(connections.into()),
        });
        let flights = SqlEntitySet::new(
            "flights",
            "flight_log",
            types.entity_type("Flight").unwrap().clone(),
            provider,
        );
        Model::builder()
            .entity_type(types.entity_type("Airport").unwrap().clone())
            .entity_set(Arc::new(flights))
            .build()
            .unwrap()
    }

    fn tx<'m>(model: &'m Model, pairs: &[(&str, &str)]) -> Transaction<'m> {
        Transaction::new(model, "flights", &fixtures::options(pairs)).unwrap()
    }

    #[test]
    fn test_count_is_a_single_statement() {
        let mut connection = MockConnection::new();
        connection
            .expect_query()
            .withf(|statement| {
                statement.sql
                    == "SELECT COUNT(*) AS \"count\" FROM \"flight_log\" AS \"$it\" \
                        WHERE ((\"$it\".\"gate\" > $1) AND (STRPOS(\"$it\".\"origin\", $2) > 0))"
                    && statement.params == vec![Value::Integer(10), Value::String("l".into())]
            })
            .times(1)
            .returning(|_| Ok(vec![record(json!({"count": 2}))]));

        let model = flights_model(SqlDialect::Postgres, vec![connection]);
        let tx = tx(&model, &[("$filter", "gate gt 10 and contains(origin, 'l')")]);
        assert_eq!(tx.count().unwrap(), 2);
    }

    #[test]
    fn test_ordering_and_paging_are_pushed_down() {
        let mut connection = MockConnection::new();
        connection
            .expect_query()
            .withf(|statement| {
                statement.sql.ends_with(
                    "FROM \"flight_log\" AS \"$it\" \
                     ORDER BY \"$it\".\"gate\" DESC NULLS LAST, \"$it\".\"id\" ASC NULLS FIRST LIMIT 1 OFFSET 2",
                ) && statement.params.is_empty()
            })
            .times(1)
            .returning(|_| Ok(vec![flight_row(1, "lhr", 12)]));

        let model = flights_model(SqlDialect::Postgres, vec![connection]);
        let found = tx(&model, &[("$orderby", "gate desc"), ("$skip", "2"), ("$top", "1")])
            .collect()
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get("gate"), Some(&Value::Integer(12)));
    }

    #[test]
    fn test_partial_pushdown_pages_in_memory() {
        let mut connection = MockConnection::new();
        connection
            .expect_query()
            .withf(|statement| !statement.sql.contains("WHERE") && !statement.sql.contains("LIMIT"))
            .times(1)
            .returning(|_| {
                Ok(vec![
                    flight_row(1, "lhr", 12),
                    flight_row(2, "lgw", 9),
                    flight_row(3, "cdg", 3),
                ])
            });

        let model = flights_model(SqlDialect::Sqlite, vec![connection]);
        let found = tx(&model, &[("$filter", "matchesPattern(origin, '^l')"), ("$skip", "1")])
            .collect()
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_create_inserts_then_reselects_on_one_connection() {
        let mut connection = MockConnection::new();
        let mut sequence = mockall::Sequence::new();
        connection
            .expect_execute()
            .withf(|statement| {
                statement.sql == "INSERT INTO \"flight_log\" (\"id\", \"origin\", \"gate\") VALUES (?1, ?2, ?3)"
                    && statement.params == vec![Value::Integer(9), Value::String("lhr".into()), Value::Integer(5)]
            })
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| {
                Ok(ExecuteOutcome {
                    rows_affected: 1,
                    last_insert_id: Some(9),
                })
            });
        connection
            .expect_query()
            .withf(|statement| {
                statement.sql.ends_with("WHERE (\"$it\".\"id\" = ?1)") && statement.params == vec![Value::Integer(9)]
            })
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Ok(vec![flight_row(9, "lhr", 5)]));

        let model = flights_model(SqlDialect::Sqlite, vec![connection]);
        let created = Transaction::new(&model, "flights", &RawQueryOptions::default())
            .unwrap()
            .with_body(record(json!({"id": 9, "origin": "lhr", "gate": 5})))
            .create()
            .unwrap();
        assert_eq!(created.id(), Some(&Value::Integer(9)));
        assert_eq!(created.get("destination"), Some(&Value::String("lhr".into())));
    }

    #[test]
    fn test_driver_failures() {
        let mut failing_query = MockConnection::new();
        failing_query
            .expect_query()
            .returning(|_| Err(SqlError::Connection("connection reset".into())));
        let mut failing_delete = MockConnection::new();
        failing_delete
            .expect_execute()
            .returning(|_| Err(SqlError::UnexpectedResult("constraint failed".into())));
        let mut nothing_deleted = MockConnection::new();
        nothing_deleted.expect_execute().returning(|_| Ok(ExecuteOutcome::default()));

        let model = flights_model(
            SqlDialect::Sqlite,
            vec![failing_query, failing_delete, nothing_deleted],
        );
        let tx = tx(&model, &[]);

        let err = tx.collect().unwrap_err();
        assert_eq!(err.code(), "store_error");
        assert_eq!(err.status_code(), 500);

        let err = tx.delete(&Value::Integer(1)).unwrap_err();
        assert_eq!(err.code(), "deletion_error");

        assert_eq!(tx.delete(&Value::Integer(1)).unwrap_err().status_code(), 404);

        // every scripted connection is used up
        assert_eq!(tx.count().unwrap_err().status_code(), 500);
    }
}
