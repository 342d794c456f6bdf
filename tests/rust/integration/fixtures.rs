//! The airline model shared by the integration tests, loadable both in memory
//! and mirrored into SQLite.

use serde_json::Value as JsonValue;
use std::sync::Arc;

use odata_engine::entity_set::sql::connection::ConnectionProvider;
use odata_engine::entity_set::sql::sqlite::SqliteProvider;
use odata_engine::entity_set::sql::SqlEntitySet;
use odata_engine::model::ModelDocument;
use odata_engine::query::Capabilities;
use odata_engine::{EngineConfig, Model, RawQueryOptions, Transaction};

pub const AIRLINE_MODEL: &str = r#"
enumerations:
  - name: Priorities
    flags: true
    members:
      - { name: low, value: 1 }
      - { name: medium, value: 2 }
      - { name: high, value: 4 }

entity_types:
  - name: Country
    key: id
    properties:
      - { name: id, type: Edm.Int32, nullable: false }
      - { name: name, type: Edm.String, searchable: true }
    navigation:
      - name: airports
        target: Airport
        collection: true
        constraint: { property: id, referenced_property: country_id }

  - name: Airport
    key: id
    properties:
      - { name: id, type: Edm.Int32, nullable: false }
      - { name: code, type: Edm.String, nullable: false, searchable: true }
      - { name: name, type: Edm.String, searchable: true }
      - { name: country_id, type: Edm.Int32 }
      - { name: construction_date, type: Edm.Date }
      - { name: is_big, type: Edm.Boolean }
      - { name: review_score, type: Edm.Double }

  - name: Flight
    key: id
    properties:
      - { name: id, type: Edm.Int32, nullable: false }
      - { name: origin, type: Edm.String }
      - { name: destination, type: Edm.String }
      - { name: gate, type: Edm.Int32 }
      - { name: priority, type: Priorities }
    navigation:
      - name: originAirport
        target: Airport
        constraint: { property: origin, referenced_property: code }
      - name: destinationAirport
        target: Airport
        constraint: { property: destination, referenced_property: code }

  - name: Turnaround
    key: id
    properties:
      - { name: id, type: Edm.Int32, nullable: false }
      - { name: flight_id, type: Edm.Int32 }
      - { name: took, type: Edm.Duration }

entity_sets:
  - name: countries
    type: Country
    records:
      - { id: 1, name: UK }
      - { id: 2, name: France }
      - { id: 3, name: Spain }
    bindings:
      - { navigation: airports, target: airports }

  - name: airports
    type: Airport
    records:
      - { id: 1, code: lhr, name: Heathrow, country_id: 1, construction_date: "1946-03-25", is_big: true, review_score: 4.2 }
      - { id: 2, code: lgw, name: Gatwick, country_id: 1, construction_date: "1958-06-09", is_big: false, review_score: null }
      - { id: 3, code: cdg, name: Charles de Gaulle, country_id: 2, construction_date: "1974-03-08", is_big: true, review_score: 3.9 }
      - { id: 4, code: sfo, name: San Francisco, country_id: null, construction_date: "1927-05-07", is_big: true, review_score: 4.5 }

  - name: flights
    type: Flight
    records:
      - { id: 1, origin: lhr, destination: cdg, gate: 12, priority: "low,high" }
      - { id: 2, origin: lgw, destination: sfo, gate: null, priority: null }
      - { id: 3, origin: cdg, destination: lhr, gate: 3, priority: high }
      - { id: 4, origin: sfo, destination: lhr, gate: 40, priority: medium }
    bindings:
      - { navigation: originAirport, target: airports }
      - { navigation: destinationAirport, target: airports }

  - name: turnarounds
    type: Turnaround
    records:
      - { id: 1, flight_id: 1, took: PT9M }
      - { id: 2, flight_id: 3, took: PT10M }
      - { id: 3, flight_id: 4, took: PT1H5M }
      - { id: 4, flight_id: 2, took: null }
"#;

const AIRLINE_SCHEMA: &str = r#"
CREATE TABLE countries (id INTEGER PRIMARY KEY, name TEXT);
CREATE TABLE airports (
    id INTEGER PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    name TEXT,
    country_id INTEGER REFERENCES countries(id),
    construction_date TEXT,
    is_big BOOLEAN,
    review_score REAL
);
CREATE TABLE flights (
    id INTEGER PRIMARY KEY,
    origin TEXT REFERENCES airports(code),
    destination TEXT REFERENCES airports(code),
    gate INTEGER,
    priority INTEGER
);
CREATE TABLE turnarounds (id INTEGER PRIMARY KEY, flight_id INTEGER, took TEXT);
INSERT INTO countries (id, name) VALUES (1, 'UK'), (2, 'France'), (3, 'Spain');
INSERT INTO airports VALUES
    (1, 'lhr', 'Heathrow', 1, '1946-03-25', 1, 4.2),
    (2, 'lgw', 'Gatwick', 1, '1958-06-09', 0, NULL),
    (3, 'cdg', 'Charles de Gaulle', 2, '1974-03-08', 1, 3.9),
    (4, 'sfo', 'San Francisco', NULL, '1927-05-07', 1, 4.5);
INSERT INTO flights VALUES
    (1, 'lhr', 'cdg', 12, 5),
    (2, 'lgw', 'sfo', NULL, NULL),
    (3, 'cdg', 'lhr', 3, 4),
    (4, 'sfo', 'lhr', 40, 2);
INSERT INTO turnarounds VALUES (1, 1, 'PT9M'), (2, 3, 'PT10M'), (3, 4, 'PT1H5M'), (4, 2, NULL);
"#;

pub fn memory_model() -> Model {
    memory_model_with_config(EngineConfig::default())
}

pub fn memory_model_with_config(config: EngineConfig) -> Model {
    ModelDocument::from_yaml_str(AIRLINE_MODEL)
        .unwrap()
        .build(Some(config))
        .unwrap()
}

/// The same sets and records, each backed by a table in one SQLite database.
pub fn sql_model() -> Model {
    sql_model_with_config(EngineConfig::default())
}

pub fn sql_model_with_config(config: EngineConfig) -> Model {
    let types = memory_model();
    let provider = SqliteProvider::in_memory().unwrap();
    provider.execute_batch(AIRLINE_SCHEMA).unwrap();
    let provider: Arc<dyn ConnectionProvider> = Arc::new(provider);

    let mut builder = Model::builder().config(config);
    for set in types.entity_sets() {
        let sql_set = SqlEntitySet::new(set.name(), set.name(), set.entity_type().clone(), provider.clone())
            .with_capabilities(Capabilities::all());
        builder = builder.entity_set(Arc::new(sql_set));
    }
    for (source, navigation) in [
        ("countries", "airports"),
        ("flights", "originAirport"),
        ("flights", "destinationAirport"),
    ] {
        let target = types.navigation_target(source, navigation).unwrap();
        builder = builder.bind(source, navigation, target);
    }
    builder.build().unwrap()
}

pub fn options(pairs: &[(&str, &str)]) -> RawQueryOptions {
    RawQueryOptions::from_pairs(pairs.iter().copied()).unwrap()
}

/// Runs a query and returns the serialized entities.
pub fn query_json(model: &Model, set: &str, pairs: &[(&str, &str)]) -> Vec<JsonValue> {
    let tx = Transaction::new(model, set, &options(pairs)).unwrap();
    tx.collect()
        .unwrap()
        .iter()
        .map(|entity| serde_json::to_value(entity).unwrap())
        .collect()
}

/// Values of `property` across `entities`, in order.
pub fn column(entities: &[JsonValue], property: &str) -> Vec<JsonValue> {
    entities.iter().map(|e| e[property].clone()).collect()
}
