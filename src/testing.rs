//! Shared fixture: countries, airports, flights and passengers held in memory.

use serde_json::json;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::entity_set::collection::CollectionEntitySet;
use crate::model::entity::{Entity, RawRecord};
use crate::model::entity_type::{DeclaredProperty, EntityType, NavigationProperty};
use crate::model::enumeration::EnumerationType;
use crate::model::types::{PrimitiveType, PropertyType};
use crate::model::{Model, ModelBuilder};
use crate::query::{Capabilities, Capability, RawQueryOptions, Transaction};

fn records(value: serde_json::Value) -> Vec<RawRecord> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r.as_object().unwrap().clone())
        .collect()
}

pub fn priorities() -> Arc<EnumerationType> {
    Arc::new(
        EnumerationType::new("Priorities")
            .flags(true)
            .with_member("low", 1)
            .with_member("medium", 2)
            .with_member("high", 4),
    )
}

pub fn country_type() -> Arc<EntityType> {
    Arc::new(
        EntityType::new("Country")
            .with_key("id")
            .with_property(DeclaredProperty::primitive("id", PrimitiveType::Int32).nullable(false))
            .with_property(DeclaredProperty::primitive("name", PrimitiveType::String))
            .with_navigation(
                NavigationProperty::new("airports", "Airport")
                    .collection(true)
                    .with_constraint("id", "country_id"),
            ),
    )
}

pub fn airport_type() -> Arc<EntityType> {
    Arc::new(
        EntityType::new("Airport")
            .with_key("id")
            .with_property(DeclaredProperty::primitive("id", PrimitiveType::Int32).nullable(false))
            .with_property(
                DeclaredProperty::primitive("code", PrimitiveType::String)
                    .nullable(false)
                    .searchable(true),
            )
            .with_property(DeclaredProperty::primitive("name", PrimitiveType::String).searchable(true))
            .with_property(DeclaredProperty::primitive("country_id", PrimitiveType::Int32))
            .with_property(DeclaredProperty::primitive("construction_date", PrimitiveType::Date))
            .with_property(DeclaredProperty::primitive("is_big", PrimitiveType::Boolean))
            .with_property(DeclaredProperty::primitive("review_score", PrimitiveType::Double)),
    )
}

pub fn flight_type() -> Arc<EntityType> {
    Arc::new(
        EntityType::new("Flight")
            .with_key("id")
            .with_property(DeclaredProperty::primitive("id", PrimitiveType::Int32).nullable(false))
            .with_property(DeclaredProperty::primitive("origin", PrimitiveType::String))
            .with_property(DeclaredProperty::primitive("destination", PrimitiveType::String))
            .with_property(DeclaredProperty::primitive("gate", PrimitiveType::Int32))
            .with_property(DeclaredProperty::primitive("priority", PrimitiveType::Enum(priorities())))
            .with_navigation(NavigationProperty::new("originAirport", "Airport").with_constraint("origin", "code"))
            .with_navigation(
                NavigationProperty::new("destinationAirport", "Airport").with_constraint("destination", "code"),
            )
            .with_navigation(
                NavigationProperty::new("passengers", "Passenger")
                    .collection(true)
                    .with_constraint("id", "flight_id"),
            ),
    )
}

pub fn passenger_type() -> Arc<EntityType> {
    Arc::new(
        EntityType::new("Passenger")
            .with_key("id")
            .with_property(DeclaredProperty::primitive("id", PrimitiveType::Int32).nullable(false))
            .with_property(DeclaredProperty::primitive("flight_id", PrimitiveType::Int32))
            .with_property(DeclaredProperty::primitive("name", PrimitiveType::String).searchable(true))
            .with_property(DeclaredProperty::primitive("age", PrimitiveType::Double))
            .with_property(DeclaredProperty::new(
                "tags",
                PropertyType::Collection(PrimitiveType::String),
            )),
    )
}

fn unbound_builder(config: EngineConfig) -> ModelBuilder {
    let countries = CollectionEntitySet::new("countries", country_type())
        .with_records(records(json!([
            {"id": 1, "name": "UK"},
            {"id": 2, "name": "France"},
            {"id": 3, "name": "Spain"},
        ])))
        .unwrap()
        .with_capabilities(Capabilities::all().without(Capability::Search));
    let airports = CollectionEntitySet::new("airports", airport_type())
        .with_records(records(json!([
            {"id": 1, "code": "lhr", "name": "Heathrow", "country_id": 1,
             "construction_date": "1946-03-25", "is_big": true, "review_score": 4.2},
            {"id": 2, "code": "lgw", "name": "Gatwick", "country_id": 1,
             "construction_date": "1958-06-09", "is_big": false, "review_score": null},
            {"id": 3, "code": "cdg", "name": "Charles de Gaulle", "country_id": 2,
             "construction_date": "1974-03-08", "is_big": true, "review_score": 3.9},
            {"id": 4, "code": "sfo", "name": "San Francisco", "country_id": null,
             "construction_date": "1927-05-07", "is_big": true, "review_score": 4.5},
        ])))
        .unwrap();
    let flights = CollectionEntitySet::new("flights", flight_type())
        .with_records(records(json!([
            {"id": 1, "origin": "lhr", "destination": "cdg", "gate": 12, "priority": "low,high"},
            {"id": 2, "origin": "lgw", "destination": "sfo", "gate": null, "priority": null},
            {"id": 3, "origin": "cdg", "destination": "lhr", "gate": 3, "priority": "high"},
            {"id": 4, "origin": "sfo", "destination": "lhr", "gate": 40, "priority": "medium"},
        ])))
        .unwrap();
    let passengers = CollectionEntitySet::new("passengers", passenger_type())
        .with_records(records(json!([
            {"id": 1, "flight_id": 1, "name": "Anne", "age": 34, "tags": ["vip", "window"]},
            {"id": 2, "flight_id": 1, "name": "Bob", "age": 41, "tags": ["aisle"]},
            {"id": 3, "flight_id": 3, "name": "Carol", "age": null, "tags": []},
            {"id": 4, "flight_id": 2, "name": "Dave", "age": 52, "tags": ["aisle"]},
        ])))
        .unwrap();

    Model::builder()
        .config(config)
        .enumeration(priorities())
        .entity_set(Arc::new(countries))
        .entity_set(Arc::new(airports))
        .entity_set(Arc::new(flights))
        .entity_set(Arc::new(passengers))
}

pub fn builder() -> ModelBuilder {
    builder_with_config(EngineConfig::default())
}

fn builder_with_config(config: EngineConfig) -> ModelBuilder {
    unbound_builder(config)
        .bind("flights", "originAirport", "airports")
        .bind("flights", "destinationAirport", "airports")
        .bind("flights", "passengers", "passengers")
        .bind("countries", "airports", "airports")
}

pub fn model() -> Model {
    builder().build().unwrap()
}

pub fn model_with_config(config: EngineConfig) -> Model {
    builder_with_config(config).build().unwrap()
}

/// Every entity of `set` in storage order.
pub fn entities(model: &Model, set: &str) -> Vec<Entity> {
    Transaction::new(model, set, &RawQueryOptions::default())
        .unwrap()
        .collect()
        .unwrap()
}
