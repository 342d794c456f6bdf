use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value as JsonValue;
use std::sync::Arc;

use super::entity_type::EntityType;
use super::errors::ModelError;
use super::value::Value;

/// Untyped record as held by a store or received in a request body.
pub type RawRecord = serde_json::Map<String, JsonValue>;

/// A typed entity: declared property values in declaration order plus expanded navigations.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    entity_type: Arc<EntityType>,
    id: Option<Value>,
    properties: Vec<(String, Value)>,
    expanded: Vec<(String, Vec<Entity>)>,
}

impl Entity {
    pub fn new(entity_type: Arc<EntityType>) -> Self {
        Self {
            entity_type,
            id: None,
            properties: Vec::new(),
            expanded: Vec::new(),
        }
    }

    /// Builds a typed entity from a raw record, looking each declared property up by
    /// name and then by its backing column. Missing fields become null.
    pub fn from_record(entity_type: &Arc<EntityType>, record: &RawRecord) -> Result<Self, ModelError> {
        let mut entity = Entity::new(entity_type.clone());
        for property in entity_type.declared_properties() {
            let raw = record
                .get(property.name())
                .or_else(|| record.get(property.column()))
                .unwrap_or(&JsonValue::Null);
            let value = property.property_type().coerce(property.name(), raw)?;
            entity.properties.push((property.name().to_string(), value));
        }
        if let Some(key) = entity_type.key_name() {
            entity.id = entity.get(key).filter(|v| !v.is_null()).cloned();
        }
        Ok(entity)
    }

    pub fn entity_type(&self) -> &Arc<EntityType> {
        &self.entity_type
    }

    pub fn id(&self) -> Option<&Value> {
        self.id.as_ref()
    }

    pub fn set_id(&mut self, id: Value) {
        self.id = Some(id);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.properties.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.properties.push((name, value)),
        }
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.properties.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn to_record(&self) -> RawRecord {
        self.properties
            .iter()
            .map(|(n, v)| (n.clone(), v.to_json()))
            .collect()
    }

    /// Keeps only the named properties. The key property always survives.
    pub fn retain_properties(&mut self, names: &[String]) {
        let key = self.entity_type.key_name().map(str::to_string);
        self.properties
            .retain(|(n, _)| names.iter().any(|s| s == n) || key.as_deref() == Some(n.as_str()));
    }

    pub fn attach_expanded(&mut self, navigation: impl Into<String>, related: Vec<Entity>) {
        let navigation = navigation.into();
        self.expanded.retain(|(n, _)| *n != navigation);
        self.expanded.push((navigation, related));
    }

    pub fn expanded(&self, navigation: &str) -> Option<&[Entity]> {
        self.expanded
            .iter()
            .find(|(n, _)| n == navigation)
            .map(|(_, related)| related.as_slice())
    }
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.properties.len() + self.expanded.len()))?;
        for (name, value) in &self.properties {
            map.serialize_entry(name, &value.to_json())?;
        }
        for (name, related) in &self.expanded {
            let collection = self
                .entity_type
                .navigation_property(name)
                .map(|n| n.is_collection())
                .unwrap_or(true);
            if collection {
                map.serialize_entry(name, related)?;
            } else {
                map.serialize_entry(name, &related.first())?;
            }
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    Create,
    Update,
}

/// Validates a request body against the entity type and normalizes every value.
///
/// Unknown properties are rejected. On update the key property is ignored; on create
/// every non-nullable property other than the key must be present.
pub fn validate_body(
    entity_type: &EntityType,
    body: &RawRecord,
    mode: BodyMode,
) -> Result<RawRecord, ModelError> {
    let key = entity_type.key_name();
    let mut normalized = RawRecord::new();

    for (name, raw) in body {
        let property = entity_type
            .declared_property(name)
            .ok_or_else(|| ModelError::UnknownProperty(name.clone()))?;
        if mode == BodyMode::Update && key == Some(name.as_str()) {
            continue;
        }
        let value = property.property_type().coerce(name, raw)?;
        if value.is_null() && !property.is_nullable() {
            return Err(ModelError::NullValue(name.clone()));
        }
        normalized.insert(name.clone(), value.to_json());
    }

    if mode == BodyMode::Create {
        let missing = entity_type.declared_properties().iter().find(|p| {
            !p.is_nullable() && key != Some(p.name()) && !normalized.contains_key(p.name())
        });
        if let Some(property) = missing {
            return Err(ModelError::NullValue(property.name().to_string()));
        }
    }

    Ok(normalized)
}
