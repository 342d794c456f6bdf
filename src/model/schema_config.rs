//! YAML model documents: enumerations, entity types and in-memory entity sets with seed records.

use log::info;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::entity::RawRecord;
use super::entity_type::{DeclaredProperty, EntityType, NavigationProperty};
use super::enumeration::EnumerationType;
use super::errors::ModelError;
use super::registry::Model;
use super::types::PropertyType;
use crate::config::EngineConfig;
use crate::entity_set::collection::CollectionEntitySet;
use crate::query::capabilities::{Capabilities, Capability};

#[derive(Debug, Clone, Deserialize)]
pub struct ModelDocument {
    #[serde(default)]
    pub config: Option<EngineConfig>,
    #[serde(default)]
    pub enumerations: Vec<EnumerationDef>,
    #[serde(default)]
    pub entity_types: Vec<EntityTypeDef>,
    #[serde(default)]
    pub entity_sets: Vec<EntitySetDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnumerationDef {
    pub name: String,
    #[serde(default)]
    pub flags: bool,
    pub members: Vec<EnumMemberDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnumMemberDef {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityTypeDef {
    pub name: String,
    #[serde(default)]
    pub key: Option<String>,
    pub properties: Vec<PropertyDef>,
    #[serde(default)]
    pub navigation: Vec<NavigationDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PropertyDef {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub searchable: bool,
    #[serde(default)]
    pub source: Option<String>,
}

fn default_nullable() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct NavigationDef {
    pub name: String,
    pub target: String,
    #[serde(default)]
    pub collection: bool,
    pub constraint: ConstraintDef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConstraintDef {
    pub property: String,
    pub referenced_property: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntitySetDef {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub records: Vec<RawRecord>,
    #[serde(default)]
    pub bindings: Vec<BindingDef>,
    /// Restricts the supported operations; all are enabled when absent.
    #[serde(default)]
    pub capabilities: Option<Vec<Capability>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BindingDef {
    pub navigation: String,
    pub target: String,
}

impl ModelDocument {
    pub fn from_yaml_str(content: &str) -> Result<Self, ModelError> {
        serde_yaml::from_str(content).map_err(|e| ModelError::Parse(e.to_string()))
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ModelError::Read(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_yaml_str(&content)
    }

    /// Builds the model. An explicit `config` overrides the document's own section.
    pub fn build(self, config: Option<EngineConfig>) -> Result<Model, ModelError> {
        let mut enumerations: HashMap<String, Arc<EnumerationType>> = HashMap::new();
        for def in &self.enumerations {
            let enumeration = def
                .members
                .iter()
                .fold(EnumerationType::new(&def.name).flags(def.flags), |e, m| {
                    e.with_member(&m.name, m.value)
                });
            enumerations.insert(def.name.clone(), Arc::new(enumeration));
        }

        let mut entity_types: HashMap<String, Arc<EntityType>> = HashMap::new();
        for def in &self.entity_types {
            let entity_type = build_entity_type(def, &enumerations)?;
            entity_types.insert(def.name.clone(), Arc::new(entity_type));
        }

        let mut builder = Model::builder().config(config.or(self.config).unwrap_or_default());
        for enumeration in enumerations.values() {
            builder = builder.enumeration(enumeration.clone());
        }

        for def in self.entity_sets {
            let entity_type = entity_types
                .get(&def.type_name)
                .ok_or_else(|| ModelError::UnknownEntityType(def.type_name.clone()))?
                .clone();
            let mut set = CollectionEntitySet::new(&def.name, entity_type).with_records(def.records)?;
            if let Some(capabilities) = def.capabilities {
                set = set.with_capabilities(capabilities.into_iter().collect::<Capabilities>());
            }
            info!("Loaded entity set {} ({} records)", def.name, set.len());
            builder = builder.entity_set(Arc::new(set));
            for binding in def.bindings {
                builder = builder.bind(&def.name, binding.navigation, binding.target);
            }
        }

        for entity_type in entity_types.values() {
            builder = builder.entity_type(entity_type.clone());
        }

        builder.build()
    }
}

fn build_entity_type(
    def: &EntityTypeDef,
    enumerations: &HashMap<String, Arc<EnumerationType>>,
) -> Result<EntityType, ModelError> {
    let mut entity_type = EntityType::new(&def.name);
    if let Some(key) = &def.key {
        entity_type = entity_type.with_key(key);
    }
    for property in &def.properties {
        let property_type = PropertyType::parse(&property.type_name, |name| enumerations.get(name).cloned())?;
        let mut declared = DeclaredProperty::new(&property.name, property_type)
            .nullable(property.nullable)
            .searchable(property.searchable);
        if let Some(source) = &property.source {
            declared = declared.with_source(source);
        }
        entity_type = entity_type.with_property(declared);
    }
    for navigation in &def.navigation {
        entity_type = entity_type.with_navigation(
            NavigationProperty::new(&navigation.name, &navigation.target)
                .collection(navigation.collection)
                .with_constraint(&navigation.constraint.property, &navigation.constraint.referenced_property),
        );
    }
    Ok(entity_type)
}
