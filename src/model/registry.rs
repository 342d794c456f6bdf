use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::entity::Entity;
use super::entity_type::{EntityType, NavigationProperty, ReferentialConstraint};
use super::enumeration::EnumerationType;
use super::errors::ModelError;
use super::types::{PrimitiveType, PropertyType};
use super::value::Value;
use crate::config::EngineConfig;
use crate::entity_set::EntitySet;
use crate::error::ODataError;
use crate::expression::ast::{BinaryOp, Node, PropertyRef, Scope};
use crate::query::{ExpandRequest, QueryOptions, Transaction};

/// The entity data model: registered entity sets, their types, enumerations and
/// the navigation bindings connecting sets.
pub struct Model {
    config: EngineConfig,
    enumerations: HashMap<String, Arc<EnumerationType>>,
    entity_types: HashMap<String, Arc<EntityType>>,
    entity_sets: Vec<Arc<dyn EntitySet>>,
    /// (source set, navigation property) -> target set
    bindings: HashMap<(String, String), String>,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("entity_sets", &self.entity_sets.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("bindings", &self.bindings)
            .finish()
    }
}

impl Model {
    pub fn builder() -> ModelBuilder {
        ModelBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn entity_set(&self, name: &str) -> Option<&Arc<dyn EntitySet>> {
        self.entity_sets.iter().find(|s| s.name() == name)
    }

    pub fn entity_sets(&self) -> impl Iterator<Item = &Arc<dyn EntitySet>> {
        self.entity_sets.iter()
    }

    pub fn entity_type(&self, name: &str) -> Option<&Arc<EntityType>> {
        self.entity_types.get(name)
    }

    /// Looks an enumeration up by name, accepting a namespace-qualified form.
    pub fn enumeration(&self, name: &str) -> Option<&Arc<EnumerationType>> {
        self.enumerations.get(name).or_else(|| {
            let short = name.rsplit('.').next()?;
            self.enumerations.get(short)
        })
    }

    /// Name of the entity set a navigation property of `entity_set` is bound to.
    pub fn navigation_target(&self, entity_set: &str, navigation: &str) -> Option<&str> {
        self.bindings
            .get(&(entity_set.to_string(), navigation.to_string()))
            .map(String::as_str)
    }

    /// Entities of `target_set` related to `source` through `navigation`.
    pub fn related(
        &self,
        target_set: &str,
        navigation: &NavigationProperty,
        source: &Entity,
    ) -> Result<Vec<Entity>, ODataError> {
        let Some(filter) = self.constraint_filter(target_set, navigation, source)? else {
            return Ok(Vec::new());
        };
        let options = QueryOptions::default().and_filter(filter);
        self.query_set(target_set, options)
    }

    /// Attaches the related entities named by `request` to `entity`.
    pub fn expand_entity(&self, entity: &mut Entity, request: &ExpandRequest) -> Result<(), ODataError> {
        let related = match self.constraint_filter(&request.target_set, &request.navigation, entity)? {
            Some(filter) => self.query_set(&request.target_set, request.options.clone().and_filter(filter))?,
            None => Vec::new(),
        };
        entity.attach_expanded(request.navigation.name(), related);
        Ok(())
    }

    fn constraint_filter(
        &self,
        target_set: &str,
        navigation: &NavigationProperty,
        source: &Entity,
    ) -> Result<Option<Node>, ODataError> {
        let constraint = navigation.constraint().ok_or_else(|| ModelError::ConstraintCount {
            entity_type: source.entity_type().name().to_string(),
            navigation: navigation.name().to_string(),
            count: navigation.constraints().len(),
        })?;
        let local = source.get(&constraint.property).cloned().unwrap_or(Value::Null);
        if local.is_null() {
            return Ok(None);
        }
        let set = self
            .entity_set(target_set)
            .ok_or_else(|| ModelError::UnknownEntitySet(target_set.to_string()))?;
        let referenced = set
            .entity_type()
            .declared_property(&constraint.referenced_property)
            .ok_or_else(|| ModelError::UnknownConstraintProperty {
                navigation: navigation.name().to_string(),
                property: constraint.referenced_property.clone(),
            })?;
        Ok(Some(Node::Binary(
            BinaryOp::Eq,
            Box::new(Node::Property(PropertyRef::new(Scope::Root, referenced.clone()))),
            Box::new(Node::Literal(local)),
        )))
    }

    fn query_set(&self, target_set: &str, options: QueryOptions) -> Result<Vec<Entity>, ODataError> {
        let set = self
            .entity_set(target_set)
            .ok_or_else(|| ODataError::NotFound(format!("Entity set `{}` not found", target_set)))?
            .clone();
        let tx = Transaction::from_options(self, set, options);
        let entities = tx.query()?.collect::<Result<Vec<_>, _>>()?;
        Ok(entities)
    }
}

#[derive(Default)]
pub struct ModelBuilder {
    config: EngineConfig,
    enumerations: Vec<Arc<EnumerationType>>,
    entity_types: Vec<Arc<EntityType>>,
    entity_sets: Vec<Arc<dyn EntitySet>>,
    bindings: Vec<(String, String, String)>,
}

impl ModelBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn enumeration(mut self, enumeration: Arc<EnumerationType>) -> Self {
        self.enumerations.push(enumeration);
        self
    }

    /// Registers a type not backing any entity set, e.g. a navigation target reached only by type.
    pub fn entity_type(mut self, entity_type: Arc<EntityType>) -> Self {
        self.entity_types.push(entity_type);
        self
    }

    pub fn entity_set(mut self, entity_set: Arc<dyn EntitySet>) -> Self {
        self.entity_sets.push(entity_set);
        self
    }

    /// Binds navigation property `navigation` of `entity_set` to the set `target`.
    pub fn bind(
        mut self,
        entity_set: impl Into<String>,
        navigation: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        self.bindings
            .push((entity_set.into(), navigation.into(), target.into()));
        self
    }

    pub fn build(self) -> Result<Model, ModelError> {
        let mut entity_types: HashMap<String, Arc<EntityType>> = HashMap::new();
        let all_types = self
            .entity_types
            .iter()
            .cloned()
            .chain(self.entity_sets.iter().map(|s| s.entity_type().clone()));
        for entity_type in all_types {
            match entity_types.get(entity_type.name()) {
                Some(existing) if **existing != *entity_type => {
                    return Err(ModelError::ConflictingEntityType(entity_type.name().to_string()));
                }
                Some(_) => {}
                None => {
                    entity_types.insert(entity_type.name().to_string(), entity_type);
                }
            }
        }

        let mut enumerations: HashMap<String, Arc<EnumerationType>> = self
            .enumerations
            .iter()
            .map(|e| (e.name().to_string(), e.clone()))
            .collect();
        for entity_type in entity_types.values() {
            for property in entity_type.declared_properties() {
                if let PrimitiveType::Enum(e) = property.property_type().element() {
                    enumerations.entry(e.name().to_string()).or_insert_with(|| e.clone());
                }
            }
        }

        for entity_type in entity_types.values() {
            validate_entity_type(entity_type, &entity_types)?;
        }

        let mut set_names: Vec<&str> = Vec::new();
        for set in &self.entity_sets {
            if set_names.contains(&set.name()) {
                return Err(ModelError::DuplicateEntitySet(set.name().to_string()));
            }
            set_names.push(set.name());
        }

        let find_set = |name: &str| self.entity_sets.iter().find(|s| s.name() == name);
        let mut bindings = HashMap::new();
        for (source, navigation, target) in &self.bindings {
            let source_set =
                find_set(source).ok_or_else(|| ModelError::UnknownEntitySet(source.clone()))?;
            let nav = source_set
                .entity_type()
                .navigation_property(navigation)
                .ok_or_else(|| ModelError::UnknownNavigation {
                    entity_set: source.clone(),
                    navigation: navigation.clone(),
                })?;
            let target_set =
                find_set(target).ok_or_else(|| ModelError::UnknownEntitySet(target.clone()))?;
            if target_set.entity_type().name() != nav.target() {
                return Err(ModelError::BindingTypeMismatch {
                    entity_set: source.clone(),
                    navigation: navigation.clone(),
                    target: target.clone(),
                    expected: nav.target().to_string(),
                });
            }
            let key = (source.clone(), navigation.clone());
            if bindings.insert(key, target.clone()).is_some() {
                return Err(ModelError::DuplicateBinding {
                    entity_set: source.clone(),
                    navigation: navigation.clone(),
                });
            }
            debug!("Bound {}/{} to entity set {}", source, navigation, target);
        }

        debug!(
            "Built model with {} entity sets, {} entity types, {} enumerations",
            self.entity_sets.len(),
            entity_types.len(),
            enumerations.len()
        );

        Ok(Model {
            config: self.config,
            enumerations,
            entity_types,
            entity_sets: self.entity_sets,
            bindings,
        })
    }
}

fn validate_entity_type(
    entity_type: &EntityType,
    entity_types: &HashMap<String, Arc<EntityType>>,
) -> Result<(), ModelError> {
    if let Some(key) = entity_type.key_name() {
        if entity_type.declared_property(key).is_none() {
            return Err(ModelError::KeyNotDeclared {
                entity_type: entity_type.name().to_string(),
                key: key.to_string(),
            });
        }
    }

    for property in entity_type.searchable_properties() {
        if *property.property_type() != PropertyType::Primitive(PrimitiveType::String) {
            return Err(ModelError::InvalidSearchableProperty {
                entity_type: entity_type.name().to_string(),
                property: property.name().to_string(),
            });
        }
    }

    for navigation in entity_type.navigation_properties() {
        let target = entity_types
            .get(navigation.target())
            .ok_or_else(|| ModelError::UnknownEntityType(navigation.target().to_string()))?;
        let ReferentialConstraint {
            property,
            referenced_property,
        } = navigation.constraint().ok_or_else(|| ModelError::ConstraintCount {
            entity_type: entity_type.name().to_string(),
            navigation: navigation.name().to_string(),
            count: navigation.constraints().len(),
        })?;
        if entity_type.declared_property(property).is_none() {
            return Err(ModelError::UnknownConstraintProperty {
                navigation: navigation.name().to_string(),
                property: property.clone(),
            });
        }
        if target.declared_property(referenced_property).is_none() {
            return Err(ModelError::UnknownConstraintProperty {
                navigation: navigation.name().to_string(),
                property: referenced_property.clone(),
            });
        }
    }
    Ok(())
}
