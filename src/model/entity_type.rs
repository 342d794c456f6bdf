use super::types::{PrimitiveType, PropertyType};

#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredProperty {
    name: String,
    property_type: PropertyType,
    nullable: bool,
    searchable: bool,
    /// Backing column or record field when it differs from `name`.
    source: Option<String>,
}

impl DeclaredProperty {
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            property_type,
            nullable: true,
            searchable: false,
            source: None,
        }
    }

    pub fn primitive(name: impl Into<String>, ty: PrimitiveType) -> Self {
        Self::new(name, PropertyType::Primitive(ty))
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn searchable(mut self, searchable: bool) -> Self {
        self.searchable = searchable;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn property_type(&self) -> &PropertyType {
        &self.property_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_searchable(&self) -> bool {
        self.searchable
    }

    pub fn column(&self) -> &str {
        self.source.as_deref().unwrap_or(&self.name)
    }
}

/// Pairs a property of the source type with the property of the target type it must equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferentialConstraint {
    pub property: String,
    pub referenced_property: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NavigationProperty {
    name: String,
    target: String,
    collection: bool,
    constraints: Vec<ReferentialConstraint>,
}

impl NavigationProperty {
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            collection: false,
            constraints: Vec::new(),
        }
    }

    pub fn collection(mut self, collection: bool) -> Self {
        self.collection = collection;
        self
    }

    pub fn with_constraint(
        mut self,
        property: impl Into<String>,
        referenced_property: impl Into<String>,
    ) -> Self {
        self.constraints.push(ReferentialConstraint {
            property: property.into(),
            referenced_property: referenced_property.into(),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the target entity type.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn is_collection(&self) -> bool {
        self.collection
    }

    pub fn constraints(&self) -> &[ReferentialConstraint] {
        &self.constraints
    }

    /// The single constraint a registered navigation property carries.
    pub fn constraint(&self) -> Option<&ReferentialConstraint> {
        match self.constraints.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityType {
    name: String,
    key: Option<String>,
    declared: Vec<DeclaredProperty>,
    navigation: Vec<NavigationProperty>,
}

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: None,
            declared: Vec::new(),
            navigation: Vec::new(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_property(mut self, property: DeclaredProperty) -> Self {
        self.declared.push(property);
        self
    }

    pub fn with_navigation(mut self, navigation: NavigationProperty) -> Self {
        self.navigation.push(navigation);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_name(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn key(&self) -> Option<&DeclaredProperty> {
        self.key_name().and_then(|k| self.declared_property(k))
    }

    pub fn declared_properties(&self) -> &[DeclaredProperty] {
        &self.declared
    }

    pub fn navigation_properties(&self) -> &[NavigationProperty] {
        &self.navigation
    }

    pub fn declared_property(&self, name: &str) -> Option<&DeclaredProperty> {
        self.declared.iter().find(|p| p.name() == name)
    }

    pub fn navigation_property(&self, name: &str) -> Option<&NavigationProperty> {
        self.navigation.iter().find(|n| n.name() == name)
    }

    pub fn searchable_properties(&self) -> impl Iterator<Item = &DeclaredProperty> {
        self.declared.iter().filter(|p| p.is_searchable())
    }
}
