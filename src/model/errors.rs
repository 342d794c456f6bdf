use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    #[error("Duplicate entity set `{0}`")]
    DuplicateEntitySet(String),

    #[error("Conflicting definitions for entity type `{0}`")]
    ConflictingEntityType(String),

    #[error("Unknown entity type `{0}`")]
    UnknownEntityType(String),

    #[error("Unknown entity set `{0}`")]
    UnknownEntitySet(String),

    #[error("Unknown enumeration type `{0}`")]
    UnknownEnumeration(String),

    #[error("Unknown type `{0}`")]
    UnknownType(String),

    #[error("Key property `{key}` is not declared on `{entity_type}`")]
    KeyNotDeclared { entity_type: String, key: String },

    #[error("Property `{property}` of `{entity_type}` cannot be searchable: only string properties are")]
    InvalidSearchableProperty {
        entity_type: String,
        property: String,
    },

    #[error("Navigation property `{navigation}` on `{entity_type}` must declare exactly one referential constraint, found {count}")]
    ConstraintCount {
        entity_type: String,
        navigation: String,
        count: usize,
    },

    #[error("Referential constraint of `{navigation}` references unknown property `{property}`")]
    UnknownConstraintProperty { navigation: String, property: String },

    #[error("Navigation property `{navigation}` is not declared on the type of entity set `{entity_set}`")]
    UnknownNavigation {
        entity_set: String,
        navigation: String,
    },

    #[error("Navigation binding `{entity_set}/{navigation}` targets `{target}` whose type is not `{expected}`")]
    BindingTypeMismatch {
        entity_set: String,
        navigation: String,
        target: String,
        expected: String,
    },

    #[error("Duplicate navigation binding `{entity_set}/{navigation}`")]
    DuplicateBinding {
        entity_set: String,
        navigation: String,
    },

    #[error("Unknown property `{0}`")]
    UnknownProperty(String),

    #[error("Invalid value for `{property}` ({expected}): {value}")]
    InvalidValue {
        property: String,
        expected: String,
        value: String,
    },

    #[error("Property `{0}` cannot be null")]
    NullValue(String),

    #[error("Invalid enumeration member `{member}` for `{enumeration}`")]
    InvalidEnumMember { enumeration: String, member: String },

    #[error("Failed to read model document: {0}")]
    Read(String),

    #[error("Failed to parse model document: {0}")]
    Parse(String),
}

impl ModelError {
    pub fn invalid_value(
        property: &str,
        expected: impl Into<String>,
        value: &serde_json::Value,
    ) -> Self {
        ModelError::InvalidValue {
            property: property.to_string(),
            expected: expected.into(),
            value: value.to_string(),
        }
    }
}
