pub mod entity;
pub mod entity_type;
pub mod enumeration;
pub mod errors;
pub mod registry;
pub mod schema_config;
pub mod types;
pub mod value;

pub use entity::{Entity, RawRecord};
pub use entity_type::{DeclaredProperty, EntityType, NavigationProperty, ReferentialConstraint};
pub use enumeration::EnumerationType;
pub use errors::ModelError;
pub use registry::{Model, ModelBuilder};
pub use schema_config::ModelDocument;
pub use types::{PrimitiveType, PropertyType};
pub use value::{EnumValue, Value};
