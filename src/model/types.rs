use chrono::{NaiveDateTime, TimeDelta};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use super::enumeration::EnumerationType;
use super::errors::ModelError;
use super::value::{parse_date, parse_date_time_offset, parse_duration, parse_time_of_day, EnumValue, Value};

/// Primitive property types of the entity data model.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveType {
    Boolean,
    Byte,
    SByte,
    Int16,
    Int32,
    Int64,
    UInt16,
    UInt32,
    UInt64,
    Single,
    Double,
    Decimal,
    String,
    Date,
    DateTimeOffset,
    TimeOfDay,
    Duration,
    Guid,
    Enum(Arc<EnumerationType>),
}

/// Groups of types whose values can be compared with each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    Boolean,
    Numeric,
    String,
    Date,
    DateTimeOffset,
    TimeOfDay,
    Duration,
    Guid,
    Enum,
}

impl PrimitiveType {
    /// Resolves `Edm.Int32` style names; the `Edm.` prefix is optional.
    pub fn from_edm_name(name: &str) -> Option<Self> {
        let short = name.strip_prefix("Edm.").unwrap_or(name);
        let ty = match short {
            "Boolean" => PrimitiveType::Boolean,
            "Byte" => PrimitiveType::Byte,
            "SByte" => PrimitiveType::SByte,
            "Int16" => PrimitiveType::Int16,
            "Int32" => PrimitiveType::Int32,
            "Int64" => PrimitiveType::Int64,
            "UInt16" => PrimitiveType::UInt16,
            "UInt32" => PrimitiveType::UInt32,
            "UInt64" => PrimitiveType::UInt64,
            "Single" => PrimitiveType::Single,
            "Double" => PrimitiveType::Double,
            "Decimal" => PrimitiveType::Decimal,
            "String" => PrimitiveType::String,
            "Date" => PrimitiveType::Date,
            "DateTimeOffset" => PrimitiveType::DateTimeOffset,
            "TimeOfDay" => PrimitiveType::TimeOfDay,
            "Duration" => PrimitiveType::Duration,
            "Guid" => PrimitiveType::Guid,
            _ => return None,
        };
        Some(ty)
    }

    pub fn edm_name(&self) -> String {
        let name = match self {
            PrimitiveType::Boolean => "Edm.Boolean",
            PrimitiveType::Byte => "Edm.Byte",
            PrimitiveType::SByte => "Edm.SByte",
            PrimitiveType::Int16 => "Edm.Int16",
            PrimitiveType::Int32 => "Edm.Int32",
            PrimitiveType::Int64 => "Edm.Int64",
            PrimitiveType::UInt16 => "Edm.UInt16",
            PrimitiveType::UInt32 => "Edm.UInt32",
            PrimitiveType::UInt64 => "Edm.UInt64",
            PrimitiveType::Single => "Edm.Single",
            PrimitiveType::Double => "Edm.Double",
            PrimitiveType::Decimal => "Edm.Decimal",
            PrimitiveType::String => "Edm.String",
            PrimitiveType::Date => "Edm.Date",
            PrimitiveType::DateTimeOffset => "Edm.DateTimeOffset",
            PrimitiveType::TimeOfDay => "Edm.TimeOfDay",
            PrimitiveType::Duration => "Edm.Duration",
            PrimitiveType::Guid => "Edm.Guid",
            PrimitiveType::Enum(e) => return e.name().to_string(),
        };
        name.to_string()
    }

    /// Type of a literal value, `None` for null and collections.
    pub fn of_value(value: &Value) -> Option<Self> {
        let ty = match value {
            Value::Null | Value::Collection(_) => return None,
            Value::Boolean(_) => PrimitiveType::Boolean,
            Value::Integer(_) => PrimitiveType::Int64,
            Value::Decimal(_) => PrimitiveType::Decimal,
            Value::Double(_) => PrimitiveType::Double,
            Value::String(_) => PrimitiveType::String,
            Value::Date(_) => PrimitiveType::Date,
            Value::DateTimeOffset(_) => PrimitiveType::DateTimeOffset,
            Value::TimeOfDay(_) => PrimitiveType::TimeOfDay,
            Value::Duration(_) => PrimitiveType::Duration,
            Value::Guid(_) => PrimitiveType::Guid,
            Value::Enum(e) => PrimitiveType::Enum(e.enum_type().clone()),
        };
        Some(ty)
    }

    pub fn family(&self) -> TypeFamily {
        match self {
            PrimitiveType::Boolean => TypeFamily::Boolean,
            PrimitiveType::String => TypeFamily::String,
            PrimitiveType::Date => TypeFamily::Date,
            PrimitiveType::DateTimeOffset => TypeFamily::DateTimeOffset,
            PrimitiveType::TimeOfDay => TypeFamily::TimeOfDay,
            PrimitiveType::Duration => TypeFamily::Duration,
            PrimitiveType::Guid => TypeFamily::Guid,
            PrimitiveType::Enum(_) => TypeFamily::Enum,
            _ => TypeFamily::Numeric,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.family() == TypeFamily::Numeric
    }

    pub fn is_integral(&self) -> bool {
        self.integer_range().is_some()
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, PrimitiveType::Single | PrimitiveType::Double)
    }

    /// Whether values of the two types may be compared or tested for equality.
    pub fn comparable_with(&self, other: &PrimitiveType) -> bool {
        match (self, other) {
            (PrimitiveType::Enum(a), PrimitiveType::Enum(b)) => a.name() == b.name(),
            _ => self.family() == other.family(),
        }
    }

    fn integer_range(&self) -> Option<(i64, i64)> {
        match self {
            PrimitiveType::Byte => Some((0, u8::MAX as i64)),
            PrimitiveType::SByte => Some((i8::MIN as i64, i8::MAX as i64)),
            PrimitiveType::Int16 => Some((i16::MIN as i64, i16::MAX as i64)),
            PrimitiveType::Int32 => Some((i32::MIN as i64, i32::MAX as i64)),
            PrimitiveType::Int64 => Some((i64::MIN, i64::MAX)),
            PrimitiveType::UInt16 => Some((0, u16::MAX as i64)),
            PrimitiveType::UInt32 => Some((0, u32::MAX as i64)),
            // Values are held as i64, so the upper half of UInt64 is not representable.
            PrimitiveType::UInt64 => Some((0, i64::MAX)),
            _ => None,
        }
    }

    /// Converts a raw JSON value (record field, request body, SQL column) into a typed value.
    pub fn coerce(&self, property: &str, raw: &JsonValue) -> Result<Value, ModelError> {
        if raw.is_null() {
            return Ok(Value::Null);
        }
        let invalid = || ModelError::invalid_value(property, self.edm_name(), raw);

        if let Some((min, max)) = self.integer_range() {
            let number = match raw {
                JsonValue::Number(n) => match n.as_i64() {
                    Some(i) => Some(i),
                    None => n.as_f64().filter(|f| f.fract() == 0.0 && f.abs() < 9.2e18).map(|f| f as i64),
                },
                JsonValue::String(s) => s.trim().parse::<i64>().ok(),
                JsonValue::Bool(b) => Some(*b as i64),
                _ => None,
            }
            .ok_or_else(invalid)?;
            if number < min || number > max {
                return Err(invalid());
            }
            return Ok(Value::Integer(number));
        }

        let value = match self {
            PrimitiveType::Boolean => match raw {
                JsonValue::Bool(b) => Value::Boolean(*b),
                JsonValue::Number(n) if n.as_i64() == Some(0) => Value::Boolean(false),
                JsonValue::Number(n) if n.as_i64() == Some(1) => Value::Boolean(true),
                JsonValue::String(s) => match s.as_str() {
                    "true" | "1" => Value::Boolean(true),
                    "false" | "0" => Value::Boolean(false),
                    _ => return Err(invalid()),
                },
                _ => return Err(invalid()),
            },
            PrimitiveType::Single | PrimitiveType::Double => match raw {
                JsonValue::Number(n) => Value::Double(n.as_f64().ok_or_else(invalid)?),
                JsonValue::String(s) => Value::Double(parse_double(s).ok_or_else(invalid)?),
                _ => return Err(invalid()),
            },
            PrimitiveType::Decimal => match raw {
                JsonValue::Number(n) => {
                    Value::Decimal(Decimal::from_str(&n.to_string()).map_err(|_| invalid())?)
                }
                JsonValue::String(s) => {
                    Value::Decimal(Decimal::from_str(s.trim()).map_err(|_| invalid())?)
                }
                _ => return Err(invalid()),
            },
            PrimitiveType::String => match raw {
                JsonValue::String(s) => Value::String(s.clone()),
                _ => return Err(invalid()),
            },
            PrimitiveType::Date => Value::Date(raw.as_str().and_then(parse_date).ok_or_else(invalid)?),
            PrimitiveType::DateTimeOffset => {
                let text = raw.as_str().ok_or_else(invalid)?;
                let parsed = parse_date_time_offset(text).or_else(|| {
                    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
                        .ok()
                        .map(|naive| naive.and_utc().fixed_offset())
                });
                Value::DateTimeOffset(parsed.ok_or_else(invalid)?)
            }
            PrimitiveType::TimeOfDay => {
                Value::TimeOfDay(raw.as_str().and_then(parse_time_of_day).ok_or_else(invalid)?)
            }
            PrimitiveType::Duration => match raw {
                JsonValue::String(s) => Value::Duration(parse_duration(s).ok_or_else(invalid)?),
                JsonValue::Number(n) => {
                    let seconds = n.as_f64().ok_or_else(invalid)?;
                    let nanos = (seconds * 1e9).round();
                    if !nanos.is_finite() || nanos.abs() > i64::MAX as f64 {
                        return Err(invalid());
                    }
                    Value::Duration(TimeDelta::nanoseconds(nanos as i64))
                }
                _ => return Err(invalid()),
            },
            PrimitiveType::Guid => {
                let text = raw.as_str().ok_or_else(invalid)?;
                Value::Guid(Uuid::parse_str(text).map_err(|_| invalid())?)
            }
            PrimitiveType::Enum(enumeration) => {
                let value = match raw {
                    JsonValue::Number(n) => n.as_i64().ok_or_else(invalid)?,
                    JsonValue::String(s) => enumeration.parse_members(s)?,
                    _ => return Err(invalid()),
                };
                Value::Enum(EnumValue::new(enumeration.clone(), value))
            }
            _ => return Err(invalid()),
        };
        Ok(value)
    }

    /// Converts an already-typed literal into this type, e.g. an integer key into `Edm.Int32`.
    pub fn coerce_value(&self, property: &str, value: &Value) -> Result<Value, ModelError> {
        match (self, value) {
            (PrimitiveType::Enum(a), Value::Enum(e)) if a.name() == e.enum_type().name() => {
                Ok(value.clone())
            }
            _ => self.coerce(property, &value.to_json()),
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.edm_name())
    }
}

fn parse_double(text: &str) -> Option<f64> {
    match text.trim() {
        "NaN" => Some(f64::NAN),
        "INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        other => other.parse().ok(),
    }
}

/// Type of a declared property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyType {
    Primitive(PrimitiveType),
    Collection(PrimitiveType),
}

impl PropertyType {
    /// Parses `Edm.String`, `Collection(Edm.String)` or an enumeration name.
    pub fn parse(
        name: &str,
        enum_lookup: impl Fn(&str) -> Option<Arc<EnumerationType>>,
    ) -> Result<Self, ModelError> {
        let name = name.trim();
        let (inner, collection) = match name
            .strip_prefix("Collection(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            Some(inner) => (inner.trim(), true),
            None => (name, false),
        };
        let primitive = match PrimitiveType::from_edm_name(inner) {
            Some(p) => p,
            None => PrimitiveType::Enum(
                enum_lookup(inner).ok_or_else(|| ModelError::UnknownType(inner.to_string()))?,
            ),
        };
        Ok(if collection {
            PropertyType::Collection(primitive)
        } else {
            PropertyType::Primitive(primitive)
        })
    }

    pub fn element(&self) -> &PrimitiveType {
        match self {
            PropertyType::Primitive(p) | PropertyType::Collection(p) => p,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, PropertyType::Collection(_))
    }

    pub fn coerce(&self, property: &str, raw: &JsonValue) -> Result<Value, ModelError> {
        match self {
            PropertyType::Primitive(p) => p.coerce(property, raw),
            PropertyType::Collection(element) => {
                let items = match raw {
                    JsonValue::Null => return Ok(Value::Null),
                    JsonValue::Array(items) => items.clone(),
                    // SQL stores collections as JSON text.
                    JsonValue::String(text) => match serde_json::from_str::<JsonValue>(text) {
                        Ok(JsonValue::Array(items)) => items,
                        _ => return Err(ModelError::invalid_value(property, self.to_string(), raw)),
                    },
                    _ => return Err(ModelError::invalid_value(property, self.to_string(), raw)),
                };
                items
                    .iter()
                    .map(|item| element.coerce(property, item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Collection)
            }
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyType::Primitive(p) => write!(f, "{}", p),
            PropertyType::Collection(p) => write!(f, "Collection({})", p),
        }
    }
}
