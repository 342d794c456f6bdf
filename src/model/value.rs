//! Typed primitive values flowing through evaluation, storage and SQL parameters.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, SecondsFormat, TimeDelta};
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use super::enumeration::EnumerationType;

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    enum_type: Arc<EnumerationType>,
    value: i64,
}

impl EnumValue {
    pub fn new(enum_type: Arc<EnumerationType>, value: i64) -> Self {
        Self { enum_type, value }
    }

    pub fn enum_type(&self) -> &Arc<EnumerationType> {
        &self.enum_type
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn has_flag(&self, flag: i64) -> bool {
        self.value & flag == flag
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(Decimal),
    Double(f64),
    String(String),
    Date(NaiveDate),
    DateTimeOffset(DateTime<FixedOffset>),
    TimeOfDay(NaiveTime),
    Duration(TimeDelta),
    Guid(Uuid),
    Enum(EnumValue),
    Collection(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::Integer(_) | Value::Decimal(_) | Value::Double(_)
        )
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Decimal(d) => d.to_f64(),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Short name of the value's kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "Edm.Boolean",
            Value::Integer(_) => "Edm.Int64",
            Value::Decimal(_) => "Edm.Decimal",
            Value::Double(_) => "Edm.Double",
            Value::String(_) => "Edm.String",
            Value::Date(_) => "Edm.Date",
            Value::DateTimeOffset(_) => "Edm.DateTimeOffset",
            Value::TimeOfDay(_) => "Edm.TimeOfDay",
            Value::Duration(_) => "Edm.Duration",
            Value::Guid(_) => "Edm.Guid",
            Value::Enum(_) => "enumeration",
            Value::Collection(_) => "collection",
        }
    }

    /// Orders two values of compatible kinds, promoting numerics.
    ///
    /// Returns `None` when either side is null or the kinds cannot be compared.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Decimal(a), Value::Decimal(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Decimal(b)) => Some(Decimal::from(*a).cmp(b)),
            (Value::Decimal(a), Value::Integer(b)) => Some(a.cmp(&Decimal::from(*b))),
            (a, b) if a.is_numeric() && b.is_numeric() => a.as_f64()?.partial_cmp(&b.as_f64()?),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::DateTimeOffset(a), Value::DateTimeOffset(b)) => Some(a.cmp(b)),
            (Value::TimeOfDay(a), Value::TimeOfDay(b)) => Some(a.cmp(b)),
            (Value::Duration(a), Value::Duration(b)) => Some(a.cmp(b)),
            (Value::Guid(a), Value::Guid(b)) => Some(a.cmp(b)),
            (Value::Enum(a), Value::Enum(b)) if a.enum_type.name() == b.enum_type.name() => {
                Some(a.value.cmp(&b.value))
            }
            _ => None,
        }
    }

    /// Literal form accepted back by the expression lexer.
    pub fn to_url(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Decimal(d) => {
                let text = d.to_string();
                if text.contains('.') {
                    text
                } else {
                    format!("{}.0", text)
                }
            }
            Value::Double(d) => format_double(*d),
            Value::String(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTimeOffset(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            Value::TimeOfDay(t) => t.format("%H:%M:%S%.f").to_string(),
            Value::Duration(d) => format!("duration'{}'", format_duration(d)),
            Value::Guid(g) => g.hyphenated().to_string(),
            Value::Enum(e) => format!(
                "{}'{}'",
                e.enum_type.name(),
                e.enum_type
                    .format(e.value)
                    .unwrap_or_else(|| e.value.to_string())
            ),
            Value::Collection(items) => format!(
                "[{}]",
                items
                    .iter()
                    .map(Value::to_url)
                    .collect::<Vec<_>>()
                    .join(",")
            ),
        }
    }

    /// JSON representation used for stored records and serialized entities.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Boolean(b) => JsonValue::Bool(*b),
            Value::Integer(i) => JsonValue::from(*i),
            Value::Decimal(d) => d
                .to_f64()
                .and_then(serde_json::Number::from_f64)
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(d.to_string())),
            Value::Double(d) => serde_json::Number::from_f64(*d)
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(format_double(*d))),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Date(d) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
            Value::DateTimeOffset(dt) => {
                JsonValue::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Value::TimeOfDay(t) => JsonValue::String(t.format("%H:%M:%S%.f").to_string()),
            Value::Duration(d) => JsonValue::String(format_duration(d)),
            Value::Guid(g) => JsonValue::String(g.hyphenated().to_string()),
            Value::Enum(e) => match e.enum_type.format(e.value) {
                Some(names) => JsonValue::String(names),
                None if e.value == 0 => JsonValue::Null,
                None => JsonValue::from(e.value),
            },
            Value::Collection(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_url())
    }
}

fn format_double(d: f64) -> String {
    if d.is_nan() {
        "NaN".to_string()
    } else if d.is_infinite() {
        let text = if d > 0.0 { "INF" } else { "-INF" };
        text.to_string()
    } else {
        format!("{:e}", d)
    }
}

lazy_static! {
    static ref DURATION: Regex =
        Regex::new(r"^(-)?P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)(?:\.(\d+))?S)?)?$")
            .expect("duration pattern compiles");
}

/// Parses an ISO 8601 day-time duration such as `P1DT2H30M` or `-PT0.5S`.
pub fn parse_duration(text: &str) -> Option<TimeDelta> {
    if text.ends_with('P') || text.ends_with('T') {
        return None;
    }
    let caps = DURATION.captures(text)?;
    let number = |i: usize| -> Option<i64> {
        caps.get(i)
            .map(|m| m.as_str().parse::<i64>().ok())
            .unwrap_or(Some(0))
    };

    let seconds = number(2)?
        .checked_mul(86_400)?
        .checked_add(number(3)?.checked_mul(3_600)?)?
        .checked_add(number(4)?.checked_mul(60)?)?
        .checked_add(number(5)?)?;

    let nanos = match caps.get(6) {
        Some(fraction) => {
            let digits: String = fraction.as_str().chars().chain("000000000".chars()).take(9).collect();
            digits.parse::<i64>().ok()?
        }
        None => 0,
    };

    let delta = TimeDelta::try_seconds(seconds)?.checked_add(&TimeDelta::nanoseconds(nanos))?;
    Some(if caps.get(1).is_some() { -delta } else { delta })
}

pub fn format_duration(delta: &TimeDelta) -> String {
    let negative = *delta < TimeDelta::zero();
    let abs = delta.abs();
    let total = abs.num_seconds();
    let nanos = abs.subsec_nanos();

    let days = total / 86_400;
    let hours = total % 86_400 / 3_600;
    let minutes = total % 3_600 / 60;
    let seconds = total % 60;

    let mut out = String::from(if negative { "-P" } else { "P" });
    if days > 0 {
        out.push_str(&format!("{}D", days));
    }
    if hours > 0 || minutes > 0 || seconds > 0 || nanos > 0 {
        out.push('T');
        if hours > 0 {
            out.push_str(&format!("{}H", hours));
        }
        if minutes > 0 {
            out.push_str(&format!("{}M", minutes));
        }
        if seconds > 0 || nanos > 0 {
            if nanos > 0 {
                let fraction = format!("{:09}", nanos);
                out.push_str(&format!("{}.{}S", seconds, fraction.trim_end_matches('0')));
            } else {
                out.push_str(&format!("{}S", seconds));
            }
        }
    }
    if out.ends_with('P') {
        out.push_str("T0S");
    }
    out
}

/// Accepts RFC 3339 timestamps and the seconds-less `2020-01-01T10:00Z` form.
pub fn parse_date_time_offset(text: &str) -> Option<DateTime<FixedOffset>> {
    let normalized = match text.strip_suffix(['Z', 'z']) {
        Some(prefix) => format!("{}+00:00", prefix),
        None => text.to_string(),
    };
    DateTime::parse_from_rfc3339(&normalized)
        .or_else(|_| DateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M%:z"))
        .ok()
}

pub fn parse_time_of_day(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .ok()
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}
