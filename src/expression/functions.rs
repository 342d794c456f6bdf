use chrono::{Datelike, Timelike, Utc};
use regex::Regex;
use rust_decimal::RoundingStrategy;

use super::ast::ExprType;
use super::errors::ExpressionError;
use crate::model::types::{PrimitiveType, TypeFamily};
use crate::model::value::Value;

/// Built-in `$filter` functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Contains,
    StartsWith,
    EndsWith,
    IndexOf,
    Length,
    Substring,
    ToLower,
    ToUpper,
    Trim,
    Concat,
    MatchesPattern,
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Date,
    Time,
    Now,
    Round,
    Floor,
    Ceiling,
}

const ALL: [Function; 23] = [
    Function::Contains,
    Function::StartsWith,
    Function::EndsWith,
    Function::IndexOf,
    Function::Length,
    Function::Substring,
    Function::ToLower,
    Function::ToUpper,
    Function::Trim,
    Function::Concat,
    Function::MatchesPattern,
    Function::Year,
    Function::Month,
    Function::Day,
    Function::Hour,
    Function::Minute,
    Function::Second,
    Function::Date,
    Function::Time,
    Function::Now,
    Function::Round,
    Function::Floor,
    Function::Ceiling,
];

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        ALL.iter().copied().find(|f| f.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Function::Contains => "contains",
            Function::StartsWith => "startswith",
            Function::EndsWith => "endswith",
            Function::IndexOf => "indexof",
            Function::Length => "length",
            Function::Substring => "substring",
            Function::ToLower => "tolower",
            Function::ToUpper => "toupper",
            Function::Trim => "trim",
            Function::Concat => "concat",
            Function::MatchesPattern => "matchesPattern",
            Function::Year => "year",
            Function::Month => "month",
            Function::Day => "day",
            Function::Hour => "hour",
            Function::Minute => "minute",
            Function::Second => "second",
            Function::Date => "date",
            Function::Time => "time",
            Function::Now => "now",
            Function::Round => "round",
            Function::Floor => "floor",
            Function::Ceiling => "ceiling",
        }
    }

    /// Checks argument types and returns the result type.
    pub fn check(&self, args: &[ExprType]) -> Result<PrimitiveType, ExpressionError> {
        use TypeFamily::*;

        let families = args
            .iter()
            .map(|a| match a {
                ExprType::Null => Ok(None),
                ExprType::Primitive(p) => Ok(Some(p)),
                ExprType::Collection(_) => Err(self.invalid(args)),
            })
            .collect::<Result<Vec<Option<&PrimitiveType>>, _>>()?;
        let matches = |signature: &[TypeFamily]| {
            signature.len() == families.len()
                && signature
                    .iter()
                    .zip(&families)
                    .all(|(expected, actual)| actual.is_none_or(|p| p.family() == *expected))
        };
        let integral = |i: usize| families.get(i).copied().flatten().is_none_or(|p| p.is_integral());

        let result = match self {
            Function::Contains | Function::StartsWith | Function::EndsWith | Function::MatchesPattern
                if matches(&[String, String]) =>
            {
                PrimitiveType::Boolean
            }
            Function::IndexOf if matches(&[String, String]) => PrimitiveType::Int32,
            Function::Length if matches(&[String]) => PrimitiveType::Int32,
            Function::ToLower | Function::ToUpper | Function::Trim if matches(&[String]) => {
                PrimitiveType::String
            }
            Function::Concat if matches(&[String, String]) => PrimitiveType::String,
            Function::Substring
                if (matches(&[String, Numeric]) || matches(&[String, Numeric, Numeric]))
                    && integral(1)
                    && integral(2) =>
            {
                PrimitiveType::String
            }
            Function::Year | Function::Month | Function::Day
                if matches(&[Date]) || matches(&[DateTimeOffset]) =>
            {
                PrimitiveType::Int32
            }
            Function::Hour | Function::Minute | Function::Second
                if matches(&[DateTimeOffset]) || matches(&[TimeOfDay]) =>
            {
                PrimitiveType::Int32
            }
            Function::Date if matches(&[DateTimeOffset]) => PrimitiveType::Date,
            Function::Time if matches(&[DateTimeOffset]) => PrimitiveType::TimeOfDay,
            Function::Now if args.is_empty() => PrimitiveType::DateTimeOffset,
            Function::Round | Function::Floor | Function::Ceiling if matches(&[Numeric]) => {
                match families[0] {
                    Some(p) if p.is_integral() => PrimitiveType::Int64,
                    Some(PrimitiveType::Decimal) => PrimitiveType::Decimal,
                    _ => PrimitiveType::Double,
                }
            }
            _ => return Err(self.invalid(args)),
        };
        Ok(result)
    }

    fn signature(&self) -> &'static str {
        match self {
            Function::Contains
            | Function::StartsWith
            | Function::EndsWith
            | Function::IndexOf
            | Function::Concat
            | Function::MatchesPattern => "(Edm.String, Edm.String)",
            Function::Length | Function::ToLower | Function::ToUpper | Function::Trim => "(Edm.String)",
            Function::Substring => "(Edm.String, integer[, integer])",
            Function::Year | Function::Month | Function::Day => "(Edm.Date) or (Edm.DateTimeOffset)",
            Function::Hour | Function::Minute | Function::Second => {
                "(Edm.DateTimeOffset) or (Edm.TimeOfDay)"
            }
            Function::Date | Function::Time => "(Edm.DateTimeOffset)",
            Function::Now => "no arguments",
            Function::Round | Function::Floor | Function::Ceiling => "(numeric)",
        }
    }

    fn invalid(&self, args: &[ExprType]) -> ExpressionError {
        ExpressionError::InvalidArguments {
            function: self.name().to_string(),
            expected: self.signature().to_string(),
            found: format!(
                "({})",
                args.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ")
            ),
        }
    }

    /// Evaluates the function over already-evaluated arguments. Any null argument yields null.
    pub fn evaluate(&self, args: &[Value]) -> Value {
        if args.iter().any(Value::is_null) {
            return Value::Null;
        }
        match (self, args) {
            (Function::Contains, [Value::String(a), Value::String(b)]) => Value::Boolean(a.contains(b.as_str())),
            (Function::StartsWith, [Value::String(a), Value::String(b)]) => {
                Value::Boolean(a.starts_with(b.as_str()))
            }
            (Function::EndsWith, [Value::String(a), Value::String(b)]) => Value::Boolean(a.ends_with(b.as_str())),
            (Function::IndexOf, [Value::String(a), Value::String(b)]) => Value::Integer(
                a.find(b.as_str())
                    .map(|i| a[..i].chars().count() as i64)
                    .unwrap_or(-1),
            ),
            (Function::Length, [Value::String(a)]) => Value::Integer(a.chars().count() as i64),
            (Function::Substring, [Value::String(s), Value::Integer(start), rest @ ..]) => {
                let chars = s.chars().skip((*start).max(0) as usize);
                match rest {
                    [] => Value::String(chars.collect()),
                    [Value::Integer(length)] => Value::String(chars.take((*length).max(0) as usize).collect()),
                    _ => Value::Null,
                }
            }
            (Function::ToLower, [Value::String(a)]) => Value::String(a.to_lowercase()),
            (Function::ToUpper, [Value::String(a)]) => Value::String(a.to_uppercase()),
            (Function::Trim, [Value::String(a)]) => Value::String(a.trim_matches(' ').to_string()),
            (Function::Concat, [Value::String(a), Value::String(b)]) => Value::String(format!("{}{}", a, b)),
            (Function::MatchesPattern, [Value::String(a), Value::String(pattern)]) => match Regex::new(pattern) {
                Ok(regex) => Value::Boolean(regex.is_match(a)),
                Err(_) => Value::Null,
            },
            (Function::Year, [Value::Date(d)]) => Value::Integer(d.year() as i64),
            (Function::Month, [Value::Date(d)]) => Value::Integer(d.month() as i64),
            (Function::Day, [Value::Date(d)]) => Value::Integer(d.day() as i64),
            (Function::Year, [Value::DateTimeOffset(dt)]) => Value::Integer(dt.naive_utc().year() as i64),
            (Function::Month, [Value::DateTimeOffset(dt)]) => Value::Integer(dt.naive_utc().month() as i64),
            (Function::Day, [Value::DateTimeOffset(dt)]) => Value::Integer(dt.naive_utc().day() as i64),
            (Function::Hour, [Value::DateTimeOffset(dt)]) => Value::Integer(dt.naive_utc().hour() as i64),
            (Function::Minute, [Value::DateTimeOffset(dt)]) => Value::Integer(dt.naive_utc().minute() as i64),
            (Function::Second, [Value::DateTimeOffset(dt)]) => Value::Integer(dt.naive_utc().second() as i64),
            (Function::Hour, [Value::TimeOfDay(t)]) => Value::Integer(t.hour() as i64),
            (Function::Minute, [Value::TimeOfDay(t)]) => Value::Integer(t.minute() as i64),
            (Function::Second, [Value::TimeOfDay(t)]) => Value::Integer(t.second() as i64),
            (Function::Date, [Value::DateTimeOffset(dt)]) => Value::Date(dt.naive_utc().date()),
            (Function::Time, [Value::DateTimeOffset(dt)]) => Value::TimeOfDay(dt.naive_utc().time()),
            (Function::Now, []) => Value::DateTimeOffset(Utc::now().fixed_offset()),
            (Function::Round | Function::Floor | Function::Ceiling, [Value::Integer(i)]) => Value::Integer(*i),
            (Function::Round, [Value::Double(d)]) => Value::Double(d.round()),
            (Function::Floor, [Value::Double(d)]) => Value::Double(d.floor()),
            (Function::Ceiling, [Value::Double(d)]) => Value::Double(d.ceil()),
            (Function::Round, [Value::Decimal(d)]) => {
                Value::Decimal(d.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
            }
            (Function::Floor, [Value::Decimal(d)]) => Value::Decimal(d.floor()),
            (Function::Ceiling, [Value::Decimal(d)]) => Value::Decimal(d.ceil()),
            _ => Value::Null,
        }
    }
}
