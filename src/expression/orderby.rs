use std::cmp::Ordering;
use std::fmt;

use super::errors::ExpressionError;
use super::lexer::Lexer;
use crate::model::entity::Entity;
use crate::model::entity_type::{DeclaredProperty, EntityType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub property: DeclaredProperty,
    pub direction: SortDirection,
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            SortDirection::Ascending => f.write_str(self.property.name()),
            SortDirection::Descending => write!(f, "{} desc", self.property.name()),
        }
    }
}

/// Parses `prop [asc|desc], ...` against the declared properties of `entity_type`.
pub fn parse_orderby(input: &str, entity_type: &EntityType) -> Result<Vec<SortKey>, ExpressionError> {
    let mut lexer = Lexer::new(input);
    let mut keys = Vec::new();
    loop {
        lexer.whitespace();
        let name = lexer.identifier()?;
        if lexer.peek_char() == Some('/') {
            return Err(lexer.error("ordering by a navigation path is not supported"));
        }
        let property = entity_type
            .declared_property(name)
            .ok_or_else(|| ExpressionError::UnknownProperty(name.to_string()))?;
        if property.property_type().is_collection() {
            return Err(ExpressionError::syntax(
                input,
                lexer.position() - name.len(),
                format!("cannot order by collection `{}`", name),
            ));
        }

        lexer.whitespace();
        let direction = if lexer.with(|l| l.keyword("desc")).is_some() {
            SortDirection::Descending
        } else {
            lexer.with(|l| l.keyword("asc"));
            SortDirection::Ascending
        };
        keys.push(SortKey {
            property: property.clone(),
            direction,
        });

        if lexer.is_finished() {
            break;
        }
        lexer.char(',')?;
    }
    Ok(keys)
}

/// Orders two entities by `keys`; nulls sort first when ascending.
pub fn compare_entities(a: &Entity, b: &Entity, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let left = a.get(key.property.name()).filter(|v| !v.is_null());
        let right = b.get(key.property.name()).filter(|v| !v.is_null());
        let ordering = match (left, right) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(l), Some(r)) => l.compare(r).unwrap_or(Ordering::Equal),
        };
        let ordering = match key.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
