//! Join discovery for single-valued navigation paths in filter trees.

use std::collections::HashSet;

use super::compiler::{SqlTable, ROOT_ALIAS};
use super::dialect::SqlDialect;
use super::errors::SqlError;
use crate::expression::ast::{Node, Scope};
use crate::model::entity_type::EntityType;

/// A `LEFT JOIN` produced by a navigation hop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlJoinDefinition {
    pub alias: String,
    pub table: String,
    /// Column on the joined table (the referenced property)
    pub relation_column: String,
    pub parent_alias: String,
    /// Column on the parent table (the constraint property)
    pub related_column: String,
}

impl SqlJoinDefinition {
    pub fn to_sql(&self, dialect: SqlDialect) -> String {
        format!(
            "LEFT JOIN {} AS {} ON {}.{} = {}.{}",
            dialect.quote(&self.table),
            dialect.quote(&self.alias),
            dialect.quote(&self.alias),
            dialect.quote(&self.relation_column),
            dialect.quote(&self.parent_alias),
            dialect.quote(&self.related_column),
        )
    }
}

/// Alias of the join reached by `navigation` from `parent` (`None` for the root).
pub fn join_alias(parent: Option<&str>, navigation: &str) -> String {
    match parent {
        Some(parent) => format!("{}_{}", parent, navigation),
        None => navigation.to_string(),
    }
}

/// Keeps the first join for each alias, preserving order.
pub fn deduplicate_joins(joins: Vec<SqlJoinDefinition>) -> Vec<SqlJoinDefinition> {
    let mut seen = HashSet::new();
    joins
        .into_iter()
        .filter(|join| seen.insert(join.alias.clone()))
        .collect()
}

/// Collects the joins needed by root-scoped navigation paths in `node`.
///
/// `resolve` maps an entity set name to its table. Lambdas contribute no joins.
pub fn discover_joins(
    node: &Node,
    root_type: &EntityType,
    resolve: &dyn Fn(&str) -> Option<SqlTable>,
) -> Result<Vec<SqlJoinDefinition>, SqlError> {
    let mut joins = Vec::new();
    let root = Parent {
        alias: None,
        entity_type: root_type,
    };
    collect(node, &root, &root, resolve, &mut joins)?;
    Ok(deduplicate_joins(joins))
}

struct Parent<'a> {
    alias: Option<&'a str>,
    entity_type: &'a EntityType,
}

fn collect(
    node: &Node,
    root: &Parent<'_>,
    current: &Parent<'_>,
    resolve: &dyn Fn(&str) -> Option<SqlTable>,
    joins: &mut Vec<SqlJoinDefinition>,
) -> Result<(), SqlError> {
    match node {
        Node::Navigation(navigation) => {
            let parent = match &navigation.scope {
                Scope::Root => root,
                Scope::Current => current,
                Scope::Variable(_) => return Ok(()),
            };
            let constraint = navigation.property.constraint().ok_or_else(|| {
                SqlError::Unsupported(format!(
                    "navigation `{}` without a single referential constraint",
                    navigation.property.name()
                ))
            })?;
            let table = resolve(&navigation.target_set).ok_or_else(|| {
                SqlError::Unsupported(format!("entity set `{}` has no SQL table", navigation.target_set))
            })?;
            let relation = table
                .entity_type
                .declared_property(&constraint.referenced_property)
                .ok_or_else(|| SqlError::UnknownProperty(constraint.referenced_property.clone()))?;
            let related = parent
                .entity_type
                .declared_property(&constraint.property)
                .ok_or_else(|| SqlError::UnknownProperty(constraint.property.clone()))?;
            let alias = join_alias(parent.alias, navigation.property.name());
            joins.push(SqlJoinDefinition {
                alias: alias.clone(),
                table: table.name.clone(),
                relation_column: relation.column().to_string(),
                parent_alias: parent.alias.unwrap_or(ROOT_ALIAS).to_string(),
                related_column: related.column().to_string(),
            });
            let next = Parent {
                alias: Some(&alias),
                entity_type: &table.entity_type,
            };
            collect(&navigation.inner, root, &next, resolve, joins)
        }
        Node::Unary(_, operand) => collect(operand, root, current, resolve, joins),
        Node::Binary(_, left, right) => {
            collect(left, root, current, resolve, joins)?;
            collect(right, root, current, resolve, joins)
        }
        Node::In(left, items) => {
            collect(left, root, current, resolve, joins)?;
            items
                .iter()
                .try_for_each(|item| collect(item, root, current, resolve, joins))
        }
        Node::Function(call) => call
            .args
            .iter()
            .try_for_each(|arg| collect(arg, root, current, resolve, joins)),
        Node::Literal(_) | Node::Property(_) | Node::Variable { .. } | Node::Lambda(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::parser::parse_filter;
    use crate::testing;

    fn tables(model: &crate::model::Model) -> impl Fn(&str) -> Option<SqlTable> + '_ {
        move |set| {
            model.entity_set(set).map(|s| SqlTable {
                name: set.to_string(),
                entity_type: s.entity_type().clone(),
            })
        }
    }

    #[test]
    fn test_same_navigation_yields_one_join() {
        let model = testing::model();
        let tree = parse_filter(
            &model,
            "flights",
            "originAirport/name eq 'Heathrow' or originAirport/code eq 'lgw'",
        )
        .unwrap();
        let joins = discover_joins(&tree, model.entity_type("Flight").unwrap(), &tables(&model)).unwrap();
        assert_eq!(joins.len(), 1);
        assert_eq!(joins[0].alias, "originAirport");
        assert_eq!(joins[0].relation_column, "code");
        assert_eq!(joins[0].related_column, "origin");
    }

    #[test]
    fn test_two_relations_to_same_table_get_distinct_aliases() {
        let model = testing::model();
        let tree = parse_filter(
            &model,
            "flights",
            "originAirport/country_id eq destinationAirport/country_id",
        )
        .unwrap();
        let joins = discover_joins(&tree, model.entity_type("Flight").unwrap(), &tables(&model)).unwrap();
        let aliases: Vec<&str> = joins.iter().map(|j| j.alias.as_str()).collect();
        assert_eq!(aliases, vec!["originAirport", "destinationAirport"]);
        assert!(joins.iter().all(|j| j.table == "airports"));
    }

    #[test]
    fn test_lambdas_contribute_no_joins() {
        let model = testing::model();
        let tree = parse_filter(&model, "countries", "airports/any(a:a/code eq 'lhr')").unwrap();
        let country = model.entity_type("Country").unwrap();
        assert!(discover_joins(&tree, country, &tables(&model)).unwrap().is_empty());
    }

    #[test]
    fn test_join_sql() {
        let join = SqlJoinDefinition {
            alias: "originAirport".into(),
            table: "airports".into(),
            relation_column: "code".into(),
            parent_alias: ROOT_ALIAS.into(),
            related_column: "origin".into(),
        };
        assert_eq!(
            join.to_sql(SqlDialect::Sqlite),
            "LEFT JOIN \"airports\" AS \"originAirport\" ON \"originAirport\".\"code\" = \"$it\".\"origin\""
        );
    }
}
