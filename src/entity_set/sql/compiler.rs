//! Translation of filter, search and orderby trees into parameterized SQL.
//!
//! Literals become positional parameters, property references become quoted
//! `alias.column` pairs. Output is deterministic for a given tree.

use log::debug;
use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;

use super::dialect::SqlDialect;
use super::errors::SqlError;
use super::function_registry::get_function_mapping;
use super::joins::{discover_joins, join_alias, SqlJoinDefinition};
use crate::expression::ast::{BinaryOp, Lambda, LambdaSource, Node, Quantifier, Scope, UnaryOp};
use crate::expression::orderby::{SortDirection, SortKey};
use crate::expression::search::SearchExpr;
use crate::model::entity_type::EntityType;
use crate::model::types::PrimitiveType;
use crate::model::value::Value;

fn is_duration(node: &Node) -> bool {
    matches!(node.expr_type().primitive(), Some(PrimitiveType::Duration))
}

/// Alias of the queried table.
pub const ROOT_ALIAS: &str = "$it";

/// Table backing an entity set.
#[derive(Debug, Clone)]
pub struct SqlTable {
    pub name: String,
    pub entity_type: Arc<EntityType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Parts of a `SELECT` assembled by [`SqlBuilder::select_statement`].
#[derive(Debug, Default)]
pub struct SelectParts {
    pub conditions: Vec<String>,
    pub order_by: Option<String>,
    pub skip: Option<u64>,
    pub top: Option<u64>,
}

#[derive(Debug, Clone)]
struct Frame {
    alias: String,
    entity_type: Arc<EntityType>,
}

/// Per-call SQL builder holding the parameter accumulator and discovered joins.
pub struct SqlBuilder<'r> {
    dialect: SqlDialect,
    table: SqlTable,
    resolve: &'r dyn Fn(&str) -> Option<SqlTable>,
    params: Vec<Value>,
    joins: Vec<SqlJoinDefinition>,
    variables: Vec<(String, Frame)>,
    lambda_depth: usize,
}

impl<'r> SqlBuilder<'r> {
    pub fn new(dialect: SqlDialect, table: SqlTable, resolve: &'r dyn Fn(&str) -> Option<SqlTable>) -> Self {
        Self {
            dialect,
            table,
            resolve,
            params: Vec::new(),
            joins: Vec::new(),
            variables: Vec::new(),
            lambda_depth: 0,
        }
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn joins(&self) -> &[SqlJoinDefinition] {
        &self.joins
    }

    /// Runs `compile`, discarding any parameters and joins it added when it fails.
    pub fn attempt<T>(&mut self, compile: impl FnOnce(&mut Self) -> Result<T, SqlError>) -> Result<T, SqlError> {
        let (params, joins) = (self.params.len(), self.joins.len());
        let result = compile(self);
        if result.is_err() {
            self.params.truncate(params);
            self.joins.truncate(joins);
            self.variables.clear();
            self.lambda_depth = 0;
        }
        result
    }

    /// Adds a parameter and returns its placeholder.
    pub fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        self.dialect.placeholder(self.params.len())
    }

    fn quote(&self, identifier: &str) -> String {
        self.dialect.quote(identifier)
    }

    fn column(&self, alias: &str, column: &str) -> String {
        format!("{}.{}", self.quote(alias), self.quote(column))
    }

    fn root_frame(&self) -> Frame {
        Frame {
            alias: ROOT_ALIAS.to_string(),
            entity_type: self.table.entity_type.clone(),
        }
    }

    fn frame(&self, scope: &Scope) -> Result<Frame, SqlError> {
        match scope {
            Scope::Root => Ok(self.root_frame()),
            Scope::Variable(name) => self
                .variables
                .iter()
                .rev()
                .find(|(v, _)| v == name)
                .map(|(_, frame)| frame.clone())
                .ok_or_else(|| SqlError::Unsupported(format!("unbound lambda variable `{}`", name))),
            Scope::Current => Err(SqlError::Unsupported("member access outside a navigation path".into())),
        }
    }

    fn resolve(&self, entity_set: &str) -> Result<SqlTable, SqlError> {
        (self.resolve)(entity_set)
            .ok_or_else(|| SqlError::Unsupported(format!("entity set `{}` has no SQL table", entity_set)))
    }

    /// Compiles a boolean filter tree into a `WHERE` condition.
    pub fn compile_filter(&mut self, node: &Node) -> Result<String, SqlError> {
        let joins = discover_joins(node, &self.table.entity_type, self.resolve)?;
        for join in joins {
            if !self.joins.iter().any(|j| j.alias == join.alias) {
                self.joins.push(join);
            }
        }
        let root = self.root_frame();
        let sql = self.expression(node, &root)?;
        debug!("Compiled filter `{}` to {}", node, sql);
        Ok(sql)
    }

    fn expression(&mut self, node: &Node, current: &Frame) -> Result<String, SqlError> {
        match node {
            Node::Literal(Value::Null) => Ok("NULL".to_string()),
            Node::Literal(Value::Enum(e)) => Ok(e.value().to_string()),
            Node::Literal(Value::Collection(_)) => Err(SqlError::Unsupported("collection literal".into())),
            Node::Literal(value) => Ok(self.bind(value.clone())),
            Node::Property(property) => {
                let frame = match &property.scope {
                    Scope::Current => current.clone(),
                    scope => self.frame(scope)?,
                };
                Ok(self.column(&frame.alias, property.property.column()))
            }
            Node::Navigation(navigation) => {
                if self.lambda_depth > 0 {
                    return Err(SqlError::Unsupported(format!(
                        "navigation `{}` inside a lambda",
                        navigation.property.name()
                    )));
                }
                let parent = match &navigation.scope {
                    Scope::Root => None,
                    Scope::Current => Some(current.alias.as_str()),
                    Scope::Variable(_) => {
                        return Err(SqlError::Unsupported("navigation from a lambda variable".into()))
                    }
                };
                let alias = join_alias(parent, navigation.property.name());
                let table = self.resolve(&navigation.target_set)?;
                let frame = Frame {
                    alias,
                    entity_type: table.entity_type,
                };
                self.expression(&navigation.inner, &frame)
            }
            Node::Variable { name, .. } => Err(SqlError::Unsupported(format!(
                "primitive lambda variable `{}`",
                name
            ))),
            Node::Unary(UnaryOp::Not, operand) => Ok(format!("(NOT {})", self.expression(operand, current)?)),
            Node::Unary(UnaryOp::Negate, operand) if is_duration(operand) => {
                Err(SqlError::Unsupported("arithmetic on Edm.Duration".into()))
            }
            Node::Unary(UnaryOp::Negate, operand) => Ok(format!("(-{})", self.expression(operand, current)?)),
            Node::Binary(op, left, right) => self.binary(*op, left, right, current),
            Node::In(left, items) => {
                let left = self.expression(left, current)?;
                let items = items
                    .iter()
                    .map(|item| self.expression(item, current))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!("({} IN ({}))", left, items.join(", ")))
            }
            Node::Function(call) => {
                let name = call.function.name();
                let mapping = get_function_mapping(name, call.args.len())
                    .ok_or_else(|| SqlError::Unsupported(format!("function `{}`", name)))?;
                if !self.dialect.numbered_placeholders() && mapping.repeats_arguments(self.dialect, call.args.len()) {
                    return Err(SqlError::Unsupported(format!("function `{}` in {}", name, self.dialect)));
                }
                let args = call
                    .args
                    .iter()
                    .map(|arg| self.expression(arg, current))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(mapping.render(self.dialect, &args))
            }
            Node::Lambda(lambda) => self.lambda(lambda),
        }
    }

    fn binary(&mut self, op: BinaryOp, left: &Node, right: &Node, current: &Frame) -> Result<String, SqlError> {
        if op.is_equality() && (left.is_null_literal() || right.is_null_literal()) {
            let other = if left.is_null_literal() { right } else { left };
            let sql = self.expression(other, current)?;
            return Ok(match op {
                BinaryOp::Eq => format!("({} IS NULL)", sql),
                _ => format!("({} IS NOT NULL)", sql),
            });
        }

        // durations are stored as ISO 8601 text, which only supports equality
        let logical = matches!(op, BinaryOp::And | BinaryOp::Or);
        if !logical && !op.is_equality() && (is_duration(left) || is_duration(right)) {
            return Err(SqlError::Unsupported(format!("{:?} on Edm.Duration", op)));
        }

        let integral = |node: &Node| node.expr_type().primitive().is_some_and(PrimitiveType::is_integral);
        let both_integral = integral(left) && integral(right);
        let l = self.expression(left, current)?;
        let r = self.expression(right, current)?;
        let sql = match op {
            BinaryOp::And => format!("({} AND {})", l, r),
            BinaryOp::Or => format!("({} OR {})", l, r),
            BinaryOp::Eq => format!("({} = {})", l, r),
            BinaryOp::Ne => format!("({} <> {})", l, r),
            BinaryOp::Lt => format!("({} < {})", l, r),
            BinaryOp::Le => format!("({} <= {})", l, r),
            BinaryOp::Gt => format!("({} > {})", l, r),
            BinaryOp::Ge => format!("({} >= {})", l, r),
            BinaryOp::Add => format!("({} + {})", l, r),
            BinaryOp::Sub => format!("({} - {})", l, r),
            BinaryOp::Mul => format!("({} * {})", l, r),
            BinaryOp::Div if both_integral => self.dialect.integer_division(&l, &r),
            BinaryOp::Div => format!("({} / {})", l, r),
            BinaryOp::DivBy => format!("({} / {})", self.dialect.real_cast(&l), r),
            BinaryOp::Mod => self.dialect.modulo(&l, &r),
            // the right operand is an inlined enum literal, so repeating it binds nothing twice
            BinaryOp::Has => format!("(({} & {}) = {})", l, r, r),
        };
        Ok(sql)
    }

    fn lambda(&mut self, lambda: &Lambda) -> Result<String, SqlError> {
        let LambdaSource::Navigation { property, target_set } = &lambda.source else {
            return Err(SqlError::Unsupported(format!(
                "lambda over primitive collection `{}`",
                lambda.source.name()
            )));
        };
        let parent = self.frame(&lambda.scope)?;
        let constraint = property.constraint().ok_or_else(|| {
            SqlError::Unsupported(format!("navigation `{}` without a single referential constraint", property.name()))
        })?;
        let table = self.resolve(target_set)?;
        let relation = table
            .entity_type
            .declared_property(&constraint.referenced_property)
            .ok_or_else(|| SqlError::UnknownProperty(constraint.referenced_property.clone()))?;
        let related = parent
            .entity_type
            .declared_property(&constraint.property)
            .ok_or_else(|| SqlError::UnknownProperty(constraint.property.clone()))?;

        self.lambda_depth += 1;
        let alias = match &lambda.variable {
            Some(variable) => variable.clone(),
            None => format!("$any{}", self.lambda_depth),
        };
        let correlation = format!(
            "{} = {}",
            self.column(&alias, relation.column()),
            self.column(&parent.alias, related.column())
        );
        let from = format!("{} AS {}", self.quote(&table.name), self.quote(&alias));

        let predicate = match (&lambda.variable, &lambda.predicate) {
            (Some(variable), Some(predicate)) => {
                let frame = Frame {
                    alias: alias.clone(),
                    entity_type: table.entity_type.clone(),
                };
                self.variables.push((variable.clone(), frame.clone()));
                let compiled = self.expression(predicate, &frame);
                self.variables.pop();
                Some(compiled?)
            }
            _ => None,
        };
        self.lambda_depth -= 1;

        Ok(match (lambda.quantifier, predicate) {
            (_, None) => format!("EXISTS (SELECT 1 FROM {} WHERE {})", from, correlation),
            (Quantifier::Any, Some(predicate)) => {
                format!("EXISTS (SELECT 1 FROM {} WHERE {} AND {})", from, correlation, predicate)
            }
            (Quantifier::All, Some(predicate)) => format!(
                "NOT EXISTS (SELECT 1 FROM {} WHERE {} AND NOT COALESCE({}, {}))",
                from,
                correlation,
                predicate,
                self.dialect.false_literal()
            ),
        })
    }

    /// Compiles a `$search` expression over the searchable string properties.
    pub fn compile_search(&mut self, search: &SearchExpr, case_sensitive: bool) -> Result<String, SqlError> {
        let sql = match search {
            SearchExpr::Term(term) => {
                let columns: Vec<String> = self
                    .table
                    .entity_type
                    .searchable_properties()
                    .map(|p| self.column(ROOT_ALIAS, p.column()))
                    .collect();
                if columns.is_empty() {
                    return Ok("(1 = 0)".to_string());
                }
                let false_literal = self.dialect.false_literal();
                let tests: Vec<String> = columns
                    .iter()
                    .map(|column| {
                        let test = if case_sensitive {
                            let needle = self.bind(Value::String(term.clone()));
                            self.dialect.contains(column, &needle)
                        } else {
                            let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
                            let needle = self.bind(Value::String(pattern));
                            format!("(LOWER({}) LIKE {} ESCAPE '!')", column, needle)
                        };
                        format!("COALESCE({}, {})", test, false_literal)
                    })
                    .collect();
                format!("({})", tests.join(" OR "))
            }
            SearchExpr::And(l, r) => format!(
                "({} AND {})",
                self.compile_search(l, case_sensitive)?,
                self.compile_search(r, case_sensitive)?
            ),
            SearchExpr::Or(l, r) => format!(
                "({} OR {})",
                self.compile_search(l, case_sensitive)?,
                self.compile_search(r, case_sensitive)?
            ),
            SearchExpr::Not(inner) => format!("(NOT {})", self.compile_search(inner, case_sensitive)?),
        };
        Ok(sql)
    }

    /// `ORDER BY` list for `keys`, with the key property appended as the final tie-breaker.
    pub fn compile_orderby(&self, keys: &[SortKey]) -> Result<Option<String>, SqlError> {
        if let Some(key) = keys
            .iter()
            .find(|k| *k.property.property_type().element() == PrimitiveType::Duration)
        {
            return Err(SqlError::Unsupported(format!(
                "ordering by Edm.Duration property `{}`",
                key.property.name()
            )));
        }
        let mut terms: Vec<String> = keys
            .iter()
            .map(|key| {
                let column = self.column(ROOT_ALIAS, key.property.column());
                self.dialect
                    .order_term(&column, key.direction == SortDirection::Descending)
            })
            .collect();
        if let Some(key) = self.table.entity_type.key() {
            if !keys.iter().any(|k| k.property.name() == key.name()) {
                terms.push(self.dialect.order_term(&self.column(ROOT_ALIAS, key.column()), false));
            }
        }
        Ok(if terms.is_empty() {
            None
        } else {
            Some(terms.join(", "))
        })
    }

    fn from_clause(&self) -> String {
        let mut sql = format!("{} AS {}", self.quote(&self.table.name), self.quote(ROOT_ALIAS));
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.to_sql(self.dialect));
        }
        sql
    }

    fn where_clause(conditions: &[String]) -> String {
        if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        }
    }

    /// Selects every declared property, aliased by property name.
    pub fn select_statement(self, parts: SelectParts) -> SqlStatement {
        let columns = self
            .table
            .entity_type
            .declared_properties()
            .iter()
            .map(|p| format!("{} AS {}", self.column(ROOT_ALIAS, p.column()), self.quote(p.name())))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!(
            "SELECT {} FROM {}{}",
            columns,
            self.from_clause(),
            Self::where_clause(&parts.conditions)
        );
        if let Some(order_by) = parts.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_by);
        }
        if let Some(limit) = self.dialect.limit_clause(parts.skip, parts.top) {
            sql.push(' ');
            sql.push_str(&limit);
        }
        debug!("SQL: {} {:?}", sql, self.params);
        SqlStatement {
            sql,
            params: self.params,
        }
    }

    pub fn count_statement(self, conditions: &[String]) -> SqlStatement {
        let sql = format!(
            "SELECT COUNT(*) AS {} FROM {}{}",
            self.quote("count"),
            self.from_clause(),
            Self::where_clause(conditions)
        );
        debug!("SQL: {} {:?}", sql, self.params);
        SqlStatement {
            sql,
            params: self.params,
        }
    }

    /// Finishes a statement written by the caller with this builder's parameters.
    pub fn finish(self, sql: String) -> SqlStatement {
        debug!("SQL: {} {:?}", sql, self.params);
        SqlStatement {
            sql,
            params: self.params,
        }
    }
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '!' | '%' | '_') {
            escaped.push('!');
        }
        escaped.push(c);
    }
    escaped
}

/// Decimal parameters travel as doubles for drivers without a decimal type.
pub fn decimal_to_f64(value: &rust_decimal::Decimal) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}
