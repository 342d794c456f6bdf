//! In-memory evaluation of typed filter trees with three-valued logic.
//!
//! Null propagates through comparisons, arithmetic and function calls; `and`/`or`
//! follow Kleene logic, so `false and null` is false and `true or null` is true.

use rust_decimal::Decimal;
use std::cmp::Ordering;

use super::ast::{BinaryOp, Lambda, LambdaSource, Node, Quantifier, Scope, UnaryOp};
use crate::error::ODataError;
use crate::model::entity::Entity;
use crate::model::value::Value;
use crate::model::Model;

/// An entity together with the set it was read from.
#[derive(Debug, Clone, Copy)]
pub struct Subject<'a> {
    pub set: &'a str,
    pub entity: &'a Entity,
}

#[derive(Debug, Clone, Copy)]
enum Binding<'a> {
    Entity(Subject<'a>),
    Value(&'a Value),
}

#[derive(Debug, Clone)]
pub struct EvalContext<'a> {
    model: &'a Model,
    root: Subject<'a>,
    current: Subject<'a>,
    variables: Vec<(&'a str, Binding<'a>)>,
}

impl<'a> EvalContext<'a> {
    pub fn new(model: &'a Model, entity_set: &'a str, entity: &'a Entity) -> Self {
        let root = Subject {
            set: entity_set,
            entity,
        };
        Self {
            model,
            root,
            current: root,
            variables: Vec::new(),
        }
    }

    fn with_current<'b>(&self, current: Subject<'b>) -> EvalContext<'b>
    where
        'a: 'b,
    {
        EvalContext {
            model: self.model,
            root: self.root,
            current,
            variables: self.variables.clone(),
        }
    }

    fn with_variable<'b>(&self, name: &'b str, binding: Binding<'b>) -> EvalContext<'b>
    where
        'a: 'b,
    {
        let mut ctx = self.with_current(self.current);
        ctx.variables.push((name, binding));
        ctx
    }

    fn subject(&self, scope: &Scope) -> Result<Subject<'a>, ODataError> {
        match scope {
            Scope::Root => Ok(self.root),
            Scope::Current => Ok(self.current),
            Scope::Variable(name) => match self.lookup(name) {
                Some(Binding::Entity(subject)) => Ok(subject),
                _ => Err(ODataError::internal("unbound_variable", format!("lambda variable `{}`", name))),
            },
        }
    }

    fn lookup(&self, name: &str) -> Option<Binding<'a>> {
        self.variables
            .iter()
            .rev()
            .find(|(variable, _)| *variable == name)
            .map(|(_, binding)| *binding)
    }

    /// True only when the predicate evaluates to `true`; null and false both reject.
    pub fn matches(&self, node: &Node) -> Result<bool, ODataError> {
        Ok(self.eval(node)? == Value::Boolean(true))
    }

    pub fn eval(&self, node: &Node) -> Result<Value, ODataError> {
        match node {
            Node::Literal(value) => Ok(value.clone()),
            Node::Property(property) => {
                let subject = self.subject(&property.scope)?;
                Ok(subject.entity.get(property.name()).cloned().unwrap_or(Value::Null))
            }
            Node::Navigation(navigation) => {
                let subject = self.subject(&navigation.scope)?;
                let related = self
                    .model
                    .related(&navigation.target_set, &navigation.property, subject.entity)?;
                match related.first() {
                    Some(entity) => self
                        .with_current(Subject {
                            set: &navigation.target_set,
                            entity,
                        })
                        .eval(&navigation.inner),
                    None => Ok(Value::Null),
                }
            }
            Node::Variable { name, .. } => match self.lookup(name) {
                Some(Binding::Value(value)) => Ok(value.clone()),
                _ => Err(ODataError::internal("unbound_variable", format!("lambda variable `{}`", name))),
            },
            Node::Unary(op, operand) => {
                let value = self.eval(operand)?;
                Ok(match (op, value) {
                    (UnaryOp::Not, Value::Boolean(b)) => Value::Boolean(!b),
                    (UnaryOp::Negate, Value::Integer(i)) => i.checked_neg().map(Value::Integer).unwrap_or(Value::Null),
                    (UnaryOp::Negate, Value::Decimal(d)) => Value::Decimal(-d),
                    (UnaryOp::Negate, Value::Double(d)) => Value::Double(-d),
                    (UnaryOp::Negate, Value::Duration(d)) => Value::Duration(-d),
                    _ => Value::Null,
                })
            }
            Node::Binary(op, left, right) => self.binary(*op, left, right),
            Node::In(left, items) => {
                let value = self.eval(left)?;
                if value.is_null() {
                    return Ok(Value::Null);
                }
                let mut saw_null = false;
                for item in items {
                    let candidate = self.eval(item)?;
                    if candidate.is_null() {
                        saw_null = true;
                    } else if value.compare(&candidate) == Some(Ordering::Equal) {
                        return Ok(Value::Boolean(true));
                    }
                }
                Ok(if saw_null { Value::Null } else { Value::Boolean(false) })
            }
            Node::Function(call) => {
                let args = call.args.iter().map(|arg| self.eval(arg)).collect::<Result<Vec<_>, _>>()?;
                Ok(call.function.evaluate(&args))
            }
            Node::Lambda(lambda) => self.lambda(lambda),
        }
    }

    fn binary(&self, op: BinaryOp, left: &Node, right: &Node) -> Result<Value, ODataError> {
        match op {
            BinaryOp::And => {
                let l = self.eval(left)?.as_bool();
                if l == Some(false) {
                    return Ok(Value::Boolean(false));
                }
                let r = self.eval(right)?.as_bool();
                Ok(match (l, r) {
                    (_, Some(false)) => Value::Boolean(false),
                    (Some(true), Some(true)) => Value::Boolean(true),
                    _ => Value::Null,
                })
            }
            BinaryOp::Or => {
                let l = self.eval(left)?.as_bool();
                if l == Some(true) {
                    return Ok(Value::Boolean(true));
                }
                let r = self.eval(right)?.as_bool();
                Ok(match (l, r) {
                    (_, Some(true)) => Value::Boolean(true),
                    (Some(false), Some(false)) => Value::Boolean(false),
                    _ => Value::Null,
                })
            }
            BinaryOp::Eq | BinaryOp::Ne if left.is_null_literal() || right.is_null_literal() => {
                let other = if left.is_null_literal() { right } else { left };
                let is_null = self.eval(other)?.is_null();
                Ok(Value::Boolean(if op == BinaryOp::Eq { is_null } else { !is_null }))
            }
            _ => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                if l.is_null() || r.is_null() {
                    return Ok(Value::Null);
                }
                Ok(apply(op, &l, &r))
            }
        }
    }

    fn lambda(&self, lambda: &Lambda) -> Result<Value, ODataError> {
        let subject = self.subject(&lambda.scope)?;
        match &lambda.source {
            LambdaSource::Navigation { property, target_set } => {
                let related = self.model.related(target_set, property, subject.entity)?;
                let (Some(variable), Some(predicate)) = (&lambda.variable, &lambda.predicate) else {
                    return Ok(Value::Boolean(!related.is_empty()));
                };
                let mut results = Vec::with_capacity(related.len());
                for entity in &related {
                    let binding = Binding::Entity(Subject { set: target_set, entity });
                    results.push(self.with_variable(variable, binding).matches(predicate)?);
                }
                Ok(Value::Boolean(quantify(lambda.quantifier, &results)))
            }
            LambdaSource::Collection(property) => {
                let items = match subject.entity.get(property.name()) {
                    Some(Value::Collection(items)) => items.as_slice(),
                    _ => &[],
                };
                let (Some(variable), Some(predicate)) = (&lambda.variable, &lambda.predicate) else {
                    return Ok(Value::Boolean(!items.is_empty()));
                };
                let mut results = Vec::with_capacity(items.len());
                for item in items {
                    results.push(self.with_variable(variable, Binding::Value(item)).matches(predicate)?);
                }
                Ok(Value::Boolean(quantify(lambda.quantifier, &results)))
            }
        }
    }
}

fn quantify(quantifier: Quantifier, results: &[bool]) -> bool {
    match quantifier {
        Quantifier::Any => results.iter().any(|r| *r),
        Quantifier::All => results.iter().all(|r| *r),
    }
}

fn as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Integer(i) => Some(Decimal::from(*i)),
        Value::Decimal(d) => Some(*d),
        _ => None,
    }
}

/// Applies a non-logical binary operator to two non-null operands.
fn apply(op: BinaryOp, l: &Value, r: &Value) -> Value {
    if op.is_equality() || op.is_relational() {
        let ordering = l.compare(r);
        let result = match op {
            BinaryOp::Eq => ordering == Some(Ordering::Equal),
            BinaryOp::Ne => ordering != Some(Ordering::Equal),
            _ => match ordering {
                Some(o) => match op {
                    BinaryOp::Lt => o == Ordering::Less,
                    BinaryOp::Le => o != Ordering::Greater,
                    BinaryOp::Gt => o == Ordering::Greater,
                    _ => o != Ordering::Less,
                },
                None => return Value::Null,
            },
        };
        return Value::Boolean(result);
    }

    if op == BinaryOp::Has {
        return match (l, r) {
            (Value::Enum(value), Value::Enum(flag)) => Value::Boolean(value.has_flag(flag.value())),
            _ => Value::Null,
        };
    }

    if op == BinaryOp::DivBy {
        return match (l.as_f64(), r.as_f64()) {
            (Some(_), Some(d)) if d == 0.0 => Value::Null,
            (Some(n), Some(d)) => Value::Double(n / d),
            _ => Value::Null,
        };
    }

    match (l, r) {
        (Value::Integer(a), Value::Integer(b)) => {
            let result = match op {
                BinaryOp::Add => a.checked_add(*b),
                BinaryOp::Sub => a.checked_sub(*b),
                BinaryOp::Mul => a.checked_mul(*b),
                BinaryOp::Div => a.checked_div(*b),
                BinaryOp::Mod => a.checked_rem(*b),
                _ => None,
            };
            result.map(Value::Integer).unwrap_or(Value::Null)
        }
        (Value::Double(_), _) | (_, Value::Double(_)) => {
            let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) else {
                return Value::Null;
            };
            match op {
                BinaryOp::Add => Value::Double(a + b),
                BinaryOp::Sub => Value::Double(a - b),
                BinaryOp::Mul => Value::Double(a * b),
                BinaryOp::Div if b != 0.0 => Value::Double(a / b),
                BinaryOp::Mod if b != 0.0 => Value::Double(a % b),
                _ => Value::Null,
            }
        }
        _ => {
            let (Some(a), Some(b)) = (as_decimal(l), as_decimal(r)) else {
                return Value::Null;
            };
            let result = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Sub => a.checked_sub(b),
                BinaryOp::Mul => a.checked_mul(b),
                BinaryOp::Div => a.checked_div(b),
                BinaryOp::Mod => a.checked_rem(b),
                _ => None,
            };
            result.map(Value::Decimal).unwrap_or(Value::Null)
        }
    }
}
