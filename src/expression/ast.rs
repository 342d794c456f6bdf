use std::fmt;

use super::functions::Function;
use crate::model::entity_type::{DeclaredProperty, NavigationProperty};
use crate::model::types::{PrimitiveType, PropertyType};
use crate::model::value::Value;

/// What an unqualified member path is resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// The entity being filtered (`$it`).
    Root,
    /// The entity reached by the enclosing navigation segment.
    Current,
    /// The entity bound to a lambda variable.
    Variable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRef {
    pub scope: Scope,
    pub property: DeclaredProperty,
}

impl PropertyRef {
    pub fn new(scope: Scope, property: DeclaredProperty) -> Self {
        Self { scope, property }
    }

    pub fn name(&self) -> &str {
        self.property.name()
    }
}

/// A single-valued navigation segment followed by the rest of the member path.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationNode {
    pub scope: Scope,
    pub property: NavigationProperty,
    pub target_set: String,
    pub inner: Box<Node>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    Any,
    All,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LambdaSource {
    Navigation {
        property: NavigationProperty,
        target_set: String,
    },
    Collection(DeclaredProperty),
}

impl LambdaSource {
    pub fn name(&self) -> &str {
        match self {
            LambdaSource::Navigation { property, .. } => property.name(),
            LambdaSource::Collection(property) => property.name(),
        }
    }
}

/// `source/any(v:predicate)`, `source/all(v:predicate)` or `source/any()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub scope: Scope,
    pub source: LambdaSource,
    pub quantifier: Quantifier,
    pub variable: Option<String>,
    pub predicate: Option<Box<Node>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    DivBy,
    Mod,
    Has,
}

/// Binding power of prefix operators (`not`, `-`).
pub const UNARY_PRECEDENCE: u8 = 7;

impl BinaryOp {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let op = match keyword {
            "eq" => BinaryOp::Eq,
            "ne" => BinaryOp::Ne,
            "lt" => BinaryOp::Lt,
            "le" => BinaryOp::Le,
            "gt" => BinaryOp::Gt,
            "ge" => BinaryOp::Ge,
            "and" => BinaryOp::And,
            "or" => BinaryOp::Or,
            "add" => BinaryOp::Add,
            "sub" => BinaryOp::Sub,
            "mul" => BinaryOp::Mul,
            "div" => BinaryOp::Div,
            "divby" => BinaryOp::DivBy,
            "mod" => BinaryOp::Mod,
            "has" => BinaryOp::Has,
            _ => return None,
        };
        Some(op)
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            BinaryOp::Eq => "eq",
            BinaryOp::Ne => "ne",
            BinaryOp::Lt => "lt",
            BinaryOp::Le => "le",
            BinaryOp::Gt => "gt",
            BinaryOp::Ge => "ge",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::DivBy => "divby",
            BinaryOp::Mod => "mod",
            BinaryOp::Has => "has",
        }
    }

    /// Higher binds tighter: or < and < equality < relational < additive < multiplicative < has.
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq | BinaryOp::Ne => 3,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 4,
            BinaryOp::Add | BinaryOp::Sub => 5,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::DivBy | BinaryOp::Mod => 6,
            BinaryOp::Has => 8,
        }
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn is_equality(&self) -> bool {
        matches!(self, BinaryOp::Eq | BinaryOp::Ne)
    }

    pub fn is_relational(&self) -> bool {
        matches!(self, BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge)
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::DivBy | BinaryOp::Mod
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub function: Function,
    pub args: Vec<Node>,
    pub return_type: PrimitiveType,
}

/// Typed expression tree produced by the filter parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Literal(Value),
    Property(PropertyRef),
    Navigation(NavigationNode),
    /// Lambda variable bound to a primitive collection element.
    Variable { name: String, element: PrimitiveType },
    Unary(UnaryOp, Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    In(Box<Node>, Vec<Node>),
    Function(FunctionCall),
    Lambda(Lambda),
}

/// Static type of an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprType {
    Null,
    Primitive(PrimitiveType),
    Collection(PrimitiveType),
}

impl ExprType {
    pub fn boolean() -> Self {
        ExprType::Primitive(PrimitiveType::Boolean)
    }

    /// Boolean or the untyped null literal.
    pub fn is_boolean(&self) -> bool {
        matches!(self, ExprType::Null | ExprType::Primitive(PrimitiveType::Boolean))
    }

    pub fn primitive(&self) -> Option<&PrimitiveType> {
        match self {
            ExprType::Primitive(p) => Some(p),
            _ => None,
        }
    }
}

impl From<&PropertyType> for ExprType {
    fn from(ty: &PropertyType) -> Self {
        match ty {
            PropertyType::Primitive(p) => ExprType::Primitive(p.clone()),
            PropertyType::Collection(p) => ExprType::Collection(p.clone()),
        }
    }
}

impl fmt::Display for ExprType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprType::Null => f.write_str("null"),
            ExprType::Primitive(p) => write!(f, "{}", p),
            ExprType::Collection(p) => write!(f, "Collection({})", p),
        }
    }
}

impl Node {
    pub fn and(left: Node, right: Node) -> Node {
        Node::Binary(BinaryOp::And, Box::new(left), Box::new(right))
    }

    pub fn is_null_literal(&self) -> bool {
        matches!(self, Node::Literal(Value::Null))
    }

    pub fn expr_type(&self) -> ExprType {
        match self {
            Node::Literal(value) => match value {
                Value::Null => ExprType::Null,
                Value::Collection(items) => items
                    .iter()
                    .find_map(PrimitiveType::of_value)
                    .map(ExprType::Collection)
                    .unwrap_or(ExprType::Null),
                other => PrimitiveType::of_value(other)
                    .map(ExprType::Primitive)
                    .unwrap_or(ExprType::Null),
            },
            Node::Property(p) => p.property.property_type().into(),
            Node::Navigation(n) => n.inner.expr_type(),
            Node::Variable { element, .. } => ExprType::Primitive(element.clone()),
            Node::Unary(UnaryOp::Not, _) => ExprType::boolean(),
            Node::Unary(UnaryOp::Negate, operand) => operand.expr_type(),
            Node::Binary(op, left, right) => {
                if op.is_arithmetic() {
                    arithmetic_type(*op, &left.expr_type(), &right.expr_type())
                } else {
                    ExprType::boolean()
                }
            }
            Node::In(..) | Node::Lambda(_) => ExprType::boolean(),
            Node::Function(call) => ExprType::Primitive(call.return_type.clone()),
        }
    }

    fn write(&self, f: &mut fmt::Formatter<'_>, in_lambda: bool) -> fmt::Result {
        match self {
            Node::Literal(value) => f.write_str(&value.to_url()),
            Node::Property(p) => {
                write_scope(f, &p.scope, in_lambda)?;
                f.write_str(p.name())
            }
            Node::Navigation(n) => {
                write_scope(f, &n.scope, in_lambda)?;
                write!(f, "{}/", n.property.name())?;
                n.inner.write(f, in_lambda)
            }
            Node::Variable { name, .. } => f.write_str(name),
            Node::Unary(op, operand) => {
                f.write_str(match op {
                    UnaryOp::Not => "not (",
                    UnaryOp::Negate => "-(",
                })?;
                operand.write(f, in_lambda)?;
                f.write_str(")")
            }
            Node::Binary(op, left, right) => {
                f.write_str("(")?;
                left.write(f, in_lambda)?;
                write!(f, " {} ", op.keyword())?;
                right.write(f, in_lambda)?;
                f.write_str(")")
            }
            Node::In(left, items) => {
                f.write_str("(")?;
                left.write(f, in_lambda)?;
                f.write_str(" in (")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.write(f, in_lambda)?;
                }
                f.write_str("))")
            }
            Node::Function(call) => {
                write!(f, "{}(", call.function.name())?;
                for (i, arg) in call.args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    arg.write(f, in_lambda)?;
                }
                f.write_str(")")
            }
            Node::Lambda(lambda) => {
                write_scope(f, &lambda.scope, in_lambda)?;
                let quantifier = match lambda.quantifier {
                    Quantifier::Any => "any",
                    Quantifier::All => "all",
                };
                write!(f, "{}/{}(", lambda.source.name(), quantifier)?;
                if let (Some(variable), Some(predicate)) = (&lambda.variable, &lambda.predicate) {
                    write!(f, "{}:", variable)?;
                    predicate.write(f, true)?;
                }
                f.write_str(")")
            }
        }
    }
}

fn write_scope(f: &mut fmt::Formatter<'_>, scope: &Scope, in_lambda: bool) -> fmt::Result {
    match scope {
        Scope::Root if in_lambda => f.write_str("$it/"),
        Scope::Root | Scope::Current => Ok(()),
        Scope::Variable(v) => write!(f, "{}/", v),
    }
}

/// Serializes the tree back into `$filter` syntax.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, false)
    }
}

/// Result type of an arithmetic operator over numeric operands.
pub fn arithmetic_type(op: BinaryOp, left: &ExprType, right: &ExprType) -> ExprType {
    if op == BinaryOp::DivBy {
        return ExprType::Primitive(PrimitiveType::Double);
    }
    match (left.primitive(), right.primitive()) {
        (None, None) => ExprType::Null,
        (Some(p), None) | (None, Some(p)) => ExprType::Primitive(widen(p)),
        (Some(a), Some(b)) => {
            if a.is_floating() || b.is_floating() {
                ExprType::Primitive(PrimitiveType::Double)
            } else if *a == PrimitiveType::Decimal || *b == PrimitiveType::Decimal {
                ExprType::Primitive(PrimitiveType::Decimal)
            } else {
                ExprType::Primitive(PrimitiveType::Int64)
            }
        }
    }
}

fn widen(p: &PrimitiveType) -> PrimitiveType {
    if p.is_floating() {
        PrimitiveType::Double
    } else if p.is_integral() {
        PrimitiveType::Int64
    } else {
        p.clone()
    }
}
