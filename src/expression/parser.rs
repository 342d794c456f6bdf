//! `$filter` parser: precedence climbing over lexer tokens with parse-time type checks.
//!
//! Precedence, tightest first: member access / `has` / `in` / calls, unary `not` and
//! `-`, `mul div divby mod`, `add sub`, `lt le gt ge`, `eq ne`, `and`, `or`.

use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use super::ast::{
    BinaryOp, ExprType, FunctionCall, Lambda, LambdaSource, NavigationNode, Node, PropertyRef,
    Quantifier, Scope, UnaryOp, UNARY_PRECEDENCE,
};
use super::errors::ExpressionError;
use super::functions::Function;
use super::lexer::{tokenize, Token, TokenKind};
use crate::model::entity_type::EntityType;
use crate::model::types::PrimitiveType;
use crate::model::value::{parse_date, parse_date_time_offset, parse_duration, parse_time_of_day, EnumValue, Value};
use crate::model::Model;

type ParseResult<T> = Result<T, ExpressionError>;

const IN_PRECEDENCE: u8 = 8;

/// Parses `expression` as a `$filter` over `entity_set`, producing a boolean tree.
pub fn parse_filter(model: &Model, entity_set: &str, expression: &str) -> ParseResult<Node> {
    let set = model
        .entity_set(entity_set)
        .ok_or_else(|| ExpressionError::UnknownEntitySet(entity_set.to_string()))?;
    let root = EntityFrame {
        set: set.name().to_string(),
        entity_type: set.entity_type().clone(),
    };
    FilterParser::new(model, root, expression)?.parse()
}

/// Parses a single literal such as `42`, `'lhr'` or `Priorities'high'`.
pub fn parse_literal(model: &Model, text: &str) -> ParseResult<Value> {
    let tokens = tokenize(text)?;
    match tokens.as_slice() {
        [token] => literal_value(model, text, token),
        [] => Err(ExpressionError::syntax(text, 0, "expected a literal")),
        [_, extra, ..] => Err(ExpressionError::syntax(text, extra.position, "expected a single literal")),
    }
}

#[derive(Debug, Clone)]
struct EntityFrame {
    set: String,
    entity_type: Arc<EntityType>,
}

#[derive(Debug, Clone)]
enum Frame {
    Entity { variable: String, target: EntityFrame },
    Element { variable: String, element: PrimitiveType },
}

impl Frame {
    fn variable(&self) -> &str {
        match self {
            Frame::Entity { variable, .. } | Frame::Element { variable, .. } => variable,
        }
    }
}

struct FilterParser<'a> {
    model: &'a Model,
    input: &'a str,
    tokens: Vec<Token>,
    cursor: usize,
    root: EntityFrame,
    frames: Vec<Frame>,
    depth: usize,
    max_depth: usize,
}

impl<'a> FilterParser<'a> {
    fn new(model: &'a Model, root: EntityFrame, input: &'a str) -> ParseResult<Self> {
        Ok(Self {
            model,
            input,
            tokens: tokenize(input)?,
            cursor: 0,
            root,
            frames: Vec::new(),
            depth: 0,
            max_depth: model.config().max_expression_depth as usize,
        })
    }

    fn parse(mut self) -> ParseResult<Node> {
        if self.tokens.is_empty() {
            return Err(ExpressionError::syntax(self.input, 0, "empty expression"));
        }
        let node = self.expression(0)?;
        if let Some(token) = self.peek() {
            return Err(self.error_at(token.position, format!("unexpected `{}`", token.text)));
        }
        let ty = node.expr_type();
        if !ty.is_boolean() {
            return Err(ExpressionError::NotBoolean(ty.to_string()));
        }
        Ok(node)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).cloned();
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> ExpressionError {
        ExpressionError::syntax(self.input, offset, message)
    }

    fn error_here(&self, message: impl Into<String>) -> ExpressionError {
        let offset = self.peek().map(|t| t.position).unwrap_or(self.input.len());
        self.error_at(offset, message)
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> ParseResult<Token> {
        match self.peek_kind() {
            Some(k) if k == kind => self.advance().ok_or_else(|| self.error_here(what)),
            _ => Err(self.error_here(format!("expected {}", what))),
        }
    }

    fn expect_identifier(&mut self) -> ParseResult<Token> {
        self.expect(TokenKind::Identifier, "an identifier")
    }

    fn expression(&mut self, min_precedence: u8) -> ParseResult<Node> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(ExpressionError::TooDeep(self.max_depth));
        }
        let result = self.climb(min_precedence);
        self.depth -= 1;
        result
    }

    fn climb(&mut self, min_precedence: u8) -> ParseResult<Node> {
        let mut left = self.unary()?;
        loop {
            let Some(token) = self.peek().cloned() else {
                break;
            };
            if token.kind != TokenKind::Identifier {
                break;
            }
            if token.text == "in" {
                if IN_PRECEDENCE < min_precedence {
                    break;
                }
                self.advance();
                left = self.in_list(left)?;
                continue;
            }
            let Some(op) = BinaryOp::from_keyword(&token.text) else {
                break;
            };
            if op.precedence() < min_precedence {
                break;
            }
            self.advance();
            let right = self.expression(op.precedence() + 1)?;
            left = self.binary(op, left, right)?;
        }
        Ok(left)
    }

    fn unary(&mut self) -> ParseResult<Node> {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Identifier && t.text == "not" => {
                self.advance();
                let operand = self.expression(UNARY_PRECEDENCE)?;
                let ty = operand.expr_type();
                if !ty.is_boolean() {
                    return Err(ExpressionError::type_mismatch("not", &ty, "Edm.Boolean"));
                }
                Ok(Node::Unary(UnaryOp::Not, Box::new(operand)))
            }
            Some(t) if t.kind == TokenKind::Minus => {
                self.advance();
                let operand = self.expression(UNARY_PRECEDENCE)?;
                let ty = operand.expr_type();
                let negatable = match &ty {
                    ExprType::Null => true,
                    ExprType::Primitive(p) => p.is_numeric() || *p == PrimitiveType::Duration,
                    ExprType::Collection(_) => false,
                };
                if !negatable {
                    return Err(ExpressionError::type_mismatch("-", &ty, "numeric"));
                }
                Ok(Node::Unary(UnaryOp::Negate, Box::new(operand)))
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> ParseResult<Node> {
        let Some(token) = self.advance() else {
            return Err(self.error_here("expected an operand"));
        };
        match token.kind {
            TokenKind::OpenParen => {
                let node = self.expression(0)?;
                self.expect(TokenKind::CloseParen, "')'")?;
                Ok(node)
            }
            TokenKind::Identifier if self.peek_kind() == Some(TokenKind::OpenParen) => self.function_call(&token),
            TokenKind::Identifier => self.member_path(token),
            TokenKind::CloseParen | TokenKind::Comma | TokenKind::Slash | TokenKind::Colon | TokenKind::Minus => {
                Err(self.error_at(token.position, format!("unexpected `{}`", token.text)))
            }
            _ => Ok(Node::Literal(literal_value(self.model, self.input, &token)?)),
        }
    }

    fn function_call(&mut self, name: &Token) -> ParseResult<Node> {
        let function =
            Function::from_name(&name.text).ok_or_else(|| ExpressionError::UnknownFunction(name.text.clone()))?;
        self.expect(TokenKind::OpenParen, "'('")?;
        let mut args = Vec::new();
        if self.peek_kind() != Some(TokenKind::CloseParen) {
            loop {
                args.push(self.expression(0)?);
                if self.peek_kind() == Some(TokenKind::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::CloseParen, "')'")?;

        let types: Vec<ExprType> = args.iter().map(Node::expr_type).collect();
        let return_type = function.check(&types)?;
        if function == Function::MatchesPattern {
            if let Some(Node::Literal(Value::String(pattern))) = args.get(1) {
                Regex::new(pattern).map_err(|e| self.error_at(name.position, format!("invalid pattern: {}", e)))?;
            }
        }
        Ok(Node::Function(FunctionCall {
            function,
            args,
            return_type,
        }))
    }

    fn member_path(&mut self, first: Token) -> ParseResult<Node> {
        if first.text == "$it" {
            self.expect(TokenKind::Slash, "'/' after $it")?;
            let segment = self.expect_identifier()?;
            let root = self.root.clone();
            return self.segment(Scope::Root, root, segment);
        }

        let bound = self.frames.iter().rev().find(|f| f.variable() == first.text).cloned();
        match bound {
            Some(Frame::Entity { variable, target }) => {
                self.expect(TokenKind::Slash, "'/' after lambda variable")?;
                let segment = self.expect_identifier()?;
                self.segment(Scope::Variable(variable), target, segment)
            }
            Some(Frame::Element { variable, element }) => {
                if self.peek_kind() == Some(TokenKind::Slash) {
                    return Err(self.error_here("cannot navigate into a primitive value"));
                }
                Ok(Node::Variable {
                    name: variable,
                    element,
                })
            }
            None => {
                let (scope, frame) = self.implicit_frame();
                self.segment(scope, frame, first)
            }
        }
    }

    /// Unqualified names resolve against the innermost entity-valued lambda variable, else the root.
    fn implicit_frame(&self) -> (Scope, EntityFrame) {
        for frame in self.frames.iter().rev() {
            if let Frame::Entity { variable, target } = frame {
                return (Scope::Variable(variable.clone()), target.clone());
            }
        }
        (Scope::Root, self.root.clone())
    }

    fn segment(&mut self, scope: Scope, frame: EntityFrame, token: Token) -> ParseResult<Node> {
        let name = token.text;
        if let Some(property) = frame.entity_type.declared_property(&name) {
            let property = property.clone();
            if property.property_type().is_collection() {
                if self.peek_kind() != Some(TokenKind::Slash) {
                    return Err(ExpressionError::CollectionNotQuantified(name));
                }
                self.advance();
                let element = property.property_type().element().clone();
                return self.lambda(scope, LambdaSource::Collection(property), |variable| Frame::Element {
                    variable,
                    element,
                });
            }
            if self.peek_kind() == Some(TokenKind::Slash) {
                return Err(self.error_here(format!("`{}` is not a navigation property", name)));
            }
            return Ok(Node::Property(PropertyRef::new(scope, property)));
        }

        if let Some(navigation) = frame.entity_type.navigation_property(&name) {
            let navigation = navigation.clone();
            let target_set = self
                .model
                .navigation_target(&frame.set, &name)
                .ok_or_else(|| ExpressionError::UnboundNavigation(name.clone()))?
                .to_string();
            let target_type = self
                .model
                .entity_set(&target_set)
                .map(|s| s.entity_type().clone())
                .ok_or_else(|| ExpressionError::UnknownEntitySet(target_set.clone()))?;
            let target = EntityFrame {
                set: target_set.clone(),
                entity_type: target_type,
            };

            if navigation.is_collection() {
                if self.peek_kind() != Some(TokenKind::Slash) {
                    return Err(ExpressionError::CollectionNotQuantified(name));
                }
                self.advance();
                let source = LambdaSource::Navigation {
                    property: navigation,
                    target_set,
                };
                return self.lambda(scope, source, |variable| Frame::Entity { variable, target });
            }

            self.expect(TokenKind::Slash, "'/' after navigation property")?;
            let next = self.expect_identifier()?;
            let inner = self.segment(Scope::Current, target, next)?;
            return Ok(Node::Navigation(NavigationNode {
                scope,
                property: navigation,
                target_set,
                inner: Box::new(inner),
            }));
        }

        Err(ExpressionError::UnknownProperty(name))
    }

    fn lambda(
        &mut self,
        scope: Scope,
        source: LambdaSource,
        frame: impl FnOnce(String) -> Frame,
    ) -> ParseResult<Node> {
        let keyword = self.expect_identifier()?;
        let quantifier = match keyword.text.as_str() {
            "any" => Quantifier::Any,
            "all" => Quantifier::All,
            _ => return Err(self.error_at(keyword.position, "expected any or all")),
        };
        self.expect(TokenKind::OpenParen, "'('")?;

        if self.peek_kind() == Some(TokenKind::CloseParen) {
            if quantifier == Quantifier::All {
                return Err(self.error_here("all() requires a lambda predicate"));
            }
            self.advance();
            return Ok(Node::Lambda(Lambda {
                scope,
                source,
                quantifier,
                variable: None,
                predicate: None,
            }));
        }

        let variable = self.expect_identifier()?.text;
        if variable == "$it" || self.frames.iter().any(|f| f.variable() == variable) {
            return Err(ExpressionError::DuplicateVariable(variable));
        }
        self.expect(TokenKind::Colon, "':'")?;

        self.frames.push(frame(variable.clone()));
        let predicate = self.expression(0);
        self.frames.pop();
        let predicate = predicate?;

        let ty = predicate.expr_type();
        if !ty.is_boolean() {
            return Err(ExpressionError::NotBoolean(ty.to_string()));
        }
        self.expect(TokenKind::CloseParen, "')'")?;

        Ok(Node::Lambda(Lambda {
            scope,
            source,
            quantifier,
            variable: Some(variable),
            predicate: Some(Box::new(predicate)),
        }))
    }

    fn in_list(&mut self, left: Node) -> ParseResult<Node> {
        self.expect(TokenKind::OpenParen, "'(' after in")?;
        let left_type = left.expr_type();
        let mut items = Vec::new();
        loop {
            let item = self.expression(0)?;
            let item_type = item.expr_type();
            if !comparable(&left_type, &item_type) {
                return Err(ExpressionError::type_mismatch("in", &left_type, &item_type));
            }
            items.push(item);
            if self.peek_kind() == Some(TokenKind::Comma) {
                self.advance();
                continue;
            }
            break;
        }
        self.expect(TokenKind::CloseParen, "')'")?;
        Ok(Node::In(Box::new(left), items))
    }

    fn binary(&self, op: BinaryOp, left: Node, right: Node) -> ParseResult<Node> {
        let (lt, rt) = (left.expr_type(), right.expr_type());
        let ok = if op.is_logical() {
            lt.is_boolean() && rt.is_boolean()
        } else if op.is_equality() || op.is_relational() {
            comparable(&lt, &rt)
        } else if op == BinaryOp::Has {
            matches!(
                (lt.primitive(), rt.primitive()),
                (Some(PrimitiveType::Enum(a)), Some(PrimitiveType::Enum(b))) if a.name() == b.name()
            ) || (lt == ExprType::Null && matches!(rt.primitive(), Some(PrimitiveType::Enum(_))))
        } else {
            let numeric = |t: &ExprType| match t {
                ExprType::Null => true,
                ExprType::Primitive(p) => p.is_numeric() && (op != BinaryOp::Mod || p.is_integral()),
                ExprType::Collection(_) => false,
            };
            numeric(&lt) && numeric(&rt)
        };
        if !ok {
            return Err(ExpressionError::type_mismatch(op.keyword(), &lt, &rt));
        }
        Ok(Node::Binary(op, Box::new(left), Box::new(right)))
    }
}

fn comparable(left: &ExprType, right: &ExprType) -> bool {
    match (left, right) {
        (ExprType::Collection(_), _) | (_, ExprType::Collection(_)) => false,
        (ExprType::Null, _) | (_, ExprType::Null) => true,
        (ExprType::Primitive(a), ExprType::Primitive(b)) => a.comparable_with(b),
    }
}

fn literal_value(model: &Model, input: &str, token: &Token) -> ParseResult<Value> {
    let invalid = |what: &str| ExpressionError::syntax(input, token.position, format!("invalid {} literal", what));
    let text = token.text.as_str();
    let value = match token.kind {
        TokenKind::String => Value::String(token.text.clone()),
        TokenKind::Integer => match text.parse::<i64>() {
            Ok(i) => Value::Integer(i),
            Err(_) => Value::Decimal(Decimal::from_str(text).map_err(|_| invalid("integer"))?),
        },
        TokenKind::Decimal => Value::Decimal(Decimal::from_str(text).map_err(|_| invalid("decimal"))?),
        TokenKind::Double => Value::Double(match text {
            "INF" => f64::INFINITY,
            "-INF" => f64::NEG_INFINITY,
            "NaN" => f64::NAN,
            _ => text.parse::<f64>().map_err(|_| invalid("double"))?,
        }),
        TokenKind::Boolean => Value::Boolean(text == "true"),
        TokenKind::Null => Value::Null,
        TokenKind::Date => Value::Date(parse_date(text).ok_or_else(|| invalid("date"))?),
        TokenKind::DateTimeOffset => {
            Value::DateTimeOffset(parse_date_time_offset(text).ok_or_else(|| invalid("date-time offset"))?)
        }
        TokenKind::TimeOfDay => Value::TimeOfDay(parse_time_of_day(text).ok_or_else(|| invalid("time of day"))?),
        TokenKind::Duration => Value::Duration(parse_duration(text).ok_or_else(|| invalid("duration"))?),
        TokenKind::Guid => Value::Guid(Uuid::parse_str(text).map_err(|_| invalid("guid"))?),
        TokenKind::Enum => {
            let (name, quoted) = text.split_once('\'').ok_or_else(|| invalid("enumeration"))?;
            let members = quoted.strip_suffix('\'').unwrap_or(quoted).replace("''", "'");
            let enumeration = model
                .enumeration(name)
                .ok_or_else(|| ExpressionError::UnknownEnumeration(name.to_string()))?;
            let value = enumeration
                .parse_members(&members)
                .map_err(|_| ExpressionError::InvalidEnumMember {
                    enumeration: enumeration.name().to_string(),
                    member: members.clone(),
                })?;
            Value::Enum(EnumValue::new(enumeration.clone(), value))
        }
        _ => return Err(ExpressionError::syntax(input, token.position, format!("unexpected `{}`", text))),
    };
    Ok(value)
}
