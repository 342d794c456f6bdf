//! `$search` expressions: words, quoted phrases, `AND`, `OR`, `NOT` and grouping.
//! Juxtaposed terms are joined with an implicit `AND`.

use std::borrow::Cow;
use std::fmt;

use super::errors::ExpressionError;
use super::lexer::{LexResult, Lexer};
use crate::config::{EngineConfig, SearchTokenization};
use crate::model::entity::Entity;
use crate::model::value::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchExpr {
    Term(String),
    And(Box<SearchExpr>, Box<SearchExpr>),
    Or(Box<SearchExpr>, Box<SearchExpr>),
    Not(Box<SearchExpr>),
}

pub fn parse_search(input: &str, config: &EngineConfig) -> Result<SearchExpr, ExpressionError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ExpressionError::syntax(input, 0, "empty search expression"));
    }
    match config.search_tokenization {
        SearchTokenization::Phrase => {
            let phrase = trimmed
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .unwrap_or(trimmed);
            Ok(SearchExpr::Term(phrase.to_string()))
        }
        SearchTokenization::Words => {
            let mut parser = SearchParser {
                lexer: Lexer::new(input),
                depth: 0,
                max_depth: config.max_expression_depth as usize,
            };
            let expr = parser.or()?;
            if !parser.lexer.is_finished() {
                return Err(parser.lexer.error("unexpected input in search expression"));
            }
            Ok(expr)
        }
    }
}

struct SearchParser<'a> {
    lexer: Lexer<'a>,
    depth: usize,
    max_depth: usize,
}

impl SearchParser<'_> {
    fn at_keyword(&mut self, keyword: &str) -> bool {
        self.lexer.whitespace();
        self.lexer
            .remaining()
            .strip_prefix(keyword)
            .is_some_and(|rest| !rest.starts_with(|c: char| c.is_alphanumeric() || c == '_'))
    }

    fn at_group_end(&mut self) -> bool {
        self.lexer.is_finished() || self.lexer.peek_char() == Some(')')
    }

    fn or(&mut self) -> LexResult<SearchExpr> {
        let mut left = self.and()?;
        while self.at_keyword("OR") {
            self.lexer.keyword("OR")?;
            let right = self.and()?;
            left = SearchExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> LexResult<SearchExpr> {
        let mut left = self.unary()?;
        loop {
            if self.at_group_end() || self.at_keyword("OR") {
                break;
            }
            if self.at_keyword("AND") {
                self.lexer.keyword("AND")?;
            }
            let right = self.unary()?;
            left = SearchExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> LexResult<SearchExpr> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(ExpressionError::TooDeep(self.max_depth));
        }
        let result = if self.at_keyword("NOT") {
            self.lexer.keyword("NOT")?;
            self.unary().map(|e| SearchExpr::Not(Box::new(e)))
        } else {
            self.primary()
        };
        self.depth -= 1;
        result
    }

    fn primary(&mut self) -> LexResult<SearchExpr> {
        self.lexer.whitespace();
        match self.lexer.peek_char() {
            Some('(') => {
                self.lexer.char('(')?;
                let inner = self.or()?;
                self.lexer.whitespace();
                self.lexer.char(')')?;
                Ok(inner)
            }
            Some('"') => {
                let phrase = self.lexer.double_quoted_string()?;
                Ok(SearchExpr::Term(phrase))
            }
            Some(_) => {
                if ["AND", "OR", "NOT"].iter().any(|k| self.at_keyword(k)) {
                    return Err(self.lexer.error("expected a search term"));
                }
                let word = self.lexer.search_word()?;
                Ok(SearchExpr::Term(word.to_string()))
            }
            None => Err(self.lexer.error("expected a search term")),
        }
    }
}

fn fold(text: &str, case_sensitive: bool) -> Cow<'_, str> {
    if case_sensitive {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(text.to_lowercase())
    }
}

impl SearchExpr {
    /// True when the expression holds over the entity's searchable properties.
    pub fn matches(&self, entity: &Entity, case_sensitive: bool) -> bool {
        match self {
            SearchExpr::Term(term) => {
                let needle = fold(term, case_sensitive);
                entity.entity_type().searchable_properties().any(|property| {
                    entity
                        .get(property.name())
                        .and_then(Value::as_str)
                        .is_some_and(|text| fold(text, case_sensitive).contains(needle.as_ref()))
                })
            }
            SearchExpr::And(l, r) => l.matches(entity, case_sensitive) && r.matches(entity, case_sensitive),
            SearchExpr::Or(l, r) => l.matches(entity, case_sensitive) || r.matches(entity, case_sensitive),
            SearchExpr::Not(inner) => !inner.matches(entity, case_sensitive),
        }
    }
}

impl fmt::Display for SearchExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchExpr::Term(term) => {
                let bare = !term.is_empty()
                    && !term.contains(|c: char| c.is_whitespace() || "()\"'".contains(c))
                    && !["AND", "OR", "NOT"].contains(&term.as_str());
                if bare {
                    f.write_str(term)
                } else {
                    write!(f, "\"{}\"", term.replace('\\', "\\\\").replace('"', "\\\""))
                }
            }
            SearchExpr::And(l, r) => write!(f, "({} AND {})", l, r),
            SearchExpr::Or(l, r) => write!(f, "({} OR {})", l, r),
            SearchExpr::Not(inner) => write!(f, "NOT {}", inner),
        }
    }
}
