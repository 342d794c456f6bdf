//! Cursor-based lexer shared by the query option parsers.
//!
//! Individual matchers are nom recognizers applied at the cursor. A failed match never
//! consumes input, and [`Lexer::with`] rewinds composite matchers that fail half-way.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1, take_while_m_n},
    character::complete::{char, digit1, one_of, satisfy},
    combinator::{opt, recognize},
    multi::many0,
    sequence::pair,
    IResult, Parser,
};

use super::errors::ExpressionError;

pub type LexResult<T> = Result<T, ExpressionError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    String,
    Integer,
    Decimal,
    Double,
    Boolean,
    Null,
    Date,
    DateTimeOffset,
    TimeOfDay,
    Duration,
    Guid,
    Enum,
    OpenParen,
    CloseParen,
    Comma,
    Slash,
    Colon,
    Minus,
}

/// A lexed token. `text` holds the decoded content for string literals, the ISO 8601
/// body for durations and the raw source text otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub position: usize,
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn identifier_core(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        opt(char('$')),
        pair(
            satisfy(|c: char| c.is_alphabetic() || c == '_'),
            take_while(is_identifier_char),
        ),
    ))
    .parse(input)
}

fn qualified_identifier_core(input: &str) -> IResult<&str, &str> {
    recognize(pair(identifier_core, many0(pair(char('.'), identifier_core)))).parse(input)
}

fn digits<'a>(n: usize) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    take_while_m_n(n, n, |c: char| c.is_ascii_digit())
}

fn hex<'a>(n: usize) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    take_while_m_n(n, n, |c: char| c.is_ascii_hexdigit())
}

fn date_core(input: &str) -> IResult<&str, &str> {
    recognize((digits(4), char('-'), digits(2), char('-'), digits(2))).parse(input)
}

fn time_core(input: &str) -> IResult<&str, &str> {
    recognize((
        digits(2),
        char(':'),
        digits(2),
        opt((char(':'), digits(2), opt((char('.'), digit1)))),
    ))
    .parse(input)
}

fn offset_core(input: &str) -> IResult<&str, &str> {
    alt((
        tag("Z"),
        tag("z"),
        recognize((one_of("+-"), digits(2), char(':'), digits(2))),
    ))
    .parse(input)
}

fn date_time_offset_core(input: &str) -> IResult<&str, &str> {
    recognize((date_core, one_of("Tt"), time_core, offset_core)).parse(input)
}

fn guid_core(input: &str) -> IResult<&str, &str> {
    recognize((
        hex(8),
        char('-'),
        hex(4),
        char('-'),
        hex(4),
        char('-'),
        hex(4),
        char('-'),
        hex(12),
    ))
    .parse(input)
}

/// 12, -3, 4.5, 1e3, -2.5E-4
fn number_core(input: &str) -> IResult<&str, &str> {
    recognize((
        opt(char('-')),
        digit1,
        opt((char('.'), digit1)),
        opt((one_of("eE"), opt(one_of("+-")), digit1)),
    ))
    .parse(input)
}

fn special_double(input: &str) -> IResult<&str, &str> {
    alt((tag("-INF"), tag("INF"), tag("NaN"))).parse(input)
}

fn search_word_core(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace() && c != '(' && c != ')' && c != '"').parse(input)
}

pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    pub fn input(&self) -> &'a str {
        self.input
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    /// True once only whitespace is left.
    pub fn is_finished(&mut self) -> bool {
        self.whitespace();
        self.remaining().is_empty()
    }

    pub fn error(&self, message: impl Into<String>) -> ExpressionError {
        ExpressionError::syntax(self.input, self.pos, message)
    }

    /// Runs `matcher`, rewinding the cursor when it fails.
    pub fn with<T>(&mut self, matcher: impl FnOnce(&mut Self) -> LexResult<T>) -> Option<T> {
        let start = self.pos;
        match matcher(self) {
            Ok(value) => Some(value),
            Err(_) => {
                self.pos = start;
                None
            }
        }
    }

    fn recognize<O>(
        &mut self,
        mut parser: impl Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>,
        expected: &str,
    ) -> LexResult<O> {
        match parser.parse(self.remaining()) {
            Ok((rest, output)) => {
                self.pos = self.input.len() - rest.len();
                Ok(output)
            }
            Err(_) => Err(self.error(format!("expected {}", expected))),
        }
    }

    /// Like `recognize`, but the match must not run into an identifier character.
    fn bounded(
        &mut self,
        parser: impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>>,
        expected: &str,
    ) -> LexResult<&'a str> {
        let start = self.pos;
        let text = self.recognize(parser, expected)?;
        if self.peek_char().is_some_and(is_identifier_char) {
            self.pos = start;
            return Err(self.error(format!("expected {}", expected)));
        }
        Ok(text)
    }

    pub fn whitespace(&mut self) {
        let rest = self.remaining();
        self.pos += rest.len() - rest.trim_start().len();
    }

    pub fn peek_char(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    pub fn char(&mut self, c: char) -> LexResult<char> {
        self.recognize(char(c), &format!("'{}'", c))
    }

    /// Case-sensitive keyword not followed by an identifier character.
    pub fn keyword(&mut self, keyword: &str) -> LexResult<&'a str> {
        self.bounded(tag(keyword), keyword)
    }

    pub fn identifier(&mut self) -> LexResult<&'a str> {
        self.recognize(identifier_core, "an identifier")
    }

    pub fn qualified_identifier(&mut self) -> LexResult<&'a str> {
        self.recognize(qualified_identifier_core, "a qualified identifier")
    }

    /// Single-quoted string with `''` as the escaped quote. Returns the decoded content.
    pub fn quoted_string(&mut self) -> LexResult<String> {
        self.delimited_string('\'', false)
    }

    /// Double-quoted phrase with backslash escapes, as used by `$search`.
    pub fn double_quoted_string(&mut self) -> LexResult<String> {
        self.delimited_string('"', true)
    }

    fn delimited_string(&mut self, quote: char, backslash_escapes: bool) -> LexResult<String> {
        let start = self.pos;
        self.char(quote)?;
        let mut out = String::new();
        let mut chars = self.remaining().char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if backslash_escapes && c == '\\' {
                if let Some((_, escaped)) = chars.next() {
                    out.push(escaped);
                    continue;
                }
                break;
            }
            if c == quote {
                if !backslash_escapes && chars.peek().map(|(_, n)| *n) == Some(quote) {
                    chars.next();
                    out.push(quote);
                    continue;
                }
                self.pos += i + c.len_utf8();
                return Ok(out);
            }
            out.push(c);
        }
        self.pos = start;
        Err(self.error("unterminated string literal"))
    }

    /// Numeric literal and its kind: integer, decimal (has a fraction) or double (has an exponent).
    pub fn number(&mut self) -> LexResult<(TokenKind, &'a str)> {
        if let Some(text) = self.with(|l| l.bounded(special_double, "a number")) {
            return Ok((TokenKind::Double, text));
        }
        let text = self.bounded(number_core, "a number")?;
        let kind = if text.contains(['e', 'E']) {
            TokenKind::Double
        } else if text.contains('.') {
            TokenKind::Decimal
        } else {
            TokenKind::Integer
        };
        Ok((kind, text))
    }

    pub fn date(&mut self) -> LexResult<&'a str> {
        self.bounded(date_core, "a date")
    }

    pub fn date_time_offset(&mut self) -> LexResult<&'a str> {
        self.bounded(date_time_offset_core, "a date-time offset")
    }

    pub fn time_of_day(&mut self) -> LexResult<&'a str> {
        self.bounded(time_core, "a time of day")
    }

    pub fn guid(&mut self) -> LexResult<&'a str> {
        self.bounded(guid_core, "a guid")
    }

    /// `duration'P1DT2H'`, returning the ISO 8601 body.
    pub fn duration(&mut self) -> LexResult<String> {
        let start = self.pos;
        self.recognize(tag("duration"), "a duration")?;
        match self.quoted_string() {
            Ok(body) => Ok(body),
            Err(e) => {
                self.pos = start;
                Err(e)
            }
        }
    }

    /// `Namespace.Type'member1,member2'`, returning the type name and the member list.
    pub fn enum_literal(&mut self) -> LexResult<(&'a str, String)> {
        let start = self.pos;
        let name = self.qualified_identifier()?;
        if self.peek_char() != Some('\'') {
            self.pos = start;
            return Err(self.error("expected an enumeration literal"));
        }
        let members = self.quoted_string().inspect_err(|_| self.pos = start)?;
        Ok((name, members))
    }

    /// Consumes a balanced `( ... )` group and returns its inner text.
    /// Parentheses inside single-quoted strings are ignored.
    pub fn matching_parenthesis(&mut self) -> LexResult<&'a str> {
        let start = self.pos;
        self.char('(')?;
        let inner_start = self.pos;
        let mut depth = 1usize;
        let mut in_string = false;
        for (i, c) in self.remaining().char_indices() {
            match c {
                '\'' => in_string = !in_string,
                '(' if !in_string => depth += 1,
                ')' if !in_string => {
                    depth -= 1;
                    if depth == 0 {
                        let inner = &self.input[inner_start..inner_start + i];
                        self.pos = inner_start + i + 1;
                        return Ok(inner);
                    }
                }
                _ => {}
            }
        }
        self.pos = start;
        Err(self.error("unbalanced parenthesis"))
    }

    /// A bare `$search` word: anything up to whitespace, a parenthesis or a quote.
    pub fn search_word(&mut self) -> LexResult<&'a str> {
        self.recognize(search_word_core, "a search term")
    }

    /// Next token of a `$filter` expression, or `None` at end of input.
    pub fn next_token(&mut self) -> LexResult<Option<Token>> {
        self.whitespace();
        let position = self.pos;
        let Some(c) = self.peek_char() else {
            return Ok(None);
        };
        let token = |kind: TokenKind, text: &str| Token {
            kind,
            text: text.to_string(),
            position,
        };

        let punctuation = match c {
            '(' => Some(TokenKind::OpenParen),
            ')' => Some(TokenKind::CloseParen),
            ',' => Some(TokenKind::Comma),
            '/' => Some(TokenKind::Slash),
            ':' => Some(TokenKind::Colon),
            _ => None,
        };
        if let Some(kind) = punctuation {
            self.pos += c.len_utf8();
            return Ok(Some(token(kind, &c.to_string())));
        }

        if c == '\'' {
            let text = self.quoted_string()?;
            return Ok(Some(token(TokenKind::String, &text)));
        }

        if let Some(text) = self.with(|l| l.guid()) {
            return Ok(Some(token(TokenKind::Guid, text)));
        }
        if let Some(text) = self.with(|l| l.date_time_offset()) {
            return Ok(Some(token(TokenKind::DateTimeOffset, text)));
        }
        if let Some(text) = self.with(|l| l.date()) {
            return Ok(Some(token(TokenKind::Date, text)));
        }
        if let Some(text) = self.with(|l| l.time_of_day()) {
            return Ok(Some(token(TokenKind::TimeOfDay, text)));
        }
        if let Some((kind, text)) = self.with(|l| l.number()) {
            return Ok(Some(token(kind, text)));
        }
        if c == '-' {
            self.pos += 1;
            return Ok(Some(token(TokenKind::Minus, "-")));
        }
        if let Some(body) = self.with(|l| l.duration()) {
            return Ok(Some(token(TokenKind::Duration, &body)));
        }
        for (keyword, kind) in [
            ("true", TokenKind::Boolean),
            ("false", TokenKind::Boolean),
            ("null", TokenKind::Null),
        ] {
            if let Some(text) = self.with(|l| l.keyword(keyword)) {
                return Ok(Some(token(kind, text)));
            }
        }
        if self.with(|l| l.enum_literal()).is_some() {
            let text = &self.input[position..self.pos];
            return Ok(Some(token(TokenKind::Enum, text)));
        }
        if let Some(text) = self.with(|l| l.qualified_identifier()) {
            return Ok(Some(token(TokenKind::Identifier, text)));
        }

        Err(self.error(format!("unexpected character '{}'", c)))
    }
}

/// Splits a `$filter` expression into tokens.
pub fn tokenize(input: &str) -> Result<Vec<Token>, ExpressionError> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}
