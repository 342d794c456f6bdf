use super::errors::ExpressionError;
use super::lexer::Lexer;

/// One `$expand` item: a navigation property with optional nested options text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandItem {
    pub navigation: String,
    pub options: Option<String>,
}

/// Parses `nav1, nav2($filter=...;$top=2)`.
pub fn parse_expand(input: &str) -> Result<Vec<ExpandItem>, ExpressionError> {
    let mut lexer = Lexer::new(input);
    let mut items = Vec::new();
    loop {
        lexer.whitespace();
        let navigation = lexer.identifier()?.to_string();
        lexer.whitespace();
        let options = if lexer.peek_char() == Some('(') {
            Some(lexer.matching_parenthesis()?.trim().to_string())
        } else {
            None
        };
        items.push(ExpandItem { navigation, options });

        if lexer.is_finished() {
            break;
        }
        lexer.char(',')?;
    }
    Ok(items)
}

/// Splits nested expand options on top-level `;` into `(name, value)` pairs.
pub fn split_nested_options(text: &str) -> Result<Vec<(String, String)>, ExpressionError> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '\'' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => depth = depth.saturating_sub(1),
            ';' if !in_string && depth == 0 => {
                parts.push((start, &text[start..i]));
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push((start, &text[start..]));

    parts
        .into_iter()
        .filter(|(_, part)| !part.trim().is_empty())
        .map(|(offset, part)| {
            let (name, value) = part
                .split_once('=')
                .ok_or_else(|| ExpressionError::syntax(text, offset, "expected `$option=value`"))?;
            Ok((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}
