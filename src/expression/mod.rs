//! Query option expression languages: `$filter`, `$search`, `$orderby` and `$expand`.

pub mod ast;
pub mod errors;
pub mod eval;
pub mod expand;
pub mod functions;
pub mod lexer;
pub mod orderby;
pub mod parser;
pub mod search;

pub use ast::Node;
pub use errors::ExpressionError;
pub use eval::EvalContext;
pub use parser::{parse_filter as generate_tree, parse_literal};
pub use search::SearchExpr;
