//! sailfoil parser: converts a token stream into a declaration AST.

mod parse_decl;
mod parse_expr;
mod parse_stmt;
mod parse_type;
mod parser;

pub use parser::{ParseResult, Parser};

use sailfoil_lexer::Lexer;
use sailfoil_types::SourceFile;

/// Lex and parse a source file in one step.
///
/// Lexer diagnostics come first in the returned error list.
pub fn parse_source(source_file: &SourceFile) -> ParseResult {
    let lexed = Lexer::new(source_file).lex();
    let mut result = Parser::new(lexed.tokens, source_file).parse();
    let mut errors = lexed.errors;
    errors.extend(result.errors);
    result.errors = errors;
    result
}
