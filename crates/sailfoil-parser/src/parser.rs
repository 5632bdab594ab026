//! Core parser infrastructure: token cursor, error reporting, helpers.

use sailfoil_lexer::token::{Token, TokenKind};
use sailfoil_types::ast::{Ident, Module};
use sailfoil_types::{CompileErrors, ErrorCode, FoilError, SourceFile, Span};

/// Recursive-descent parser over a lexed token stream.
///
/// Errors are collected and parsing resumes at the next statement or
/// declaration boundary.
pub struct Parser<'src> {
    /// The token stream, always terminated by `Eof`.
    tokens: Vec<Token>,
    /// Current index into `tokens`.
    pos: usize,
    /// Source file for error context.
    source_file: &'src SourceFile,
    /// Collected errors.
    errors: CompileErrors,
}

/// Result of parsing one source file.
pub struct ParseResult {
    /// `None` only when parsing could not produce a module at all.
    pub module: Option<Module>,
    pub errors: CompileErrors,
}

impl<'src> Parser<'src> {
    /// Create a parser over `tokens`, appending `Eof` if the stream lacks it.
    pub fn new(mut tokens: Vec<Token>, source_file: &'src SourceFile) -> Self {
        if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
            let span = tokens.last().map_or(Span::point(1, 1), |t| t.span);
            tokens.push(Token::new(TokenKind::Eof, span));
        }
        Self {
            tokens,
            pos: 0,
            source_file,
            errors: CompileErrors::empty(),
        }
    }

    // ── Token Cursor ──────────────────────────────────────────────────────────

    /// Returns the current token without advancing.
    ///
    /// Never fails: the stream always ends with Eof and the cursor never
    /// moves past it.
    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    /// Returns the kind of the current token.
    pub(crate) fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    /// Advance the cursor by one and return the consumed token. Stays on `Eof`.
    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    /// Returns the previously consumed token's span.
    pub(crate) fn previous_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            Span::point(1, 1)
        }
    }

    /// Returns the span of the current token.
    pub(crate) fn current_span(&self) -> Span {
        self.peek().span
    }

    /// Returns `true` if the current token is `Eof`.
    pub(crate) fn at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    /// Check if the current token matches the given kind exactly.
    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    /// If the current token matches, advance and return `true`.
    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Look ahead by `n` tokens from the current position; `Eof` past the end.
    pub(crate) fn look_ahead(&self, n: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    // ── Expect Helpers ────────────────────────────────────────────────────────

    /// Expect a specific token kind. Returns the token if matched, or emits an error.
    pub(crate) fn expect(&mut self, expected: &TokenKind) -> Option<Token> {
        if self.check(expected) {
            Some(self.advance())
        } else {
            self.error_at_current(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("expected '{}', got '{}'", expected, self.peek_kind()),
            );
            None
        }
    }

    /// Expect an identifier token. Returns the name and span.
    pub(crate) fn expect_identifier(&mut self) -> Option<Ident> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                let span = self.advance().span;
                Some(Ident::new(name, span))
            }
            other => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected identifier, got '{other}'"),
                );
                None
            }
        }
    }

    /// Expect a string literal token. Returns the unescaped value.
    pub(crate) fn expect_string_literal(&mut self) -> Option<String> {
        match self.peek_kind().clone() {
            TokenKind::StringLit(s) => {
                self.advance();
                Some(s)
            }
            other => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected string literal, got '{other}'"),
                );
                None
            }
        }
    }

    /// A non-negative integer literal, such as a jump target or field index.
    pub(crate) fn expect_index(&mut self, what: &str) -> Option<usize> {
        match *self.peek_kind() {
            TokenKind::IntLit(n) if n >= 0 => {
                self.advance();
                Some(n as usize)
            }
            ref other => {
                let message = format!("expected {what}, got '{other}'");
                self.error_at_current(ErrorCode::UNEXPECTED_TOKEN, message);
                None
            }
        }
    }

    // ── Error Reporting ───────────────────────────────────────────────────────

    /// Report an error at the current token position.
    pub(crate) fn error_at_current(&mut self, code: ErrorCode, message: impl Into<String>) {
        let span = self.current_span();
        self.error_at(code, message, span);
    }

    /// Report an error at a specific span, quoting the source line.
    pub(crate) fn error_at(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) {
        let source_line = self.source_file.line(span.line).unwrap_or("").to_string();
        self.errors.push_error(FoilError::new(
            &self.source_file.name,
            code,
            message,
            span,
            source_line,
        ));
    }

    /// Returns `true` once the error list is full; callers stop parsing.
    pub(crate) fn too_many_errors(&self) -> bool {
        self.errors.is_saturated()
    }

    // ── Synchronization ───────────────────────────────────────────────────────

    /// Skip past the next `;`, stopping early at `}` or a declaration keyword.
    pub(crate) fn synchronize(&mut self) {
        while !self.at_end() {
            match self.peek_kind() {
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                TokenKind::RBrace => return,
                kind if kind.starts_decl() => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Skip to the start of the next top-level declaration.
    pub(crate) fn synchronize_decl(&mut self) {
        while !self.at_end() && !self.peek_kind().starts_decl() {
            self.advance();
        }
    }

    // ── Public API ────────────────────────────────────────────────────────────

    /// Parse the whole token stream into a module.
    pub fn parse(mut self) -> ParseResult {
        let module = self.parse_module();
        tracing::debug!(
            file = %self.source_file.name,
            decls = module.as_ref().map_or(0, |m| m.decls.len()),
            errors = self.errors.total_errors,
            "parsed module"
        );
        ParseResult {
            module,
            errors: self.errors,
        }
    }
}
