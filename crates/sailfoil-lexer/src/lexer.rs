//! Single-pass lexer for the textual IR.
//!
//! - Newlines are plain whitespace; statements end with `;`
//! - Single-line comments (`//`) are stripped
//! - Integer literals are decimal (optionally negative); bitvector literals
//!   are `0b`/`0x` prefixed and take their width from the digit count
//! - Error recovery: up to [`sailfoil_types::MAX_ERRORS`] errors are kept

use sailfoil_types::{CompileErrors, ErrorCode, FoilError, SourceFile, Span};

use crate::token::{Token, TokenKind};

const MAX_BITS_WIDTH: u32 = 64;

/// Single-pass scanner over one source file.
///
/// Lexing never stops at the first error: bad characters are reported and
/// skipped until the error list is full.
pub struct Lexer<'src> {
    /// The source text as bytes.
    source: &'src [u8],
    /// Source file for error context.
    source_file: &'src SourceFile,
    /// Current byte offset.
    pos: usize,
    /// 1-based.
    line: u32,
    /// 1-based.
    col: u32,
    /// Collected errors.
    errors: CompileErrors,
}

/// Tokens plus the diagnostics collected while producing them.
pub struct LexResult {
    /// Always ends with [`TokenKind::Eof`].
    pub tokens: Vec<Token>,
    pub errors: CompileErrors,
}

impl<'src> Lexer<'src> {
    /// Create a lexer positioned at the start of `source_file`.
    pub fn new(source_file: &'src SourceFile) -> Self {
        Self {
            source: source_file.source.as_bytes(),
            source_file,
            pos: 0,
            line: 1,
            col: 1,
            errors: CompileErrors::empty(),
        }
    }

    /// Scan the whole file. The token list always ends with `Eof`.
    pub fn lex(mut self) -> LexResult {
        let mut tokens = Vec::new();
        loop {
            if self.errors.is_saturated() {
                tokens.push(Token::new(TokenKind::Eof, self.current_span()));
                break;
            }
            let token = self.scan_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        tracing::trace!(tokens = tokens.len(), file = %self.source_file.name, "lexed");
        LexResult {
            tokens,
            errors: self.errors,
        }
    }

    // ── Character helpers ─────────────────────────────────────────────

    /// The current byte, or `None` at end of input.
    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    /// The byte `offset` positions ahead of the cursor.
    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    /// Consume one byte, updating line and column.
    fn advance(&mut self) -> Option<u8> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    /// Zero-width span at the cursor.
    fn current_span(&self) -> Span {
        Span::point(self.line, self.col)
    }

    /// Span from `line:col` to the cursor.
    fn span_from(&self, line: u32, col: u32) -> Span {
        Span::new(line, col, self.line, self.col.saturating_sub(1).max(1))
    }

    /// Source text from byte offset `start` to the cursor.
    fn text_from(&self, start: usize) -> &'src str {
        std::str::from_utf8(&self.source[start..self.pos]).unwrap_or("")
    }

    /// Record an error, quoting the offending source line.
    fn emit_error(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) {
        let source_line = self.source_file.line(span.line).unwrap_or("").to_string();
        self.errors.push_error(FoilError::new(
            &self.source_file.name,
            code,
            message,
            span,
            source_line,
        ));
    }

    /// Skip whitespace and `//` line comments.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n') => {
                    self.advance();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while let Some(ch) = self.peek() {
                        if ch == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    // ── Scanning ──────────────────────────────────────────────────────

    /// Scan the next token. Unknown characters are reported and skipped.
    fn scan_token(&mut self) -> Token {
        self.skip_trivia();
        let (line, col, start) = (self.line, self.col, self.pos);
        let Some(ch) = self.advance() else {
            return Token::new(TokenKind::Eof, self.current_span());
        };

        let kind = match ch {
            b'"' => return self.scan_string(line, col),
            b'0'..=b'9' => return self.scan_number(start, line, col, false),
            b'-' if matches!(self.peek(), Some(b'0'..=b'9')) => {
                return self.scan_number(start, line, col, true)
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                while let Some(ch) = self.peek() {
                    if ch.is_ascii_alphanumeric() || ch == b'_' {
                        self.advance();
                    } else {
                        break;
                    }
                }
                let text = self.text_from(start);
                TokenKind::from_keyword(text)
                    .unwrap_or_else(|| TokenKind::Identifier(text.to_string()))
            }
            b'-' if self.peek() == Some(b'>') => {
                self.advance();
                TokenKind::Arrow
            }
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b',' => TokenKind::Comma,
            b':' => TokenKind::Colon,
            b';' => TokenKind::Semicolon,
            b'=' => TokenKind::Eq,
            b'.' => TokenKind::Dot,
            b'@' => TokenKind::At,
            b'%' => TokenKind::Percent,
            b'`' => TokenKind::Backtick,
            other => {
                let span = self.span_from(line, col);
                self.emit_error(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("unexpected character '{}'", other as char),
                    span,
                );
                if self.errors.is_saturated() {
                    return Token::new(TokenKind::Eof, self.current_span());
                }
                return self.scan_token();
            }
        };
        Token::new(kind, self.span_from(line, col))
    }

    /// Scan a string literal after its opening quote, decoding escapes.
    fn scan_string(&mut self, line: u32, col: u32) -> Token {
        let mut buf = String::new();
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    let span = self.span_from(line, col);
                    self.emit_error(
                        ErrorCode::UNTERMINATED_STRING,
                        "unterminated string literal",
                        span,
                    );
                    return Token::new(TokenKind::StringLit(buf), span);
                }
                Some(b'"') => {
                    self.advance();
                    return Token::new(TokenKind::StringLit(buf), self.span_from(line, col));
                }
                Some(b'\\') => {
                    self.advance();
                    match self.advance() {
                        Some(b'n') => buf.push('\n'),
                        Some(b't') => buf.push('\t'),
                        Some(b'"') => buf.push('"'),
                        Some(b'\\') => buf.push('\\'),
                        Some(other) => {
                            let span = self.span_from(line, col);
                            self.emit_error(
                                ErrorCode::INVALID_LITERAL,
                                format!("invalid escape sequence '\\{}'", other as char),
                                span,
                            );
                            buf.push(other as char);
                        }
                        None => {}
                    }
                }
                Some(_) => {
                    // Re-decode multi-byte UTF-8 sequences as a unit.
                    let rest = std::str::from_utf8(&self.source[self.pos..]).unwrap_or("");
                    match rest.chars().next() {
                        Some(c) => {
                            for _ in 0..c.len_utf8() {
                                self.advance();
                            }
                            buf.push(c);
                        }
                        None => {
                            self.advance();
                        }
                    }
                }
            }
        }
    }

    /// Scan a decimal integer or a `0x`/`0b` bitvector literal. Bitvector
    /// width is four bits per hex digit and one per binary digit.
    fn scan_number(&mut self, start: usize, line: u32, col: u32, negative: bool) -> Token {
        let first = self.source[start];
        let radix = match (first, self.peek()) {
            (b'0', Some(b'b')) if !negative => Some(2),
            (b'0', Some(b'x')) if !negative => Some(16),
            _ => None,
        };

        if let Some(radix) = radix {
            self.advance();
            let digits_start = self.pos;
            while let Some(ch) = self.peek() {
                if (ch as char).is_digit(radix) {
                    self.advance();
                } else {
                    break;
                }
            }
            let digits = self.text_from(digits_start);
            let span = self.span_from(line, col);
            let bits_per_digit = if radix == 2 { 1 } else { 4 };
            let width = digits.len() as u32 * bits_per_digit;
            if digits.is_empty() || width > MAX_BITS_WIDTH {
                self.emit_error(
                    ErrorCode::INVALID_LITERAL,
                    format!("bitvector literal must have 1 to {MAX_BITS_WIDTH} bits"),
                    span,
                );
                return Token::new(TokenKind::BitsLit { width: 0, value: 0 }, span);
            }
            let value = u64::from_str_radix(digits, radix).unwrap_or(0);
            return Token::new(TokenKind::BitsLit { width, value }, span);
        }

        while let Some(b'0'..=b'9') = self.peek() {
            self.advance();
        }
        let span = self.span_from(line, col);
        let text = self.text_from(start);
        match text.parse::<i64>() {
            Ok(n) => Token::new(TokenKind::IntLit(n), span),
            Err(_) => {
                self.emit_error(
                    ErrorCode::INVALID_LITERAL,
                    format!("integer literal '{text}' does not fit in 64 bits"),
                    span,
                );
                Token::new(TokenKind::IntLit(0), span)
            }
        }
    }
}
