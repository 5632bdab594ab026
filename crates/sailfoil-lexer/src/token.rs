//! Token types for the IR lexer.

use sailfoil_types::Span;
use std::fmt;

/// Reserved words of the IR. They never lex as [`TokenKind::Identifier`].
pub const ALL_KEYWORDS: &[&str] = &[
    // Declarations
    "enum", "union", "val", "fn", "register",
    // Control flow
    "jump", "goto", "end", "arbitrary", "unreachable", "return",
    // Variant tests
    "is", "as",
    // Literals
    "true", "false",
    // Exception state
    "have_exception", "current_exception", "throw_location",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // ── Literals ──────────────────────────────────────────────
    /// Decimal integer, optionally negative: `42`, `-1`
    IntLit(i64),
    /// `0b0101` or `0xff`; width is derived from the digit count.
    BitsLit { width: u32, value: u64 },
    /// `"text"`
    StringLit(String),
    Identifier(String),

    // ── Keywords ──────────────────────────────────────────────
    Enum,
    Union,
    Val,
    Fn,
    Register,
    Jump,
    Goto,
    End,
    Arbitrary,
    Unreachable,
    Return,
    Is,
    As,
    True,
    False,
    HaveException,
    CurrentException,
    ThrowLocation,

    // ── Punctuation ───────────────────────────────────────────
    LBrace,
    RBrace,
    LParen,
    RParen,
    Comma,
    Colon,
    Semicolon,
    Eq,
    Dot,
    Arrow,
    At,
    Percent,
    Backtick,

    Eof,
}

impl TokenKind {
    pub fn from_keyword(s: &str) -> Option<TokenKind> {
        let kind = match s {
            "enum" => TokenKind::Enum,
            "union" => TokenKind::Union,
            "val" => TokenKind::Val,
            "fn" => TokenKind::Fn,
            "register" => TokenKind::Register,
            "jump" => TokenKind::Jump,
            "goto" => TokenKind::Goto,
            "end" => TokenKind::End,
            "arbitrary" => TokenKind::Arbitrary,
            "unreachable" => TokenKind::Unreachable,
            "return" => TokenKind::Return,
            "is" => TokenKind::Is,
            "as" => TokenKind::As,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "have_exception" => TokenKind::HaveException,
            "current_exception" => TokenKind::CurrentException,
            "throw_location" => TokenKind::ThrowLocation,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Enum
                | TokenKind::Union
                | TokenKind::Val
                | TokenKind::Fn
                | TokenKind::Register
                | TokenKind::Jump
                | TokenKind::Goto
                | TokenKind::End
                | TokenKind::Arbitrary
                | TokenKind::Unreachable
                | TokenKind::Return
                | TokenKind::Is
                | TokenKind::As
                | TokenKind::True
                | TokenKind::False
                | TokenKind::HaveException
                | TokenKind::CurrentException
                | TokenKind::ThrowLocation
        )
    }

    /// Tokens that may start a top-level declaration.
    pub fn starts_decl(&self) -> bool {
        matches!(
            self,
            TokenKind::Enum | TokenKind::Union | TokenKind::Val | TokenKind::Fn | TokenKind::Register
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::IntLit(n) => return write!(f, "{n}"),
            TokenKind::BitsLit { width, value } => {
                return write!(f, "bits({width}, {value:#x})");
            }
            TokenKind::StringLit(s) => return write!(f, "\"{s}\""),
            TokenKind::Identifier(name) => return f.write_str(name),
            TokenKind::Enum => "enum",
            TokenKind::Union => "union",
            TokenKind::Val => "val",
            TokenKind::Fn => "fn",
            TokenKind::Register => "register",
            TokenKind::Jump => "jump",
            TokenKind::Goto => "goto",
            TokenKind::End => "end",
            TokenKind::Arbitrary => "arbitrary",
            TokenKind::Unreachable => "unreachable",
            TokenKind::Return => "return",
            TokenKind::Is => "is",
            TokenKind::As => "as",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::HaveException => "have_exception",
            TokenKind::CurrentException => "current_exception",
            TokenKind::ThrowLocation => "throw_location",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::Semicolon => ";",
            TokenKind::Eq => "=",
            TokenKind::Dot => ".",
            TokenKind::Arrow => "->",
            TokenKind::At => "@",
            TokenKind::Percent => "%",
            TokenKind::Backtick => "`",
            TokenKind::Eof => "end of file",
        };
        f.write_str(text)
    }
}
