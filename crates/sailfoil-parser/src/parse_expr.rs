//! Expression parsing.
//!
//! The IR has no infix operators. An expression is an atom followed by any
//! number of postfix forms: tuple field access, variant test and variant
//! projection.

use sailfoil_lexer::token::TokenKind;
use sailfoil_types::ast::*;
use sailfoil_types::ErrorCode;

use crate::parser::Parser;

/// Nesting limit for call arguments and parenthesized expressions.
const MAX_EXPR_DEPTH: u32 = 64;

impl<'src> Parser<'src> {
    /// ```ebnf
    /// Expr    = Atom { Postfix } ;
    /// Postfix = "." Field | "is" Identifier | "as" Identifier ;
    /// ```
    pub(crate) fn parse_expr(&mut self) -> Option<Expr> {
        self.parse_expr_at(0)
    }

    /// Parse an expression nested `depth` levels deep.
    fn parse_expr_at(&mut self, depth: u32) -> Option<Expr> {
        if depth > MAX_EXPR_DEPTH {
            self.error_at_current(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("expression nesting exceeds {MAX_EXPR_DEPTH} levels"),
            );
            return None;
        }
        let mut expr = self.parse_atom(depth)?;
        loop {
            let start = expr.span;
            let kind = match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let index = self.parse_field_index()?;
                    ExprKind::Field {
                        value: Box::new(expr),
                        index,
                    }
                }
                TokenKind::Is => {
                    self.advance();
                    let variant = self.expect_identifier()?;
                    ExprKind::Is {
                        value: Box::new(expr),
                        variant,
                    }
                }
                TokenKind::As => {
                    self.advance();
                    let variant = self.expect_identifier()?;
                    ExprKind::As {
                        value: Box::new(expr),
                        variant,
                    }
                }
                _ => return Some(expr),
            };
            expr = Expr::new(kind, start.to(self.previous_span()));
        }
    }

    /// ```ebnf
    /// Atom = Int | Bits | String | "true" | "false" | "(" ")" | "(" Expr ")"
    ///      | "@" Identifier Args | Identifier [ Args ]
    ///      | "have_exception" | "current_exception" | "throw_location" ;
    /// ```
    fn parse_atom(&mut self, depth: u32) -> Option<Expr> {
        let start = self.current_span();
        let kind = match self.peek_kind().clone() {
            TokenKind::IntLit(n) => {
                self.advance();
                ExprKind::Literal(Literal::Int(n))
            }
            TokenKind::BitsLit { width, value } => {
                self.advance();
                ExprKind::Literal(Literal::Bits { width, value })
            }
            TokenKind::StringLit(s) => {
                self.advance();
                ExprKind::Literal(Literal::String(s))
            }
            TokenKind::True => {
                self.advance();
                ExprKind::Literal(Literal::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                ExprKind::Literal(Literal::Bool(false))
            }
            TokenKind::HaveException => {
                self.advance();
                ExprKind::HaveException
            }
            TokenKind::CurrentException => {
                self.advance();
                ExprKind::CurrentException
            }
            TokenKind::ThrowLocation => {
                self.advance();
                ExprKind::ThrowLocation
            }
            TokenKind::LParen => {
                self.advance();
                if self.eat(&TokenKind::RParen) {
                    ExprKind::Literal(Literal::Unit)
                } else {
                    let inner = self.parse_expr_at(depth + 1)?;
                    self.expect(&TokenKind::RParen)?;
                    return Some(Expr::new(inner.kind, start.to(self.previous_span())));
                }
            }
            TokenKind::At => {
                self.advance();
                let op = self.expect_identifier()?;
                let args = self.parse_args(depth)?;
                ExprKind::Prim { op, args }
            }
            TokenKind::Identifier(_) => {
                let name = self.expect_identifier()?;
                if self.check(&TokenKind::LParen) {
                    let args = self.parse_args(depth)?;
                    ExprKind::Call { callee: name, args }
                } else {
                    ExprKind::Name(name)
                }
            }
            other => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected expression, got '{other}'"),
                );
                return None;
            }
        };
        Some(Expr::new(kind, start.to(self.previous_span())))
    }

    /// `"(" [ Expr { "," Expr } ] ")"`
    fn parse_args(&mut self, depth: u32) -> Option<Vec<Expr>> {
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        while !self.check(&TokenKind::RParen) && !self.at_end() {
            args.push(self.parse_expr_at(depth + 1)?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Some(args)
    }

    /// A tuple field after `.`: a plain index (`0`) or a generated
    /// accessor name (`ztup0`).
    pub(crate) fn parse_field_index(&mut self) -> Option<u32> {
        match self.peek_kind().clone() {
            TokenKind::IntLit(n) if (0..=u32::MAX as i64).contains(&n) => {
                self.advance();
                Some(n as u32)
            }
            TokenKind::Identifier(name) => {
                let index = name.strip_prefix("ztup").and_then(|d| d.parse::<u32>().ok());
                match index {
                    Some(index) => {
                        self.advance();
                        Some(index)
                    }
                    None => {
                        self.error_at_current(
                            ErrorCode::UNEXPECTED_TOKEN,
                            format!("'{name}' is not a tuple field"),
                        );
                        None
                    }
                }
            }
            other => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected tuple field, got '{other}'"),
                );
                None
            }
        }
    }
}
