//! Type parsing.

use sailfoil_lexer::token::TokenKind;
use sailfoil_types::ast::*;
use sailfoil_types::ErrorCode;

use crate::parser::Parser;

impl<'src> Parser<'src> {
    /// ```ebnf
    /// Type     = "%" BaseType
    ///          | "(" [ Type { "," Type } ] ")" [ "->" Type ] ;
    /// BaseType = "unit" | "bool" | "i" | "i64" | "bit" | "string"
    ///          | "bv" | "bv" Digits
    ///          | "enum" Identifier | "union" Identifier ;
    /// ```
    ///
    /// A parenthesized single type without an arrow is that type itself.
    pub(crate) fn parse_type(&mut self) -> Option<Type> {
        let start = self.current_span();
        if self.eat(&TokenKind::LParen) {
            let mut items = Vec::new();
            while !self.check(&TokenKind::RParen) && !self.at_end() {
                items.push(self.parse_type()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::RParen)?;
            if self.eat(&TokenKind::Arrow) {
                let ret = self.parse_type()?;
                return Some(Type::new(
                    TypeKind::Function {
                        params: items,
                        ret: Box::new(ret),
                    },
                    start.to(self.previous_span()),
                ));
            }
            let span = start.to(self.previous_span());
            return match items.len() {
                0 => Some(Type::new(TypeKind::Unit, span)),
                1 => items.pop(),
                _ => Some(Type::new(TypeKind::Tuple(items), span)),
            };
        }

        self.expect(&TokenKind::Percent)?;
        let kind = match self.peek_kind().clone() {
            TokenKind::Enum => {
                self.advance();
                TypeKind::Enum(TypeRef::new(self.expect_identifier()?))
            }
            TokenKind::Union => {
                self.advance();
                TypeKind::Union(TypeRef::new(self.expect_identifier()?))
            }
            TokenKind::Identifier(name) => {
                let span = self.advance().span;
                match base_type(&name) {
                    Some(kind) => kind,
                    None => {
                        self.error_at(
                            ErrorCode::UNEXPECTED_TOKEN,
                            format!("unknown type '%{name}'"),
                            span,
                        );
                        return None;
                    }
                }
            }
            other => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected type name after '%', got '{other}'"),
                );
                return None;
            }
        };
        Some(Type::new(kind, start.to(self.previous_span())))
    }
}

/// Map a `%name` base type. Bitvector widths run from 1 to 64.
fn base_type(name: &str) -> Option<TypeKind> {
    let kind = match name {
        "unit" => TypeKind::Unit,
        "bool" => TypeKind::Bool,
        "i" => TypeKind::Int,
        "i64" => TypeKind::Int64,
        "bit" => TypeKind::Bit,
        "string" => TypeKind::String,
        "bv" => TypeKind::Bits(None),
        _ => {
            let width: u32 = name.strip_prefix("bv")?.parse().ok()?;
            if width == 0 || width > 64 {
                return None;
            }
            TypeKind::Bits(Some(width))
        }
    };
    Some(kind)
}
