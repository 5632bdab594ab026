//! Top-level declaration parsing.

use sailfoil_lexer::token::TokenKind;
use sailfoil_types::ast::*;
use sailfoil_types::ErrorCode;

use crate::parser::Parser;

impl<'src> Parser<'src> {
    /// ```ebnf
    /// Module = { Decl } ;
    /// Decl   = EnumDecl | UnionDecl | ValDecl | FnDecl | RegisterDecl ;
    /// ```
    pub(crate) fn parse_module(&mut self) -> Option<Module> {
        let start = self.current_span();
        let mut decls = Vec::new();
        while !self.at_end() && !self.too_many_errors() {
            let decl = match self.peek_kind() {
                TokenKind::Enum => self.parse_enum(),
                TokenKind::Union => self.parse_union(),
                TokenKind::Val => self.parse_val(),
                TokenKind::Fn => self.parse_function(),
                TokenKind::Register => self.parse_register(),
                other => {
                    let message = format!(
                        "expected 'enum', 'union', 'val', 'fn' or 'register', got '{other}'"
                    );
                    self.error_at_current(ErrorCode::UNEXPECTED_TOKEN, message);
                    self.advance();
                    self.synchronize_decl();
                    continue;
                }
            };
            match decl {
                Some(decl) => decls.push(decl),
                None => self.synchronize_decl(),
            }
        }
        let span = start.to(self.previous_span());
        Some(Module { decls, span })
    }

    /// `enum name { A, B, .. }`
    fn parse_enum(&mut self) -> Option<Decl> {
        let start = self.advance().span;
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::LBrace)?;
        let mut variants = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            variants.push(self.expect_identifier()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect_closing_brace(&name)?;
        if variants.is_empty() {
            self.error_at(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("enum '{}' has no variants", name.name),
                name.span,
            );
        }
        Some(Decl::Enum(EnumDecl {
            name,
            variants,
            span: start.to(self.previous_span()),
        }))
    }

    /// `union name { A: T, B: T, .. }`
    fn parse_union(&mut self) -> Option<Decl> {
        let start = self.advance().span;
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::LBrace)?;
        let mut variants = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            let variant = self.expect_identifier()?;
            self.expect(&TokenKind::Colon)?;
            let payload = self.parse_type()?;
            variants.push(UnionVariant {
                name: variant,
                payload,
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect_closing_brace(&name)?;
        if variants.is_empty() {
            self.error_at(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("union '{}' has no variants", name.name),
                name.span,
            );
        }
        Some(Decl::Union(UnionDecl {
            name,
            variants,
            span: start.to(self.previous_span()),
        }))
    }

    /// `val name = "symbol" : T` or `val name : T`
    fn parse_val(&mut self) -> Option<Decl> {
        let start = self.advance().span;
        let name = self.expect_identifier()?;
        let definition = if self.eat(&TokenKind::Eq) {
            Some(self.expect_string_literal()?)
        } else {
            None
        };
        self.expect(&TokenKind::Colon)?;
        let ty = self.parse_type()?;
        Some(Decl::GlobalVal(GlobalValDecl {
            name,
            definition,
            ty,
            span: start.to(self.previous_span()),
        }))
    }

    /// `register name : T`
    fn parse_register(&mut self) -> Option<Decl> {
        let start = self.advance().span;
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::Colon)?;
        let ty = self.parse_type()?;
        Some(Decl::Register(RegisterDecl {
            name,
            ty,
            span: start.to(self.previous_span()),
        }))
    }

    /// `fn name(a, b) { stmt; .. }`
    fn parse_function(&mut self) -> Option<Decl> {
        let start = self.advance().span;
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        while !self.check(&TokenKind::RParen) && !self.at_end() {
            params.push(self.expect_identifier()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        self.expect(&TokenKind::LBrace)?;

        let mut body = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_end() && !self.too_many_errors() {
            match self.parse_stmt() {
                Some(stmt) => body.push(stmt),
                None => self.synchronize(),
            }
            if self.peek_kind().starts_decl() {
                break;
            }
        }
        self.expect_closing_brace(&name)?;
        Some(Decl::Function(FunctionDecl {
            name,
            params,
            body,
            span: start.to(self.previous_span()),
        }))
    }

    /// Expect the `}` that closes `owner`'s body.
    fn expect_closing_brace(&mut self, owner: &Ident) -> Option<()> {
        if self.eat(&TokenKind::RBrace) {
            return Some(());
        }
        let message = format!(
            "expected '}}' to close '{}', got '{}'",
            owner.name,
            self.peek_kind()
        );
        self.error_at_current(ErrorCode::UNCLOSED_BRACE, message);
        None
    }
}
