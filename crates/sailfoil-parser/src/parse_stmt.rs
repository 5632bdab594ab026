//! Statement parsing. Each statement ends with `;`.

use sailfoil_lexer::token::TokenKind;
use sailfoil_types::ast::*;
use sailfoil_types::ErrorCode;

use crate::parser::Parser;

impl<'src> Parser<'src> {
    /// ```ebnf
    /// Stmt = Identifier ":" Type [ "=" Expr ] ";"
    ///      | Place "=" Expr ";"
    ///      | "jump" Expr "goto" Int [ "`" String ] ";"
    ///      | "goto" Int ";"
    ///      | "end" ";" | "arbitrary" ";" | "unreachable" ";" ;
    /// ```
    pub(crate) fn parse_stmt(&mut self) -> Option<Stmt> {
        let start = self.current_span();
        let kind = match self.peek_kind() {
            TokenKind::Jump => {
                self.advance();
                let cond = self.parse_expr()?;
                self.expect(&TokenKind::Goto)?;
                let target = self.expect_index("jump target")?;
                let location = if self.eat(&TokenKind::Backtick) {
                    Some(self.expect_string_literal()?)
                } else {
                    None
                };
                StmtKind::Jump {
                    cond,
                    target,
                    location,
                }
            }
            TokenKind::Goto => {
                self.advance();
                StmtKind::Goto(self.expect_index("goto target")?)
            }
            TokenKind::End => {
                self.advance();
                StmtKind::End
            }
            TokenKind::Arbitrary => {
                self.advance();
                StmtKind::Arbitrary
            }
            TokenKind::Unreachable => {
                self.advance();
                StmtKind::Unreachable
            }
            TokenKind::Identifier(_) if self.look_ahead(1) == &TokenKind::Colon => {
                let name = self.expect_identifier()?;
                self.advance();
                let ty = self.parse_type()?;
                let init = if self.eat(&TokenKind::Eq) {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                StmtKind::Declare { name, ty, init }
            }
            _ => {
                let target = self.parse_place()?;
                self.expect(&TokenKind::Eq)?;
                let value = self.parse_expr()?;
                StmtKind::Assign { target, value }
            }
        };
        self.expect(&TokenKind::Semicolon)?;
        Some(Stmt {
            kind,
            span: start.to(self.previous_span()),
        })
    }

    /// ```ebnf
    /// Place = "return" | "current_exception" | "have_exception" | "throw_location"
    ///       | Identifier { "." Field } ;
    /// ```
    fn parse_place(&mut self) -> Option<Place> {
        let place = match self.peek_kind() {
            TokenKind::Return => Place::Return,
            TokenKind::CurrentException => Place::CurrentException,
            TokenKind::HaveException => Place::HaveException,
            TokenKind::ThrowLocation => Place::ThrowLocation,
            TokenKind::Identifier(_) => {
                let name = self.expect_identifier()?;
                let mut path = Vec::new();
                while self.eat(&TokenKind::Dot) {
                    path.push(self.parse_field_index()?);
                }
                return Some(Place::Named { name, path });
            }
            other => {
                let message = format!("expected statement, got '{other}'");
                self.error_at_current(ErrorCode::UNEXPECTED_TOKEN, message);
                return None;
            }
        };
        self.advance();
        Some(place)
    }
}
