//! Declaration parsing implementation
//!
//! This module handles the two statement forms that are not bare expressions:
//!
//! - Function definitions: `def name(args) body`
//! - External declarations: `extern name(args)`
//!
//! and the prototypes they share, including operator prototypes that extend
//! the operator table for the rest of the run.
//!
//! # Grammar
//!
//! ```text
//! definition ::= "def" prototype expression
//! extern     ::= "extern" prototype
//! prototype  ::= identifier "(" arg_list ")"
//!              | "unary" op "(" arg_list ")"
//!              | "binary" op number? "(" arg_list ")"
//! arg_list   ::= (identifier ","?)*
//! ```
//!
//! All parsing methods are implemented as `pub(crate)` methods on the [`Parser`] struct.

use crate::parser::ast::*;
use crate::parser::lexer::{Token, TokenKind};
use crate::parser::parse::{ParseError, Parser};
use crate::pipeline::config::DEFAULT_BINARY_PRECEDENCE;

/// What a prototype declares, with the operand count operators require
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PrototypeKind {
    Identifier,
    Unary,
    Binary,
}

impl PrototypeKind {
    fn operands(self) -> Option<usize> {
        match self {
            PrototypeKind::Identifier => None,
            PrototypeKind::Unary => Some(1),
            PrototypeKind::Binary => Some(2),
        }
    }
}

impl<I: Iterator<Item = Token>> Parser<I> {
    /// Parse function definition: def prototype expression
    pub(crate) fn parse_definition(&mut self) -> Result<Function, ParseError> {
        let pos = self.current.pos;
        self.advance(); // consume 'def'

        let proto = self.parse_prototype()?;
        let body = self.parse_expression()?;

        Ok(Function { proto, body, pos })
    }

    /// Parse external declaration: extern prototype
    pub(crate) fn parse_extern(&mut self) -> Result<Prototype, ParseError> {
        self.advance(); // consume 'extern'
        self.parse_prototype()
    }

    pub(crate) fn parse_prototype(&mut self) -> Result<Prototype, ParseError> {
        let pos = self.current.pos;

        let (kind, name) = match self.current.kind {
            TokenKind::Identifier => {
                let name = self.current.text.clone();
                self.advance();
                (PrototypeKind::Identifier, name)
            }
            TokenKind::Unary => {
                self.advance();
                let op = self.expect_operator(TokenKind::UserUnaryOp)?;
                (PrototypeKind::Unary, Prototype::unary_name(op))
            }
            TokenKind::Binary => {
                self.advance();
                let op = self.expect_operator(TokenKind::UserBinaryOp)?;
                (PrototypeKind::Binary, Prototype::binary_name(op))
            }
            _ => return Err(self.error("expected function name in prototype")),
        };

        let mut precedence = 0;
        if kind == PrototypeKind::Binary {
            precedence = DEFAULT_BINARY_PRECEDENCE;
            if self.check(TokenKind::Number) {
                precedence = self
                    .current
                    .text
                    .parse::<u32>()
                    .map_err(|_| self.error("invalid precedence"))?;
                self.advance();
            }
        }

        self.expect(TokenKind::LeftParen, "expected '(' in prototype")?;

        let mut args = Vec::new();
        loop {
            if self.check(TokenKind::Identifier) {
                args.push(self.current.text.clone());
                self.advance();
            } else if !self.match_token(TokenKind::Comma) {
                break;
            }
        }

        self.expect(TokenKind::RightParen, "expected ')' in prototype")?;

        if let Some(operands) = kind.operands() {
            if args.len() != operands {
                return Err(self.error_at(pos, "invalid number of operands for operator"));
            }
        }

        let proto = Prototype {
            name,
            args,
            is_operator: kind != PrototypeKind::Identifier,
            precedence,
            pos,
        };
        if proto.is_binary_op() {
            if let Some(op) = proto.operator_char() {
                self.table.set_precedence(op, proto.precedence);
            }
        }

        Ok(proto)
    }

    /// The operator character after `unary` / `binary`.
    fn expect_operator(&mut self, kind: TokenKind) -> Result<char, ParseError> {
        let token = self.expect(kind, "expected function name in prototype")?;
        token
            .operator_char()
            .ok_or_else(|| self.error_at(token.pos, "expected function name in prototype"))
    }
}
