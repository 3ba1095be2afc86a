//! Expression parsing implementation
//!
//! This module handles parsing of Kaleidoscope expressions using precedence
//! climbing for binary operators and recursive descent for everything else.
//!
//! # Grammar
//!
//! ```text
//! expression ::= unary binary_rhs
//! binary_rhs ::= (binop unary)*
//! unary      ::= unop unary | primary
//! primary    ::= identifier
//!              | identifier "(" (expression ("," expression)*)? ")"
//!              | number
//!              | "(" expression ")"
//!              | "if" expression "then" expression "else" expression
//!              | "for" identifier "=" expression "," expression
//!                    ("," expression)? "in" expression
//!              | "var" identifier ("=" expression)?
//!                    ("," identifier ("=" expression)?)* "in" expression
//! ```
//!
//! # Precedence
//!
//! Binary precedence is looked up in the shared operator table at the moment
//! the operator is reached, so operators declared earlier in the same run
//! take effect immediately. Equal precedence binds left.
//!
//! All parsing methods are implemented as `pub(crate)` methods on the [`Parser`] struct.

use crate::parser::ast::*;
use crate::parser::lexer::{Token, TokenKind};
use crate::parser::parse::{ParseError, Parser};
use crate::pipeline::config::MIN_BINARY_PRECEDENCE;

impl<I: Iterator<Item = Token>> Parser<I> {
    /// Parse expression (top-level entry point)
    pub(crate) fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_unary()?;
        self.parse_binary_rhs(MIN_BINARY_PRECEDENCE, lhs)
    }

    /// Precedence of the current token as a binary operator, if it is one.
    ///
    /// Any operator token counts, including a built-in that was redeclared
    /// `unary`: in binary position only the precedence matters.
    pub(crate) fn current_binary_precedence(&self) -> Option<u32> {
        let op = self.current.operator_char()?;
        self.table.precedence_of(op)
    }

    fn parse_binary_rhs(
        &mut self,
        min_precedence: u32,
        mut lhs: Expr,
    ) -> Result<Expr, ParseError> {
        loop {
            let precedence = match self.current_binary_precedence() {
                Some(p) if p >= min_precedence => p,
                _ => return Ok(lhs),
            };

            let pos = self.current.pos;
            let op = match self.current.operator_char() {
                Some(c) => c,
                None => return Ok(lhs),
            };
            self.advance();

            let mut rhs = self.parse_unary()?;

            // Let a tighter operator after rhs take rhs as its lhs
            if matches!(self.current_binary_precedence(), Some(next) if next > precedence) {
                rhs = self.parse_binary_rhs(precedence + 1, rhs)?;
            }

            lhs = Expr::Binary(BinaryExpr {
                op,
                left: Box::new(lhs),
                right: Box::new(rhs),
                pos,
            });
        }
    }

    /// Parse unary: user unary operators, right-recursive (`!!x`)
    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.check(TokenKind::UserUnaryOp) {
            let pos = self.current.pos;
            if let Some(op) = self.current.operator_char() {
                self.advance();
                let operand = self.parse_unary()?;
                return Ok(Expr::Unary(UnaryExpr {
                    op,
                    operand: Box::new(operand),
                    pos,
                }));
            }
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.current.kind {
            TokenKind::Identifier => self.parse_identifier_expr(),
            TokenKind::Number => self.parse_number(),
            TokenKind::LeftParen => self.parse_paren_expr(),
            TokenKind::If => self.parse_if_expr(),
            TokenKind::For => self.parse_for_expr(),
            TokenKind::Var => self.parse_var_expr(),
            _ => Err(self.error("unknown token encountered when expecting expression")),
        }
    }

    /// Variable reference, or a call when followed by `(`
    fn parse_identifier_expr(&mut self) -> Result<Expr, ParseError> {
        let pos = self.current.pos;
        let name = self.current.text.clone();
        self.advance();

        if !self.match_token(TokenKind::LeftParen) {
            return Ok(Expr::Variable(VariableExpr { name, pos }));
        }

        let mut args = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                args.push(self.parse_expression()?);
                if self.check(TokenKind::RightParen) {
                    break;
                }
                self.expect(TokenKind::Comma, "expected ')' or ',' in argument list")?;
            }
        }
        self.advance(); // consume ')'

        Ok(Expr::Call(CallExpr {
            callee: name,
            args,
            pos,
        }))
    }

    fn parse_number(&mut self) -> Result<Expr, ParseError> {
        let pos = self.current.pos;
        let value = parse_number_literal(&self.current.text)
            .ok_or_else(|| self.error("invalid number literal"))?;
        self.advance();
        Ok(Expr::Number(NumberExpr { value, pos }))
    }

    fn parse_paren_expr(&mut self) -> Result<Expr, ParseError> {
        self.advance(); // consume '('
        let expr = self.parse_expression()?;
        self.expect(TokenKind::RightParen, "expected ')'")?;
        Ok(expr)
    }

    fn parse_if_expr(&mut self) -> Result<Expr, ParseError> {
        let pos = self.current.pos;
        self.advance(); // consume 'if'

        let condition = self.parse_expression()?;
        self.expect(TokenKind::Then, "expected 'then' after if condition")?;
        let then_branch = self.parse_expression()?;
        self.expect(TokenKind::Else, "expected 'else' after then branch")?;
        let else_branch = self.parse_expression()?;

        Ok(Expr::If(IfExpr {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
            pos,
        }))
    }

    fn parse_for_expr(&mut self) -> Result<Expr, ParseError> {
        let pos = self.current.pos;
        self.advance(); // consume 'for'

        let counter = self.expect_identifier("expected identifier after 'for'")?;
        if !self.match_operator('=') {
            return Err(self.error("expected '=' after for counter"));
        }
        let start = self.parse_expression()?;
        self.expect(TokenKind::Comma, "expected ',' after for start value")?;
        let end = self.parse_expression()?;

        let step = if self.match_token(TokenKind::Comma) {
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };

        self.expect(TokenKind::In, "expected 'in' after for")?;
        let body = self.parse_expression()?;

        Ok(Expr::For(ForExpr {
            counter,
            start: Box::new(start),
            end: Box::new(end),
            step,
            body: Box::new(body),
            pos,
        }))
    }

    fn parse_var_expr(&mut self) -> Result<Expr, ParseError> {
        let pos = self.current.pos;
        self.advance(); // consume 'var'

        let mut bindings = Vec::new();
        loop {
            let name = self.expect_identifier("expected identifier after 'var'")?;
            let init = if self.match_operator('=') {
                Some(self.parse_expression()?)
            } else {
                None
            };
            bindings.push(VarBinding { name, init });

            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }

        self.expect(TokenKind::In, "expected 'in' after var")?;
        let body = self.parse_expression()?;

        Ok(Expr::Var(VarExpr {
            bindings,
            body: Box::new(body),
            pos,
        }))
    }

    /// Consume the operator spelled `op`, whatever kind it was lexed as.
    fn match_operator(&mut self, op: char) -> bool {
        if self.current.operator_char() == Some(op) {
            self.advance();
            true
        } else {
            false
        }
    }
}

/// Decimal float, or a `0x` hexadecimal integer.
fn parse_number_literal(text: &str) -> Option<f64> {
    if let Some(hex) = text.strip_prefix("0x") {
        return u64::from_str_radix(hex, 16).ok().map(|v| v as f64);
    }
    // Keep `f64::from_str` from accepting spellings the lexer never produces
    // as numbers, like "inf"; only digits, '.', and exponent 'e' get through.
    if !text.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E')) {
        return None;
    }
    text.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::{Expr, Pos, Root};
    use crate::parser::parse::{parse_source, DiagnosticKind};

    /// Parse one top-level expression and render it as an s-expression.
    fn expr(source: &str) -> String {
        let (roots, diagnostics) = parse_source("test", source);
        assert!(diagnostics.is_empty(), "unexpected diagnostics: {:?}", diagnostics);
        assert_eq!(roots.len(), 1);
        roots[0].to_string()
    }

    fn first_error(source: &str) -> String {
        let (_, diagnostics) = parse_source("test", source);
        assert!(!diagnostics.is_empty(), "expected a diagnostic for {:?}", source);
        diagnostics[0].message.clone()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(expr("2+3*4"), "(+ 2 (* 3 4))");
        assert_eq!(expr("2*3+4"), "(+ (* 2 3) 4)");
        assert_eq!(expr("a < b + 1"), "(< a (+ b 1))");
        assert_eq!(expr("x = y = 1"), "(= (= x y) 1)");
    }

    #[test]
    fn test_left_associative() {
        assert_eq!(expr("10-3-2"), "(- (- 10 3) 2)");
        assert_eq!(expr("8/4/2"), "(/ (/ 8 4) 2)");
    }

    #[test]
    fn test_right_grouping_for_tighter_tail() {
        assert_eq!(expr("1+2*3*4-5"), "(- (+ 1 (* (* 2 3) 4)) 5)");
    }

    #[test]
    fn test_parenthesized() {
        assert_eq!(expr("(2+3)*4"), "(* (+ 2 3) 4)");
    }

    #[test]
    fn test_call() {
        assert_eq!(expr("foo()"), "(call foo)");
        assert_eq!(expr("foo(1, x+2)"), "(call foo 1 (+ x 2))");
    }

    #[test]
    fn test_if() {
        assert_eq!(expr("if x < 3 then 1 else 2"), "(if (< x 3) 1 2)");
    }

    #[test]
    fn test_for() {
        assert_eq!(expr("for i = 1, i < n in f(i)"), "(for i 1 (< i n) (call f i))");
        assert_eq!(
            expr("for i = 0, i < 10, 2 in i"),
            "(for i 0 (< i 10) 2 i)"
        );
    }

    #[test]
    fn test_var() {
        assert_eq!(expr("var a = 1, b in a + b"), "(var ((a 1) b) (+ a b))");
    }

    #[test]
    fn test_numbers() {
        assert_eq!(expr("1.5"), "1.5");
        assert_eq!(expr(".5"), "0.5");
        assert_eq!(expr("0x1F"), "31");
        assert_eq!(first_error("1.2.3"), "invalid number literal");
        assert_eq!(first_error("0xZ"), "invalid number literal");
    }

    #[test]
    fn test_positions() {
        let (roots, _) = parse_source("test", "  a + b");
        match &roots[0] {
            Root::Function(func) => {
                assert_eq!(func.pos, Pos(2));
                match &func.body {
                    Expr::Binary(bin) => {
                        assert_eq!(bin.pos, Pos(4));
                        assert_eq!(bin.left.pos(), Pos(2));
                        assert_eq!(bin.right.pos(), Pos(6));
                    }
                    other => panic!("Expected binary expression, got {:?}", other),
                }
            }
            _ => panic!("Expected anonymous function"),
        }
    }

    #[test]
    fn test_user_binary_operator() {
        let (roots, diagnostics) =
            parse_source("ops", "def binary ^ 60 (a b) a*a; 1 + 3^3");
        assert!(diagnostics.is_empty());
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].prototype().name, "binary^");
        assert_eq!(roots[0].prototype().precedence, 60);
        assert_eq!(roots[1].to_string(), "(+ 1 (^ 3 3))");
    }

    #[test]
    fn test_user_binary_default_precedence() {
        let (roots, _) = parse_source("ops", "def binary | (a b) a; 1 | 2 * 3; 1 | 2 + 3");
        assert_eq!(roots[0].prototype().precedence, 30);
        assert_eq!(roots[1].to_string(), "(| 1 (* 2 3))");
        assert_eq!(roots[2].to_string(), "(+ (| 1 2) 3)");
    }

    #[test]
    fn test_zero_precedence_never_binds() {
        let (roots, diagnostics) =
            parse_source("ops", "def binary ~ 0 (a b) a; 1 ~ 2");
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[1].to_string(), "1");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].message,
            "unknown token encountered when expecting expression"
        );
    }

    #[test]
    fn test_user_unary_operator() {
        let (roots, diagnostics) =
            parse_source("ops", "def unary ! (v) if v then 0 else 1; !!5 + 1");
        assert!(diagnostics.is_empty());
        assert_eq!(roots[1].to_string(), "(+ (! (! 5)) 1)");
    }

    #[test]
    fn test_builtin_redeclared_unary() {
        let (roots, diagnostics) =
            parse_source("neg", "def unary-(v) 0-v; -2; 4 - -x");
        assert!(diagnostics.is_empty());
        assert_eq!(roots[0].prototype().name, "unary-");
        match &roots[0] {
            Root::Function(func) => assert_eq!(func.body.to_string(), "(- 0 v)"),
            _ => panic!("Expected function definition"),
        }
        assert_eq!(roots[1].to_string(), "(- 2)");
        assert_eq!(roots[2].to_string(), "(- 4 (- x))");
    }

    #[test]
    fn test_expression_errors() {
        assert_eq!(first_error("(1 + 2"), "expected ')'");
        assert_eq!(first_error("f(1 2)"), "expected ')' or ',' in argument list");
        assert_eq!(first_error("if 1 then 2"), "expected 'else' after then branch");
        assert_eq!(first_error("for 1"), "expected identifier after 'for'");
        assert_eq!(first_error("for i 1"), "expected '=' after for counter");
        assert_eq!(first_error("for i = 1 in 2"), "expected ',' after for start value");
        assert_eq!(first_error("for i = 1, 2 3"), "expected 'in' after for");
        assert_eq!(first_error("var in 1"), "expected identifier after 'var'");
        assert_eq!(first_error("var a = 1 a"), "expected 'in' after var");
        assert_eq!(first_error("then"), "unknown token encountered when expecting expression");
    }

    #[test]
    fn test_error_reports_offending_token() {
        let (_, diagnostics) = parse_source("test", "if 1 else 2; 7");
        assert_eq!(diagnostics[0].kind, DiagnosticKind::Syntax);
        assert_eq!(diagnostics[0].found.as_deref(), Some("'else'"));
    }
}
