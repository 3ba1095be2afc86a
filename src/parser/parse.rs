//! Main parser coordinator
//!
//! This module provides the [`Parser`] struct and core parsing infrastructure,
//! including error types, helper methods, and the top-level statement loop.
//!
//! # Parser Architecture
//!
//! The Parser uses a recursive descent approach with the following organization:
//! - This module: Parser struct, helper methods, statement loop and recovery
//! - `declarations`: `def`, `extern` and prototypes
//! - `expressions`: Expressions with precedence climbing
//!
//! # Streaming
//!
//! The parser pulls tokens from any `Iterator<Item = Token>` (normally a
//! [`TokenStream`](crate::parser::lexer::TokenStream) fed by the lexer thread)
//! and pushes every completed statement into a [`RootSink`] immediately, so a
//! consumer sees the first root long before the input is exhausted.
//!
//! # Recovery
//!
//! A statement that fails to parse is reported once through the diagnostic
//! handler and dropped; tokens are skipped up to the next statement boundary
//! (`;`, `def`, `extern`, a new input unit, or the end of the stream) and
//! parsing carries on from there.

use std::sync::mpsc::{self, SyncSender};

use thiserror::Error;
use tracing::debug;

use crate::parser::ast::{Function, Pos, Prototype, Root};
use crate::parser::lexer::{Lexer, Token, TokenKind};
use crate::parser::operators::OperatorTable;
use crate::pipeline::input::InputUnit;

/// Syntax error raised inside the recursive descent
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub pos: Pos,
    /// The token the parser was looking at
    pub found: Token,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Reported by the lexer; ends the run
    Lexical,
    /// The enclosing statement was dropped
    Syntax,
}

/// A problem in the program text, located by unit name and byte offset
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{unit}:{pos}: {message}{}", found_suffix(.found))]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub unit: String,
    pub pos: Pos,
    pub message: String,
    /// Description of the offending token, if any
    pub found: Option<String>,
}

fn found_suffix(found: &Option<String>) -> String {
    match found {
        Some(token) => format!(" (found {})", token),
        None => String::new(),
    }
}

/// Destination for parsed top-level statements.
pub trait RootSink {
    /// Accept a root; `false` means nobody is listening any more.
    fn accept(&mut self, root: Root) -> bool;
}

impl RootSink for Vec<Root> {
    fn accept(&mut self, root: Root) -> bool {
        self.push(root);
        true
    }
}

impl RootSink for SyncSender<Root> {
    fn accept(&mut self, root: Root) -> bool {
        self.send(root).is_ok()
    }
}

/// Counts reported when a parse run finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParseSummary {
    pub roots: usize,
    pub diagnostics: usize,
    /// The run ended on a lexical error rather than end of input
    pub lexical_error: bool,
}

type DiagnosticHandler = Box<dyn FnMut(Diagnostic) + Send>;

/// Recursive descent parser for Kaleidoscope
pub struct Parser<I: Iterator<Item = Token>> {
    tokens: I,
    pub(crate) current: Token,
    pub(crate) table: OperatorTable,
    /// Name of the unit the current token came from
    unit: String,
    /// End of the last significant token before `current`
    prev_end: Pos,
    on_diagnostic: DiagnosticHandler,
    summary: ParseSummary,
}

impl<I: Iterator<Item = Token>> Parser<I> {
    pub fn new(tokens: I, table: OperatorTable) -> Self {
        Parser {
            tokens,
            current: Token::new(TokenKind::Space, Pos(0), ""),
            table,
            unit: String::new(),
            prev_end: Pos(0),
            on_diagnostic: Box::new(|_| {}),
            summary: ParseSummary::default(),
        }
    }

    /// Install the callback that receives every diagnostic.
    pub fn with_diagnostics(
        mut self,
        handler: impl FnMut(Diagnostic) + Send + 'static,
    ) -> Self {
        self.on_diagnostic = Box::new(handler);
        self
    }

    /// Parse statements until the token stream ends, handing each root to
    /// `sink` as soon as it is complete.
    pub fn parse_into<S: RootSink>(&mut self, sink: &mut S) -> ParseSummary {
        self.advance();

        loop {
            let result = match self.current.kind {
                TokenKind::Eof => break,
                TokenKind::Error => {
                    self.report_lexical_error();
                    break;
                }
                TokenKind::NewUnit => {
                    self.unit = std::mem::take(&mut self.current.text);
                    debug!(unit = %self.unit, "parsing unit");
                    self.advance();
                    continue;
                }
                TokenKind::Semicolon => {
                    self.advance();
                    continue;
                }
                TokenKind::Def => self.parse_definition().map(Root::Function),
                TokenKind::Extern => self.parse_extern().map(Root::Extern),
                _ => self.parse_top_level_expr().map(Root::Function),
            };

            match result {
                Ok(root) => {
                    debug!(unit = %self.unit, pos = root.pos().0, root = %root, "parsed statement");
                    self.summary.roots += 1;
                    if !sink.accept(root) {
                        debug!("root consumer went away, stopping");
                        break;
                    }
                }
                Err(err) => {
                    // A lexical error mid-statement gets its own diagnostic
                    // on the next turn of the loop.
                    if self.current.kind != TokenKind::Error {
                        self.report_syntax_error(err);
                    }
                    self.synchronize();
                }
            }
        }

        self.summary
    }

    /// Parse everything into a vector.
    pub fn parse_all(&mut self) -> Vec<Root> {
        let mut roots = Vec::new();
        self.parse_into(&mut roots);
        roots
    }

    /// Bare expression, wrapped as an anonymous function
    fn parse_top_level_expr(&mut self) -> Result<Function, ParseError> {
        let pos = self.current.pos;
        let body = self.parse_expression()?;
        Ok(Function {
            proto: Prototype::anonymous(pos),
            body,
            pos,
        })
    }

    /// Skip to the start of the next statement.
    fn synchronize(&mut self) {
        while !matches!(
            self.current.kind,
            TokenKind::Semicolon
                | TokenKind::Def
                | TokenKind::Extern
                | TokenKind::NewUnit
                | TokenKind::Eof
                | TokenKind::Error
        ) {
            self.advance();
        }
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        debug!(
            unit = %diagnostic.unit,
            pos = diagnostic.pos.0,
            kind = ?diagnostic.kind,
            "{}",
            diagnostic.message
        );
        self.summary.diagnostics += 1;
        (self.on_diagnostic)(diagnostic);
    }

    fn report_syntax_error(&mut self, err: ParseError) {
        let diagnostic = Diagnostic {
            kind: DiagnosticKind::Syntax,
            unit: self.unit.clone(),
            pos: err.pos,
            message: err.message,
            found: Some(err.found.to_string()),
        };
        self.report(diagnostic);
    }

    fn report_lexical_error(&mut self) {
        self.summary.lexical_error = true;
        let diagnostic = Diagnostic {
            kind: DiagnosticKind::Lexical,
            unit: self.unit.clone(),
            pos: self.current.pos,
            message: self.current.text.clone(),
            found: None,
        };
        self.report(diagnostic);
    }

    // ===== Helper methods =====

    /// Move to the next significant token. Whitespace and comments are
    /// skipped; a terminal token is never moved past.
    pub(crate) fn advance(&mut self) {
        if self.current.kind.is_terminal() {
            return;
        }
        if self.current.kind != TokenKind::NewUnit {
            self.prev_end = Pos(self.current.pos.0 + self.current.text.len());
        }
        loop {
            match self.tokens.next() {
                Some(token) if token.kind.is_trivia() => continue,
                Some(token) => {
                    self.current = token;
                    return;
                }
                None => {
                    // The lexer vanished without a terminal token.
                    self.current = Token::new(TokenKind::Eof, self.current.pos, "");
                    return;
                }
            }
        }
    }

    pub(crate) fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    pub(crate) fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume a token of `kind` and return it, or fail with `message`.
    pub(crate) fn expect(
        &mut self,
        kind: TokenKind,
        message: &str,
    ) -> Result<Token, ParseError> {
        if self.check(kind) {
            let token = self.current.clone();
            self.advance();
            Ok(token)
        } else {
            Err(self.error(message))
        }
    }

    pub(crate) fn expect_identifier(
        &mut self,
        message: &str,
    ) -> Result<String, ParseError> {
        self.expect(TokenKind::Identifier, message).map(|t| t.text)
    }

    /// Error located at the current token. A statement cut short by the
    /// start of the next unit is reported just past its last significant
    /// token; trailing whitespace and comments do not move it.
    pub(crate) fn error(&self, message: &str) -> ParseError {
        let pos = match self.current.kind {
            TokenKind::NewUnit => self.prev_end,
            _ => self.current.pos,
        };
        self.error_at(pos, message)
    }

    pub(crate) fn error_at(&self, pos: Pos, message: &str) -> ParseError {
        ParseError {
            message: message.to_string(),
            pos,
            found: self.current.clone(),
        }
    }
}

/// Lex and parse `units` synchronously with a fresh operator table.
pub fn parse_units<U>(units: U) -> (Vec<Root>, Vec<Diagnostic>)
where
    U: IntoIterator<Item = InputUnit>,
{
    let table = OperatorTable::new();
    let tokens = Lexer::new(table.clone()).tokenize(units);

    let (tx, rx) = mpsc::channel();
    let mut parser = Parser::new(tokens.into_iter(), table).with_diagnostics(
        move |diagnostic| {
            let _ = tx.send(diagnostic);
        },
    );
    let roots = parser.parse_all();
    drop(parser);

    (roots, rx.into_iter().collect())
}

/// Lex and parse a single named source text.
pub fn parse_source(name: &str, text: &str) -> (Vec<Root>, Vec<Diagnostic>) {
    parse_units([InputUnit::from_source(name, text)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_function() {
        let (roots, diagnostics) = parse_source("test", "def foo(x y) x+y");

        assert!(diagnostics.is_empty());
        assert_eq!(roots.len(), 1);
        match &roots[0] {
            Root::Function(func) => {
                assert_eq!(func.proto.name, "foo");
                assert_eq!(func.proto.args, vec!["x", "y"]);
                assert!(!func.proto.is_operator);
                assert_eq!(func.body.to_string(), "(+ x y)");
            }
            _ => panic!("Expected function definition"),
        }
    }

    #[test]
    fn test_top_level_expression_is_anonymous() {
        let (roots, _) = parse_source("test", "1 + 2");
        assert_eq!(roots.len(), 1);
        assert!(roots[0].is_anonymous());
        assert_eq!(roots[0].prototype().name, "");
    }

    #[test]
    fn test_extern() {
        let (roots, _) = parse_source("test", "extern sin(x);");
        match &roots[0] {
            Root::Extern(proto) => {
                assert_eq!(proto.name, "sin");
                assert_eq!(proto.args, vec!["x"]);
            }
            _ => panic!("Expected extern prototype"),
        }
    }

    #[test]
    fn test_empty_input() {
        let (roots, diagnostics) = parse_source("empty", "");
        assert!(roots.is_empty());
        assert!(diagnostics.is_empty());

        let (roots, diagnostics) = parse_units(Vec::new());
        assert!(roots.is_empty());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_semicolons_and_comments_produce_nothing() {
        let (roots, diagnostics) =
            parse_source("test", ";;\n# just a comment\n;");
        assert!(roots.is_empty());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_failed_statement_is_dropped() {
        let (roots, diagnostics) = parse_source("test", "if 1 else 2; 7");

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::Syntax);
        assert_eq!(diagnostics[0].message, "expected 'then' after if condition");
        assert_eq!(diagnostics[0].pos, Pos(5));
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].to_string(), "7");
    }

    #[test]
    fn test_recovery_stops_at_def() {
        let (roots, diagnostics) =
            parse_source("test", "foo(1 2 def bar() 3");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].message,
            "expected ')' or ',' in argument list"
        );
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].prototype().name, "bar");
    }

    #[test]
    fn test_lexical_error_ends_parse() {
        let (roots, diagnostics) = parse_source("lex", "1; 2 + $; 3");
        assert_eq!(roots.len(), 1);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::Lexical);
        assert_eq!(diagnostics[0].unit, "lex");
        assert_eq!(diagnostics[0].pos, Pos(7));
    }

    #[test]
    fn test_diagnostic_display() {
        let (_, diagnostics) = parse_source("main.k", "def 1");
        assert_eq!(
            diagnostics[0].to_string(),
            "main.k:4: expected function name in prototype (found number '1')"
        );
    }

    #[test]
    fn test_summary_counts() {
        let table = OperatorTable::new();
        let tokens = Lexer::new(table.clone())
            .tokenize([InputUnit::from_source("t", "1; then; 2")]);
        let mut parser = Parser::new(tokens.into_iter(), table);
        let mut roots = Vec::new();
        let summary = parser.parse_into(&mut roots);
        assert_eq!(
            summary,
            ParseSummary {
                roots: 2,
                diagnostics: 1,
                lexical_error: false,
            }
        );
    }

    #[test]
    fn test_cut_statement_ignores_trailing_trivia() {
        let (roots, diagnostics) = parse_units([
            InputUnit::from_source("one", "def f(x) (x   # c"),
            InputUnit::from_source("two", "2"),
        ]);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].unit, "one");
        assert_eq!(diagnostics[0].pos, Pos(11));
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].to_string(), "2");
    }

    #[test]
    fn test_stream_without_terminal_token() {
        let tokens = vec![
            Token::new(TokenKind::NewUnit, Pos(0), "cut"),
            Token::new(TokenKind::Number, Pos(0), "4"),
        ];
        let mut parser = Parser::new(tokens.into_iter(), OperatorTable::new());
        let roots = parser.parse_all();
        assert_eq!(roots.len(), 1);
    }
}
