//! Lexer (tokenizer) for Kaleidoscope source
//!
//! A state-machine scanner in the "lexical scanning" style: every state is a
//! method that looks at the next character and returns the state to run next,
//! or `None` once the current input unit is exhausted. The scanner pushes
//! tokens into a [`TokenSink`] as soon as they are recognised, so the parser
//! can start on the first statement while the rest of the input is still
//! being read.
//!
//! Whitespace and comments are emitted as tokens (the parser skips them).
//! Every input unit is introduced by a [`TokenKind::NewUnit`] marker and the
//! whole stream ends with exactly one terminal token: [`TokenKind::Eof`] after
//! the last unit, or [`TokenKind::Error`] at the first lexical error.

use std::fmt;
use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};

use tracing::{debug, trace};

use super::ast::Pos;
use super::operators::{OperatorClass, OperatorTable};
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::errors::PipelineError;
use crate::pipeline::input::InputUnit;

/// All token kinds produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Special
    Eof,
    Error,
    NewUnit,
    Comment,

    // Punctuation
    Space,
    Semicolon,
    Comma,
    LeftParen,
    RightParen,

    // Literals and names
    Number,
    Identifier,

    // Keywords
    Def,
    Extern,
    If,
    Then,
    Else,
    For,
    In,
    Binary,
    Unary,
    Var,

    // Operators
    UserUnaryOp,
    UserBinaryOp,
    Equal,    // =
    Plus,     // +
    Minus,    // -
    Star,     // *
    Slash,    // /
    LessThan, // <
}

impl TokenKind {
    /// Keyword kind for `word`, if it is reserved.
    pub fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word {
            "def" => TokenKind::Def,
            "extern" => TokenKind::Extern,
            "if" => TokenKind::If,
            "then" => TokenKind::Then,
            "else" => TokenKind::Else,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "binary" => TokenKind::Binary,
            "unary" => TokenKind::Unary,
            "var" => TokenKind::Var,
            _ => return None,
        };
        Some(kind)
    }

    /// Kind of a built-in operator character.
    pub fn builtin_operator(c: char) -> Option<TokenKind> {
        let kind = match c {
            '=' => TokenKind::Equal,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '<' => TokenKind::LessThan,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_builtin_operator(self) -> bool {
        matches!(
            self,
            TokenKind::Equal
                | TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Star
                | TokenKind::Slash
                | TokenKind::LessThan
        )
    }

    pub fn is_operator(self) -> bool {
        self.is_builtin_operator()
            || matches!(self, TokenKind::UserUnaryOp | TokenKind::UserBinaryOp)
    }

    /// Whitespace and comments, which carry no meaning for the parser.
    pub fn is_trivia(self) -> bool {
        matches!(self, TokenKind::Space | TokenKind::Comment)
    }

    /// Kinds that end the token stream.
    pub fn is_terminal(self) -> bool {
        matches!(self, TokenKind::Eof | TokenKind::Error)
    }
}

/// A lexed token: kind, start offset and the source text it covers.
///
/// For [`TokenKind::Error`] the text is the error message and for
/// [`TokenKind::NewUnit`] it is the unit name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
    pub text: String,
}

impl Token {
    pub fn new(kind: TokenKind, pos: Pos, text: impl Into<String>) -> Self {
        Token {
            kind,
            pos,
            text: text.into(),
        }
    }

    /// The operator character of an operator token.
    pub fn operator_char(&self) -> Option<char> {
        if self.kind.is_operator() {
            self.text.chars().next()
        } else {
            None
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => write!(f, "end of input"),
            TokenKind::Error => write!(f, "error: {}", self.text),
            TokenKind::NewUnit => write!(f, "start of '{}'", self.text),
            TokenKind::Comment => write!(f, "comment"),
            TokenKind::Space => write!(f, "whitespace"),
            TokenKind::Number => write!(f, "number '{}'", self.text),
            TokenKind::Identifier => write!(f, "identifier '{}'", self.text),
            TokenKind::UserUnaryOp => {
                write!(f, "unary operator '{}'", self.text)
            }
            TokenKind::UserBinaryOp => {
                write!(f, "binary operator '{}'", self.text)
            }
            _ => write!(f, "'{}'", self.text),
        }
    }
}

/// Destination for scanned tokens.
pub trait TokenSink {
    /// Accept a token; `false` means nobody is listening any more.
    fn accept(&mut self, token: Token) -> bool;
}

impl TokenSink for Vec<Token> {
    fn accept(&mut self, token: Token) -> bool {
        self.push(token);
        true
    }
}

impl TokenSink for SyncSender<Token> {
    fn accept(&mut self, token: Token) -> bool {
        self.send(token).is_ok()
    }
}

/// Characters a number run may contain. Validation is the parser's job.
const NUMBER_CHARS: &str = "0123456789.xabcdefABCDEF";

fn is_space(c: char) -> bool {
    c == ' ' || c == '\t'
}

fn is_eol(c: char) -> bool {
    c == '\n' || c == '\r'
}

fn is_alphanumeric(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

/// Whether `c` may be declared as a user operator.
fn is_operator_char(c: char) -> bool {
    !(is_space(c)
        || is_eol(c)
        || is_alphanumeric(c)
        || matches!(c, '(' | ')' | ',' | ';' | '#' | '.'))
}

/// `U+0040 '@'`
fn describe_char(c: char) -> String {
    format!("U+{:04X} {:?}", c as u32, c)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    TopLevel,
    Space,
    Comment,
    Number,
    Identifier,
    UserOperator(OperatorClass),
}

/// How scanning of one unit ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitEnd {
    Finished,
    Failed,
    Disconnected,
}

/// Scanner over a single input unit
struct Scanner<'a, S: TokenSink> {
    source: &'a mut dyn BufRead,
    table: &'a OperatorTable,
    sink: &'a mut S,
    trace_tokens: bool,
    /// Current line, including its line terminator
    line: String,
    /// Unit offset of the first byte of `line`
    line_start: usize,
    pos: usize,
    start: usize,
    width: usize,
    paren_depth: usize,
    exhausted: bool,
    read_error: Option<String>,
    end: Option<UnitEnd>,
}

impl<'a, S: TokenSink> Scanner<'a, S> {
    fn new(
        source: &'a mut dyn BufRead,
        table: &'a OperatorTable,
        sink: &'a mut S,
        trace_tokens: bool,
    ) -> Self {
        Scanner {
            source,
            table,
            sink,
            trace_tokens,
            line: String::new(),
            line_start: 0,
            pos: 0,
            start: 0,
            width: 0,
            paren_depth: 0,
            exhausted: false,
            read_error: None,
            end: None,
        }
    }

    fn run(mut self) -> (UnitEnd, Pos) {
        let mut state = Some(State::TopLevel);
        while let Some(current) = state {
            state = match current {
                State::TopLevel => self.lex_top_level(),
                State::Space => self.lex_space(),
                State::Comment => self.lex_comment(),
                State::Number => self.lex_number(),
                State::Identifier => self.lex_identifier(),
                State::UserOperator(class) => self.lex_user_operator(class),
            };
            if self.end.is_some() {
                break;
            }
        }
        let end = self.end.unwrap_or(UnitEnd::Finished);
        (end, Pos(self.line_start + self.pos))
    }

    // ===== Character helpers =====

    /// Next character, reading another line when the current one is used up.
    fn next(&mut self) -> Option<char> {
        if self.pos >= self.line.len() && !self.refill() {
            self.width = 0;
            return None;
        }
        let c = self.line[self.pos..].chars().next()?;
        self.width = c.len_utf8();
        self.pos += self.width;
        Some(c)
    }

    fn refill(&mut self) -> bool {
        if self.exhausted {
            return false;
        }
        let mut line = String::new();
        match self.source.read_line(&mut line) {
            Ok(0) => {
                self.exhausted = true;
                false
            }
            Ok(_) => {
                self.line_start += self.line.len();
                self.line = line;
                self.pos = 0;
                self.start = 0;
                true
            }
            Err(err) => {
                self.exhausted = true;
                self.read_error = Some(format!("cannot read input: {}", err));
                false
            }
        }
    }

    /// Step back over the last character returned by `next`.
    fn backup(&mut self) {
        self.pos -= self.width;
        self.width = 0;
    }

    fn ignore(&mut self) {
        self.start = self.pos;
    }

    fn accept_run(&mut self, valid: impl Fn(char) -> bool) {
        while let Some(c) = self.next() {
            if !valid(c) {
                self.backup();
                break;
            }
        }
    }

    fn word(&self) -> &str {
        &self.line[self.start..self.pos]
    }

    fn send(&mut self, token: Token) {
        if !deliver(&mut *self.sink, token, self.trace_tokens) {
            self.end = Some(UnitEnd::Disconnected);
        }
    }

    fn emit(&mut self, kind: TokenKind) {
        let token = Token::new(
            kind,
            Pos(self.line_start + self.start),
            self.word(),
        );
        self.start = self.pos;
        self.send(token);
    }

    /// Emit an error token and stop scanning.
    fn error(&mut self, message: String) -> Option<State> {
        let token =
            Token::new(TokenKind::Error, Pos(self.line_start + self.start), message);
        self.send(token);
        if self.end.is_none() {
            self.end = Some(UnitEnd::Failed);
        }
        None
    }

    // ===== States =====

    fn lex_top_level(&mut self) -> Option<State> {
        let Some(c) = self.next() else {
            if let Some(message) = self.read_error.take() {
                return self.error(message);
            }
            return None;
        };

        match c {
            c if is_space(c) => {
                self.backup();
                Some(State::Space)
            }
            c if is_eol(c) => {
                self.ignore();
                Some(State::TopLevel)
            }
            ';' => {
                self.emit(TokenKind::Semicolon);
                Some(State::TopLevel)
            }
            ',' => {
                self.emit(TokenKind::Comma);
                Some(State::TopLevel)
            }
            '#' => Some(State::Comment),
            '(' => {
                self.paren_depth += 1;
                self.emit(TokenKind::LeftParen);
                Some(State::TopLevel)
            }
            ')' => {
                if self.paren_depth == 0 {
                    return self.error("unexpected right paren".to_string());
                }
                self.paren_depth -= 1;
                self.emit(TokenKind::RightParen);
                Some(State::TopLevel)
            }
            c if c.is_ascii_digit() || c == '.' => {
                self.backup();
                Some(State::Number)
            }
            c if is_alphanumeric(c) => {
                self.backup();
                Some(State::Identifier)
            }
            c => {
                // A built-in declared `unary` is tagged here, at scan time, so
                // the parser never has to consult a table the lexer may have
                // already moved past. Its binary meaning survives through its
                // precedence.
                let kind = match (
                    self.table.classify(c),
                    TokenKind::builtin_operator(c),
                ) {
                    (OperatorClass::Unary, _) => TokenKind::UserUnaryOp,
                    (_, Some(builtin)) => builtin,
                    (OperatorClass::Binary, None) => TokenKind::UserBinaryOp,
                    (OperatorClass::NotOperator, None) => {
                        return self.error(format!(
                            "unrecognized character: {}",
                            describe_char(c)
                        ));
                    }
                };
                self.emit(kind);
                Some(State::TopLevel)
            }
        }
    }

    fn lex_space(&mut self) -> Option<State> {
        self.glob_whitespace();
        Some(State::TopLevel)
    }

    fn glob_whitespace(&mut self) {
        self.accept_run(is_space);
        if self.start != self.pos {
            self.emit(TokenKind::Space);
        }
    }

    /// From `#` to the end of the line; the terminator is not included.
    fn lex_comment(&mut self) -> Option<State> {
        self.accept_run(|c| !is_eol(c));
        self.emit(TokenKind::Comment);
        Some(State::TopLevel)
    }

    fn lex_number(&mut self) -> Option<State> {
        self.accept_run(|c| NUMBER_CHARS.contains(c));
        self.emit(TokenKind::Number);
        Some(State::TopLevel)
    }

    fn lex_identifier(&mut self) -> Option<State> {
        self.accept_run(is_alphanumeric);
        match TokenKind::keyword(self.word()) {
            Some(kind) => {
                self.emit(kind);
                match kind {
                    TokenKind::Binary => {
                        Some(State::UserOperator(OperatorClass::Binary))
                    }
                    TokenKind::Unary => {
                        Some(State::UserOperator(OperatorClass::Unary))
                    }
                    _ => Some(State::TopLevel),
                }
            }
            None => {
                self.emit(TokenKind::Identifier);
                Some(State::TopLevel)
            }
        }
    }

    /// The single character after `binary` / `unary`, which becomes an
    /// operator for the rest of the run.
    fn lex_user_operator(&mut self, class: OperatorClass) -> Option<State> {
        self.glob_whitespace();
        let keyword = match class {
            OperatorClass::Unary => "unary",
            _ => "binary",
        };
        match self.next() {
            Some(c) if is_operator_char(c) => {
                self.table.set_classification(c, class);
                let kind = match class {
                    OperatorClass::Unary => TokenKind::UserUnaryOp,
                    _ => TokenKind::UserBinaryOp,
                };
                self.emit(kind);
                Some(State::TopLevel)
            }
            _ => {
                if let Some(message) = self.read_error.take() {
                    return self.error(message);
                }
                self.error(format!(
                    "expected operator character after '{}'",
                    keyword
                ))
            }
        }
    }
}

/// Hand `token` to `sink`, logging it first when token tracing is on.
fn deliver<S: TokenSink>(sink: &mut S, token: Token, trace_tokens: bool) -> bool {
    if trace_tokens {
        trace!(kind = ?token.kind, pos = token.pos.0, text = %token.text, "token");
    }
    sink.accept(token)
}

/// Scans input units in order, sharing one operator table across them.
#[derive(Debug, Clone)]
pub struct Lexer {
    table: OperatorTable,
    trace_tokens: bool,
}

impl Lexer {
    pub fn new(table: OperatorTable) -> Self {
        Lexer {
            table,
            trace_tokens: false,
        }
    }

    pub fn with_token_tracing(mut self, enabled: bool) -> Self {
        self.trace_tokens = enabled;
        self
    }

    /// Scan `units` into `sink`, finishing with `Eof`, or stopping after the
    /// first `Error` token.
    pub fn run<I, S>(&self, units: I, sink: &mut S)
    where
        I: IntoIterator<Item = InputUnit>,
        S: TokenSink,
    {
        let mut end_pos = Pos(0);
        for mut unit in units {
            debug!(unit = %unit.name, "lexing unit");
            let marker = Token::new(TokenKind::NewUnit, Pos(0), unit.name.as_str());
            if !deliver(sink, marker, self.trace_tokens) {
                return;
            }

            let scanner = Scanner::new(
                unit.source.as_mut(),
                &self.table,
                sink,
                self.trace_tokens,
            );
            let (end, pos) = scanner.run();
            end_pos = pos;
            match end {
                UnitEnd::Finished => {
                    debug!(unit = %unit.name, bytes = pos.0, "finished unit");
                }
                UnitEnd::Failed => {
                    debug!(unit = %unit.name, "lexical error, stopping");
                    return;
                }
                UnitEnd::Disconnected => {
                    debug!(unit = %unit.name, "token consumer went away");
                    return;
                }
            }
        }
        deliver(sink, Token::new(TokenKind::Eof, end_pos, ""), self.trace_tokens);
    }

    /// Scan everything up front; convenient for tests and small inputs.
    pub fn tokenize<I>(&self, units: I) -> Vec<Token>
    where
        I: IntoIterator<Item = InputUnit>,
    {
        let mut tokens = Vec::new();
        self.run(units, &mut tokens);
        tokens
    }

    /// Run the lexer on its own thread.
    ///
    /// Units are read from a queue of `config.unit_queue` entries and tokens
    /// are delivered through a channel of `config.token_buffer` entries; the
    /// thread blocks whenever either side is full or empty.
    pub fn spawn(self, config: &PipelineConfig) -> Result<SpawnedLexer, PipelineError> {
        let (unit_tx, unit_rx) = mpsc::sync_channel::<InputUnit>(config.unit_queue);
        let (token_tx, token_rx) = mpsc::sync_channel::<Token>(config.token_buffer);

        let handle = thread::Builder::new()
            .name("kaleidoscope-lexer".to_string())
            .spawn(move || {
                let mut token_tx = token_tx;
                self.run(unit_rx, &mut token_tx);
            })
            .map_err(|source| PipelineError::Spawn {
                stage: "lexer",
                source,
            })?;

        Ok(SpawnedLexer {
            units: UnitSender { tx: unit_tx },
            tokens: TokenStream { rx: token_rx },
            handle,
        })
    }
}

/// The three ends of a lexer running on its own thread
pub struct SpawnedLexer {
    pub units: UnitSender,
    pub tokens: TokenStream,
    pub handle: JoinHandle<()>,
}

/// Submission side of the lexer's unit queue
#[derive(Debug, Clone)]
pub struct UnitSender {
    tx: SyncSender<InputUnit>,
}

impl UnitSender {
    /// Queue a unit, blocking while the queue is full.
    pub fn submit(&self, unit: InputUnit) -> Result<(), PipelineError> {
        self.tx.send(unit).map_err(|_| PipelineError::Closed)
    }

    /// No more units; the lexer emits `Eof` once the queue drains.
    pub fn close(self) {}
}

/// Ordered, single-pass stream of tokens from a spawned lexer
#[derive(Debug)]
pub struct TokenStream {
    rx: Receiver<Token>,
}

impl Iterator for TokenStream {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.rx.recv().ok()
    }
}
