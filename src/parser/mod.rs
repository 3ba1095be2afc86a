//! Kaleidoscope source parser
//!
//! This module transforms Kaleidoscope source text into AST roots:
//! - [`lexer`]: Tokenization (input units → tokens)
//! - [`operators`]: The operator table shared by the lexer and the parser
//! - [`parse`]: Parsing (tokens → AST roots), diagnostics and recovery
//! - [`ast`]: AST node definitions
//!
//! # Language
//!
//! - Values: every value is an `f64`; literals are decimal or `0x` hex
//! - Statements: `def` functions, `extern` prototypes, bare expressions
//! - Expressions: calls, `if`/`then`/`else`, `for ... in`, `var ... in`
//! - Operators: `= < + - * /` built in; programs add their own with
//!   `def unary<c>` and `def binary<c> <precedence>`
//!
//! # Parser Implementation
//!
//! Hand-written state-machine lexer and recursive descent parser with
//! precedence climbing for binary operators. No external parser generator
//! dependencies.

pub mod ast;
mod declarations;
mod expressions;
pub mod lexer;
pub mod operators;
pub mod parse;


pub use parse::{parse_source, parse_units};
