//! # Introduction
//!
//! A streaming front end for Kaleidoscope, the small expression language of
//! the LLVM tutorial. Source text is turned into AST roots, one per top-level
//! statement, while the rest of the input is still being read.
//!
//! ## Pipeline
//!
//! ```text
//! InputUnit → Lexer → Tokens → Parser → Roots → consumer
//! ```
//!
//! 1. [`parser`]: the state-machine [`parser::lexer`], the
//!    [`parser::operators`] table programs extend at run time, and the
//!    recursive descent [`parser::parse`] with precedence climbing.
//! 2. [`pipeline`]: runs the lexer and parser on their own threads joined by
//!    bounded channels; see [`pipeline::Pipeline`].
//!
//! ## Example
//!
//! ```
//! use kaleidoscope::parser::parse_source;
//!
//! let (roots, diagnostics) = parse_source("demo", "def binary ^ 60 (a b) a*a; 1 + 3^3");
//! assert!(diagnostics.is_empty());
//! assert_eq!(roots[1].to_string(), "(+ 1 (^ 3 3))");
//! ```
//!
//! ## Language
//!
//! Statements: `def` functions, `extern` prototypes and bare expressions
//! (wrapped as anonymous functions). Expressions: numbers, variables, calls,
//! `if/then/else`, `for ... in`, `var ... in`, and unary/binary operators,
//! including operators the program declares itself.

pub mod parser;
pub mod pipeline;
