//! Streaming lexer/parser pipeline
//!
//! This module wires the [`crate::parser`] stages onto threads:
//! - [`engine`]: The [`Pipeline`](engine::Pipeline) and its root stream
//! - [`input`]: Named input units
//! - [`config`]: Channel sizes, precedence constants and tracing switches
//! - [`errors`]: Plumbing error types
//!
//! # Execution Model
//!
//! ```text
//! InputUnit → [unit queue] → lexer thread → [tokens] → parser thread → [roots] → consumer
//! ```
//!
//! Every queue is a bounded `sync_channel`, so a slow consumer throttles the
//! parser, which throttles the lexer, which throttles `submit`. The run ends
//! when input is closed and drained, or at the first lexical error.

pub mod config;
pub mod engine;
pub mod errors;
pub mod input;

pub use engine::{Pipeline, RootStream};
