//! Shared operator table
//!
//! Kaleidoscope programs can declare new operators at run time:
//!
//! ```text
//! def unary!(v) if v then 0 else 1;
//! def binary| 5 (l r) if l then 1 else if r then 1 else 0;
//! ```
//!
//! The declaration is split across both pipeline stages. The lexer records the
//! *classification* of `!` and `|` when it scans the character after the
//! `unary`/`binary` keyword, so later occurrences are tokenised as operators.
//! The parser records the *precedence* when it finishes the `binary`
//! prototype. Both stages hold a clone of the same [`OperatorTable`], which
//! guards the two maps with a single lock.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rustc_hash::FxHashMap;

use crate::pipeline::config::BUILTIN_PRECEDENCE;

/// How the lexer should treat a character that is not otherwise punctuation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperatorClass {
    #[default]
    NotOperator,
    Unary,
    Binary,
}

#[derive(Debug, Default)]
struct Operators {
    classes: FxHashMap<char, OperatorClass>,
    precedence: FxHashMap<char, u32>,
}

/// Cloneable handle to the operator maps of one pipeline run
#[derive(Debug, Clone)]
pub struct OperatorTable {
    inner: Arc<Mutex<Operators>>,
}

impl OperatorTable {
    /// Table holding only the built-in precedences.
    pub fn new() -> Self {
        let mut operators = Operators::default();
        operators.precedence.extend(BUILTIN_PRECEDENCE.iter().copied());
        Self {
            inner: Arc::new(Mutex::new(operators)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Operators> {
        // The maps stay consistent even if a holder panicked mid-call.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// User classification of `c`; built-in operators report `NotOperator`
    /// unless a program declared them.
    pub fn classify(&self, c: char) -> OperatorClass {
        self.lock().classes.get(&c).copied().unwrap_or_default()
    }

    pub fn set_classification(&self, c: char, class: OperatorClass) {
        self.lock().classes.insert(c, class);
    }

    /// Binary precedence of `c`, if it is usable as a binary operator.
    pub fn precedence_of(&self, c: char) -> Option<u32> {
        self.lock().precedence.get(&c).copied()
    }

    pub fn set_precedence(&self, c: char, precedence: u32) {
        self.lock().precedence.insert(c, precedence);
    }
}

impl Default for OperatorTable {
    fn default() -> Self {
        Self::new()
    }
}
