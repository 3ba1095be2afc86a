//! Pipeline error types
//!
//! [`PipelineError`] covers failures of the pipeline plumbing itself: opening
//! input, starting or joining the stage threads, and talking to a stage that
//! has stopped.
//! Problems in the *program text* are never reported here: they travel as
//! [`Diagnostic`](crate::parser::parse::Diagnostic)s.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The lexer is no longer accepting units: `close` was called, or a
    /// lexical error ended the run.
    #[error("the lexer has stopped accepting input units")]
    Closed,

    #[error("cannot open input '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot start the {stage} thread: {source}")]
    Spawn {
        stage: &'static str,
        #[source]
        source: io::Error,
    },

    /// A stage thread panicked instead of finishing its stream.
    #[error("the {stage} stage panicked")]
    WorkerPanicked { stage: &'static str },
}
