// Threaded lexer → parser pipeline

use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::parser::ast::Root;
use crate::parser::lexer::{Lexer, UnitSender};
use crate::parser::operators::OperatorTable;
use crate::parser::parse::{Diagnostic, ParseSummary, Parser};
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::errors::PipelineError;
use crate::pipeline::input::InputUnit;

/// Root receiver shared between a [`Pipeline`] and its [`RootStream`], so
/// `finish` can take it back and drain it.
type SharedRoots = Arc<Mutex<Option<Receiver<Root>>>>;

/// A lexer thread and a parser thread joined by a bounded token channel.
///
/// Units go in through [`submit`](Pipeline::submit); AST roots come out of
/// [`roots`](Pipeline::roots) in program order while later units are still
/// being lexed. Both stages share one [`OperatorTable`] for the whole run.
pub struct Pipeline {
    units: Option<UnitSender>,
    roots: SharedRoots,
    roots_taken: bool,
    lexer: Option<JoinHandle<()>>,
    parser: Option<JoinHandle<ParseSummary>>,
    table: OperatorTable,
}

impl Pipeline {
    /// Start both stages. Every diagnostic is passed to `diagnostics` on the
    /// parser thread, in the order the problems were found.
    pub fn spawn(
        config: PipelineConfig,
        diagnostics: impl FnMut(Diagnostic) + Send + 'static,
    ) -> Result<Self, PipelineError> {
        let table = OperatorTable::new();
        let lexer = Lexer::new(table.clone())
            .with_token_tracing(config.trace_tokens)
            .spawn(&config)?;

        let (root_tx, root_rx) = mpsc::sync_channel::<Root>(config.root_buffer);
        let tokens = lexer.tokens;
        let parser_table = table.clone();

        let parser = thread::Builder::new()
            .name("kaleidoscope-parser".to_string())
            .spawn(move || {
                let mut root_tx = root_tx;
                Parser::new(tokens, parser_table)
                    .with_diagnostics(diagnostics)
                    .parse_into(&mut root_tx)
            })
            .map_err(|source| PipelineError::Spawn {
                stage: "parser",
                source,
            })?;

        debug!(?config, "pipeline started");

        Ok(Pipeline {
            units: Some(lexer.units),
            roots: Arc::new(Mutex::new(Some(root_rx))),
            roots_taken: false,
            lexer: Some(lexer.handle),
            parser: Some(parser),
            table,
        })
    }

    /// Queue an input unit, blocking while the unit queue is full.
    pub fn submit(&self, unit: InputUnit) -> Result<(), PipelineError> {
        match &self.units {
            Some(units) => units.submit(unit),
            None => Err(PipelineError::Closed),
        }
    }

    /// Signal that no more units will be submitted.
    pub fn close(&mut self) {
        if let Some(units) = self.units.take() {
            units.close();
        }
    }

    /// A handle for submitting units from another thread. Input stays open
    /// until every handle is dropped, even after [`close`](Pipeline::close).
    pub fn unit_sender(&self) -> Option<UnitSender> {
        self.units.clone()
    }

    /// Take the stream of parsed roots. Later calls get an empty stream.
    pub fn roots(&mut self) -> RootStream {
        if self.roots_taken {
            return RootStream { shared: None };
        }
        self.roots_taken = true;
        RootStream {
            shared: Some(Arc::clone(&self.roots)),
        }
    }

    pub fn table(&self) -> &OperatorTable {
        &self.table
    }

    /// Close the input, wait for both stages and report what the parser saw.
    ///
    /// Roots not yet read from the [`RootStream`] are discarded, and the
    /// stream ends, whether or not it is still alive.
    pub fn finish(mut self) -> Result<ParseSummary, PipelineError> {
        self.close();

        // Drain rather than drop so the parser sees the whole input.
        let rx = self
            .roots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(rx) = rx {
            rx.into_iter().for_each(drop);
        }

        let summary = match self.parser.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| PipelineError::WorkerPanicked { stage: "parser" })?,
            None => ParseSummary::default(),
        };
        if let Some(handle) = self.lexer.take() {
            handle
                .join()
                .map_err(|_| PipelineError::WorkerPanicked { stage: "lexer" })?;
        }

        debug!(
            roots = summary.roots,
            diagnostics = summary.diagnostics,
            lexical_error = summary.lexical_error,
            "pipeline finished"
        );
        Ok(summary)
    }
}

/// Ordered, single-pass stream of roots from a running [`Pipeline`]
#[derive(Debug)]
pub struct RootStream {
    shared: Option<SharedRoots>,
}

impl Iterator for RootStream {
    type Item = Root;

    fn next(&mut self) -> Option<Root> {
        let receiver = self
            .shared
            .as_ref()?
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        receiver.as_ref()?.recv().ok()
    }
}
