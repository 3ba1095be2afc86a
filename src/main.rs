// kaleidoscope: stream Kaleidoscope source through the lexer/parser pipeline

use std::io::{self, BufRead};
use std::process;
use std::thread;

use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use kaleidoscope::parser::ast::Root;
use kaleidoscope::pipeline::config::PipelineConfig;
use kaleidoscope::pipeline::errors::PipelineError;
use kaleidoscope::pipeline::input::InputUnit;
use kaleidoscope::pipeline::Pipeline;

/// Command-line options
#[derive(Debug, Default)]
struct Options {
    /// Log every token at trace level
    tokens: bool,
    /// Print roots as debug trees instead of s-expressions
    ast: bool,
    /// Input files; `-` is standard input
    inputs: Vec<String>,
}

impl Options {
    fn parse(args: impl Iterator<Item = String>) -> Result<Self, String> {
        let mut options = Options::default();
        for arg in args {
            if arg == "--tokens" {
                options.tokens = true;
            } else if arg == "--ast" {
                options.ast = true;
            } else if arg.starts_with("--") {
                return Err(format!("unknown option '{}'", arg));
            } else {
                options.inputs.push(arg);
            }
        }
        if options.inputs.is_empty() {
            options.inputs.push("-".to_string());
        }
        Ok(options)
    }
}

fn print_usage(program_name: &str) {
    eprintln!("Usage: {} [--tokens] [--ast] [file.k | -]...", program_name);
    eprintln!();
    eprintln!("With no files, or with '-', each line of standard input is parsed");
    eprintln!("as its own unit. Set RUST_LOG to control logging.");
}

fn init_tracing(trace_tokens: bool) {
    let default_directive = if trace_tokens {
        "kaleidoscope=trace"
    } else {
        "kaleidoscope=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .with_writer(io::stderr)
        .init();
}

fn print_root(root: &Root, as_tree: bool) {
    if as_tree {
        println!("{:#?}", root);
    } else {
        println!("{}", root);
    }
}

/// Feed every input to the pipeline. Stops early once the lexer has shut
/// down after a lexical error; returns whether any input failed to open.
fn submit_inputs(pipeline: &Pipeline, inputs: &[String]) -> Result<bool, PipelineError> {
    let mut open_failed = false;
    for input in inputs {
        let submitted = if input == "-" {
            submit_stdin(pipeline)
        } else {
            match InputUnit::open(input) {
                Ok(unit) => pipeline.submit(unit),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    open_failed = true;
                    continue;
                }
            }
        };
        match submitted {
            Ok(()) => {}
            Err(PipelineError::Closed) => {
                debug!("lexer stopped, skipping remaining input");
                break;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(open_failed)
}

/// One unit per line, so each line is parsed as soon as it is typed.
fn submit_stdin(pipeline: &Pipeline) -> Result<(), PipelineError> {
    for (index, line) in io::stdin().lock().lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                eprintln!("Error: cannot read standard input: {}", e);
                break;
            }
        };
        pipeline.submit(InputUnit::from_source(format!("stdin:{}", index + 1), line))?;
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args();
    let program_name = args.next().unwrap_or_else(|| "kaleidoscope".to_string());

    let options = match Options::parse(args) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("Error: {}", message);
            eprintln!();
            print_usage(&program_name);
            process::exit(2);
        }
    };

    init_tracing(options.tokens);

    let mut config = PipelineConfig::default();
    if options.tokens {
        config = config.with_token_tracing();
    }

    let mut pipeline = Pipeline::spawn(config, |diagnostic| eprintln!("{}", diagnostic))?;

    // Print roots on their own thread; the channels are bounded, so feeding
    // and draining from one thread could stall.
    let roots = pipeline.roots();
    let as_tree = options.ast;
    let printer = thread::spawn(move || {
        for root in roots {
            print_root(&root, as_tree);
        }
    });

    let open_failed = submit_inputs(&pipeline, &options.inputs)?;
    pipeline.close();

    printer
        .join()
        .map_err(|_| PipelineError::WorkerPanicked { stage: "printer" })?;
    let summary = pipeline.finish()?;

    info!(
        roots = summary.roots,
        diagnostics = summary.diagnostics,
        "done"
    );

    if open_failed || summary.diagnostics > 0 {
        process::exit(1);
    }
    Ok(())
}
