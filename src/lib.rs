//! A compiler for C--, a small C-like teaching language, targeting MIPS
//! assembly as run by SPIM.
//!
//! C-- has `int`, `bool` and `void`, string literals for output, structs,
//! and functions. The compiler is split into a scanner and three passes
//! over the tree: name analysis, type checking and code generation. Each
//! pass reports what it finds into a shared [`Diagnostics`] list and keeps
//! going, so one run surfaces every independent error.
//!
//! There is no parser in this crate; trees are built with [`AstBuilder`].
//!

#![warn(clippy::too_many_lines)]

use anyhow::{Context, Result};

use tracing::{info, instrument, level_filters::LevelFilter, subscriber::DefaultGuard};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    self,
    filter::FilterFn,
    fmt::format::FmtSpan,
    layer::{Filter, SubscriberExt},
    Layer,
};

mod common;
pub mod compiler;
pub mod lexer;
pub mod prelude;
mod typing;

pub use compiler::{compile, AsmListing, CompileResult, Diagnostic, Diagnostics, Severity};
pub use lexer::{Lexer, Token, TokenType};
pub use prelude::AstBuilder;

enum LevelOrFn {
    Level(LevelFilter),
    Fn(FilterFn),
}

impl<S> Filter<S> for LevelOrFn {
    fn enabled(
        &self,
        meta: &tracing::Metadata<'_>,
        cx: &tracing_subscriber::layer::Context<'_, S>,
    ) -> bool {
        match self {
            LevelOrFn::Level(l) => tracing_subscriber::layer::Filter::enabled(l, meta, cx),
            LevelOrFn::Fn(f) => tracing_subscriber::layer::Filter::enabled(f, meta, cx),
        }
    }
}

pub fn set_log_verbosity(verbose: usize) -> Result<(DefaultGuard, WorkerGuard)> {
    let outfile =
        std::fs::File::create("output.ansi").context("While creating debug output file")?;

    let (non_blocking, g) = tracing_appender::non_blocking(outfile);

    let file_trace = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::ACTIVE)
        // .without_time()
        // .with_ansi(false)
        .with_writer(non_blocking)
        .with_filter(match verbose {
            1 => LevelOrFn::Level(tracing_subscriber::filter::LevelFilter::DEBUG),
            n if n > 1 => LevelOrFn::Level(tracing_subscriber::filter::LevelFilter::TRACE),
            _ => LevelOrFn::Fn(tracing_subscriber::filter::filter_fn(|_| false)),
        });

    let err_trace = tracing_subscriber::fmt::layer()
        // .without_time()
        .with_writer(std::io::stderr)
        .with_filter(match verbose {
            n if n > 1 => tracing_subscriber::filter::LevelFilter::DEBUG,
            _ => tracing_subscriber::filter::LevelFilter::INFO,
        });

    let subscriber = tracing_subscriber::registry()
        .with(file_trace)
        .with(err_trace);

    Ok((tracing::subscriber::set_default(subscriber), g))
}

/// Scans the file at `path` to the end. Lexical problems are reported into
/// the returned diagnostics; the token list never includes EOF.
#[instrument(skip_all, level = "info", fields(path = %path))]
pub fn scan(path: &str) -> Result<(Vec<Token>, Diagnostics)> {
    let source =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
    Ok(scan_source(&source))
}

pub fn scan_source(source: &str) -> (Vec<Token>, Diagnostics) {
    let mut lexer = Lexer::new(source);
    let mut diagnostics = Diagnostics::new();
    let mut tokens = Vec::new();
    loop {
        let token = lexer.scan_token(&mut diagnostics);
        if token.is_eof() {
            break;
        }
        tokens.push(token);
    }
    info!("Scanned {} tokens.", tokens.len());
    (tokens, diagnostics)
}
