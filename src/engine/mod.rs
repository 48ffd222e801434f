//! Build engine boundary
//!
//! Project parsing, dependency resolution and target execution all live in
//! the external engine. This module defines the small surface `hbs` needs
//! from it:
//!
//! - `dump-cores` — JSON metadata (see [`crate::metadata`])
//! - `list-cores` / `list-targets <core>` / `dep-graph <target>` — plain text
//! - `run <target>` — pass/fail via exit status
//!
//! The [`Engine`] trait lets the scheduler and commands run against a fake in
//! tests; [`ProcessEngine`] is the real subprocess implementation.

pub mod process;

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;
use tracing::Instrument;

use crate::metadata::{Metadata, MetadataError};

pub use process::ProcessEngine;

/// Errors talking to the engine.
#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("cannot start engine '{program}': {source}")]
    #[diagnostic(
        code(hbs::engine::unavailable),
        help("set HBS_ENGINE to the engine executable, or install hbs.tcl next to hbs")
    )]
    Unavailable {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("engine command '{command}' failed{}", exit_suffix(.code))]
    #[diagnostic(code(hbs::engine::command_failed))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Metadata(#[from] MetadataError),
}

fn exit_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" with exit code {code}"),
        None => " (terminated by signal)".to_string(),
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// How the output of `run` is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Buffer stdout and stderr into [`RunOutput::output`].
    Capture,
    /// Stream directly to the terminal.
    Inherit,
}

/// Outcome of one `run` invocation that actually started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    /// Exit code, `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Combined stdout/stderr (empty in [`OutputMode::Inherit`]).
    pub output: String,
    pub duration: Duration,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[async_trait]
pub trait Engine: Send + Sync {
    /// Raw `dump-cores` JSON.
    async fn dump_cores(&self) -> EngineResult<String>;

    async fn list_cores(&self) -> EngineResult<String>;

    async fn list_targets(&self, core: &str) -> EngineResult<String>;

    async fn dep_graph(&self, target: &str) -> EngineResult<String>;

    /// Run a single target. A non-zero exit is reported in [`RunOutput`], not as an error.
    async fn run_target(&self, target: &str, mode: OutputMode) -> EngineResult<RunOutput>;

    /// Fresh metadata snapshot.
    async fn load_metadata(&self) -> EngineResult<Metadata> {
        let span = tracing::debug_span!("load_metadata", cores = tracing::field::Empty);
        async move {
            let json = self.dump_cores().await?;
            let metadata = Metadata::parse(&json)?;
            tracing::Span::current().record("cores", metadata.len());
            tracing::debug!("loaded core metadata");
            Ok(metadata)
        }
        .instrument(span)
        .await
    }
}
