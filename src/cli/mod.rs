//! CLI module for hbs
//!
//! ## Commands
//!
//! - `help [command]` - Print help for a command
//! - `dump-cores` - Dump core metadata as JSON
//! - `list-cores [pattern...]` - List cores, optionally filtered
//! - `list-targets <core-path>` - List targets of a core
//! - `dep-graph <target-path>` - Print the dependency graph of a target
//! - `run <target-path>` - Run a single target
//! - `test [-workers N] [pattern...]` - Run testbenches in parallel
//!
//! ## Modules
//!
//! - `commands` - Engine pass-through commands and `help`
//! - `help` - Help texts
//! - `test_runner` - Testbench selection, scheduling and reporting
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;
pub mod help;
pub mod test_runner;

use std::ffi::OsString;
use std::fmt;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::config::{Config, ConfigError};
use crate::engine::{Engine, EngineError, ProcessEngine};
use crate::version::HBS_VERSION;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    /// Create a new CLI error with a message and exit code.
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }

    /// Create an error with a custom exit code.
    pub fn with_code(message: impl Into<String>, code: i32) -> Self {
        Self::new(message, ExitCode(code))
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        match err {
            // The engine already explained itself on stderr; keep its exit code.
            EngineError::CommandFailed { code, ref stderr, .. } if !stderr.trim().is_empty() => {
                CliError::with_code(stderr.trim_end(), code.unwrap_or(ExitCode::FAILURE.0))
            }
            EngineError::CommandFailed { code, .. } => {
                let code = code.unwrap_or(ExitCode::FAILURE.0);
                CliError::with_code(render(err), code)
            }
            other => CliError::failure(render(other)),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        CliError::failure(render(err))
    }
}

fn render(diagnostic: impl miette::Diagnostic + Send + Sync + 'static) -> String {
    format!("{:?}", miette::Report::new(diagnostic))
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Command-line front end for the HBS hardware build system
#[derive(Parser, Debug)]
#[command(name = "hbs")]
#[command(version = HBS_VERSION)]
#[command(about = "Command-line front end for the HBS hardware build system", long_about = None)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Parse a command line. Every word after `test` is a pattern, including
    /// `-h`, `--help` and `--`, so `test` bypasses clap.
    pub fn try_parse_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        if args.get(1).is_some_and(|command| command == "test") {
            let args = args
                .iter()
                .skip(2)
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect();
            return Ok(Cli {
                command: Some(Command::Test { args }),
            });
        }
        Cli::try_parse_from(args)
    }
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Print help message
    Help {
        /// Command to describe
        #[arg(value_name = "COMMAND")]
        command: Option<String>,
    },

    /// Output dependency graph for given target
    DepGraph {
        #[arg(value_name = "TARGET_PATH")]
        target: String,
    },

    /// Dump info about cores in JSON format
    DumpCores,

    /// List cores found in .hbs files
    ListCores {
        /// Only list cores whose path contains one of these
        #[arg(value_name = "PATTERN", allow_hyphen_values = true)]
        patterns: Vec<String>,
    },

    /// List targets for given core
    ListTargets {
        #[arg(value_name = "CORE_PATH")]
        core: String,
    },

    /// Run given target
    Run {
        #[arg(value_name = "TARGET_PATH")]
        target: String,
    },

    /// Run testbenches matching given target path patterns
    #[command(disable_help_flag = true)]
    Test {
        /// [-workers N] [target-path-patterns...]
        #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = match Cli::try_parse_args(std::env::args_os()) {
        Ok(cli) => cli,
        Err(e) => {
            // --help / --version also arrive here, on stdout
            let _ = e.print();
            let code = if e.use_stderr() { ExitCode::FAILURE } else { ExitCode::SUCCESS };
            process::exit(code.0);
        }
    };

    match execute_blocking(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

fn execute_blocking(cli: Cli) -> CliResult<ExitCode> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::failure(format!("cannot start async runtime: {e}")))?;
    runtime.block_on(execute(cli))
}

/// Execute the parsed command line against the configured engine.
pub async fn execute(cli: Cli) -> CliResult<ExitCode> {
    let Some(command) = cli.command else {
        return Err(CliError::failure("missing command, check help"));
    };

    // help needs neither configuration nor the engine
    if let Command::Help { command } = &command {
        return commands::help(command.as_deref());
    }

    let config = Config::from_env()?;
    tracing::debug!(engine = %config.engine.display(), workers = config.workers.get(), "configuration loaded");
    let engine: Arc<dyn Engine> = Arc::new(ProcessEngine::new(&config.engine));

    dispatch(command, engine, &config).await
}

/// Route a command to its implementation.
pub async fn dispatch(command: Command, engine: Arc<dyn Engine>, config: &Config) -> CliResult<ExitCode> {
    match command {
        Command::Help { command } => commands::help(command.as_deref()),
        Command::DepGraph { target } => commands::dep_graph(engine.as_ref(), &target).await,
        Command::DumpCores => commands::dump_cores(engine.as_ref()).await,
        Command::ListCores { patterns } => commands::list_cores(engine.as_ref(), &patterns).await,
        Command::ListTargets { core } => commands::list_targets(engine.as_ref(), &core).await,
        Command::Run { target } => commands::run_target(engine.as_ref(), &target).await,
        Command::Test { args } => test_runner::run_tests(engine, config, &args).await,
    }
}

// ============================================================================
// Tests
// ============================================================================
