//! `hbs test`: testbench discovery and parallel execution
//!
//! ## Flow
//!
//! 1. Scan the raw arguments for a leading `-workers N`
//! 2. Load fresh metadata from the engine
//! 3. Select test targets by naming convention and patterns
//! 4. Run them through the [`Scheduler`]
//! 5. Report through a [`SessionReporter`] (console by default)
//!
//! ## Argument scan
//!
//! `-workers N` is only recognised as the first two arguments and only when
//! `N` is a positive integer. In every other position or form the words are
//! target path patterns like any other.

use std::fmt::Write as _;
use std::io::{self, IsTerminal};
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::config::Config;
use crate::engine::Engine;
use crate::filter::{TargetPath, select_tests};
use crate::scheduler::{
    Scheduler, SchedulerConfig, SessionReport, SessionReporter, TestOutcome, TestRunResult, format_summary,
};

use super::{CliError, CliResult, ExitCode};

pub const WORKERS_FLAG: &str = "-workers";

/// Parsed `test` arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestArgs {
    pub workers: Option<NonZeroUsize>,
    pub patterns: Vec<String>,
}

pub fn parse_test_args(args: &[String]) -> TestArgs {
    if let [flag, value, rest @ ..] = args {
        if flag == WORKERS_FLAG {
            if let Some(workers) = value.parse::<usize>().ok().and_then(NonZeroUsize::new) {
                return TestArgs {
                    workers: Some(workers),
                    patterns: rest.to_vec(),
                };
            }
        }
    }

    TestArgs {
        workers: None,
        patterns: args.to_vec(),
    }
}

// ============================================================================
// Console reporter
// ============================================================================

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Default console reporter.
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    pub color: bool,
}

impl ConsoleReporter {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.color {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }
}

impl SessionReporter for ConsoleReporter {
    fn on_session_start(&mut self, targets: &[TargetPath], workers: usize) {
        println!("{}", self.paint(BOLD, "=================== test session starts ==================="));
        if targets.is_empty() {
            println!("no test targets selected");
            return;
        }
        for target in targets {
            println!("  {target}");
        }
        println!("running {} targets with {} workers", targets.len(), workers);
        println!();
    }

    fn on_test_complete(&mut self, result: &TestRunResult) {
        let status = match &result.outcome {
            TestOutcome::Passed => self.paint(GREEN, "PASSED"),
            TestOutcome::Failed { .. } => self.paint(RED, "FAILED"),
            TestOutcome::Errored { .. } => self.paint(YELLOW, "ERROR"),
        };
        println!("{} {} ({}ms)", result.path, status, result.duration.as_millis());
    }

    fn on_session_complete(&mut self, report: &SessionReport) {
        if !report.is_success() {
            println!();
            println!("{}", self.paint(RED, "=================== FAILURES ==================="));
            println!();
            print!("{}", render_failures(report));
        }

        let color = if report.is_success() { GREEN } else { RED };
        println!();
        println!("{}", self.paint(color, &format!("=================== {} ===================", format_summary(report))));
    }
}

/// Failed and errored targets with their own captured output, in path order.
pub fn render_failures(report: &SessionReport) -> String {
    let mut out = String::new();
    for result in &report.results {
        let status = match &result.outcome {
            TestOutcome::Passed => continue,
            TestOutcome::Failed { exit_code: Some(code) } => format!("failed with exit code {code}"),
            TestOutcome::Failed { exit_code: None } => "terminated by signal".to_string(),
            TestOutcome::Errored { reason } => format!("errored: {reason}"),
        };
        let _ = writeln!(out, "___________ {} ___________", result.path);
        let _ = writeln!(out, "{status}");
        for line in result.output.lines() {
            let _ = writeln!(out, "    {line}");
        }
        out.push('\n');
    }
    out
}

// ============================================================================
// Command
// ============================================================================

/// Select and run a test session, reporting through `reporter`.
///
/// Metadata problems abort before anything is scheduled; target failures
/// only show up in the returned report.
pub async fn test_session(
    engine: Arc<dyn Engine>,
    config: &Config,
    args: &[String],
    reporter: &mut dyn SessionReporter,
) -> CliResult<SessionReport> {
    let TestArgs { workers, patterns } = parse_test_args(args);

    let metadata = engine.load_metadata().await?;
    let targets = select_tests(&metadata, &patterns);
    tracing::debug!(selected = targets.len(), ?patterns, "selected test targets");

    let scheduler_config = SchedulerConfig {
        workers: workers.unwrap_or(config.workers),
        ..SchedulerConfig::from(config)
    };
    let scheduler = Scheduler::new(engine, scheduler_config);
    Ok(scheduler.run_session(targets, reporter).await)
}

/// Run the `test` command with console output.
pub async fn run_tests(engine: Arc<dyn Engine>, config: &Config, args: &[String]) -> CliResult<ExitCode> {
    let mut reporter = ConsoleReporter::new(io::stdout().is_terminal());
    let report = test_session(engine, config, args, &mut reporter).await?;

    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        // Failures already printed by the reporter
        Err(CliError::new("", ExitCode::FAILURE))
    }
}
