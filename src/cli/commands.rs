//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use crate::engine::{Engine, OutputMode};
use crate::filter::{PATH_SEPARATOR, select_lines};

use super::help::help_text;
use super::{CliError, CliResult, ExitCode};

/// Print the help text for `topic`.
pub fn help(topic: Option<&str>) -> CliResult<ExitCode> {
    match help_text(topic) {
        Some(text) => {
            println!("{text}");
            Ok(ExitCode::SUCCESS)
        }
        None => Err(CliError::failure(format!(
            "invalid command '{}', check help",
            topic.unwrap_or_default()
        ))),
    }
}

/// Print the engine's metadata dump verbatim.
pub async fn dump_cores(engine: &dyn Engine) -> CliResult<ExitCode> {
    let dump = engine.dump_cores().await?;
    print!("{dump}");
    Ok(ExitCode::SUCCESS)
}

/// Print core paths, keeping only lines that contain one of `patterns`.
pub async fn list_cores(engine: &dyn Engine, patterns: &[String]) -> CliResult<ExitCode> {
    let listing = engine.list_cores().await?;
    print!("{}", filter_listing(&listing, patterns));
    Ok(ExitCode::SUCCESS)
}

/// The listing unchanged without patterns, otherwise its matching lines.
pub fn filter_listing(listing: &str, patterns: &[String]) -> String {
    if patterns.is_empty() {
        return listing.to_string();
    }
    select_lines(listing, patterns)
        .into_iter()
        .map(|line| format!("{line}\n"))
        .collect()
}

pub async fn list_targets(engine: &dyn Engine, core: &str) -> CliResult<ExitCode> {
    let listing = engine.list_targets(core).await?;
    print!("{listing}");
    Ok(ExitCode::SUCCESS)
}

pub async fn dep_graph(engine: &dyn Engine, target: &str) -> CliResult<ExitCode> {
    require_target_path("dep-graph", target)?;
    let graph = engine.dep_graph(target).await?;
    print!("{graph}");
    Ok(ExitCode::SUCCESS)
}

/// Run one target with its output attached to the terminal; the exit code is the target's.
pub async fn run_target(engine: &dyn Engine, target: &str) -> CliResult<ExitCode> {
    require_target_path("run", target)?;
    let run = engine.run_target(target, OutputMode::Inherit).await?;
    tracing::debug!(target_path = target, exit_code = ?run.exit_code, "target finished");
    Ok(ExitCode(run.exit_code.unwrap_or(ExitCode::FAILURE.0)))
}

/// Absolute target paths always contain the core path and a target name.
fn require_target_path(command: &str, target: &str) -> CliResult<()> {
    let valid = target
        .rsplit_once(PATH_SEPARATOR)
        .is_some_and(|(core, name)| !core.is_empty() && !name.is_empty());
    if valid {
        Ok(())
    } else {
        Err(CliError::failure(format!(
            "{command} command requires absolute target path (core::path::target-name), got '{target}'"
        )))
    }
}
