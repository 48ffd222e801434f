//! Subprocess-backed engine: every call is `<engine> <command> [arg]`.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;

use super::{Engine, EngineError, EngineResult, OutputMode, RunOutput};

/// Engine invoked as an external executable.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    program: PathBuf,
}

impl ProcessEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(&self.program);
        cmd.args(args).stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }

    fn unavailable(&self, source: std::io::Error) -> EngineError {
        EngineError::Unavailable {
            program: self.program.display().to_string(),
            source,
        }
    }

    /// Run an engine command to completion and return its stdout.
    async fn capture(&self, args: &[&str]) -> EngineResult<String> {
        tracing::debug!(engine = %self.program.display(), ?args, "invoking engine");

        let output = self
            .command(args)
            .output()
            .await
            .map_err(|e| self.unavailable(e))?;

        if !output.status.success() {
            return Err(EngineError::CommandFailed {
                command: args.join(" "),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn combined_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    match (stdout.is_empty(), stderr.is_empty()) {
        (_, true) => stdout.into_owned(),
        (true, false) => stderr.into_owned(),
        (false, false) => format!("{stdout}\n{stderr}"),
    }
}

#[async_trait]
impl Engine for ProcessEngine {
    async fn dump_cores(&self) -> EngineResult<String> {
        self.capture(&["dump-cores"]).await
    }

    async fn list_cores(&self) -> EngineResult<String> {
        self.capture(&["list-cores"]).await
    }

    async fn list_targets(&self, core: &str) -> EngineResult<String> {
        self.capture(&["list-targets", core]).await
    }

    async fn dep_graph(&self, target: &str) -> EngineResult<String> {
        self.capture(&["dep-graph", target]).await
    }

    async fn run_target(&self, target: &str, mode: OutputMode) -> EngineResult<RunOutput> {
        tracing::debug!(engine = %self.program.display(), target_path = target, ?mode, "running target");
        let start = Instant::now();
        let mut cmd = self.command(["run", target]);

        let (exit_code, output) = match mode {
            OutputMode::Capture => {
                let output = cmd.output().await.map_err(|e| self.unavailable(e))?;
                (output.status.code(), combined_output(&output))
            }
            OutputMode::Inherit => {
                let status = cmd
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit())
                    .status()
                    .await
                    .map_err(|e| self.unavailable(e))?;
                (status.code(), String::new())
            }
        };

        Ok(RunOutput {
            exit_code,
            output,
            duration: start.elapsed(),
        })
    }
}
