//! Shared test fixtures: an in-memory engine with scripted outcomes.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use hbs::engine::{Engine, EngineError, EngineResult, OutputMode, RunOutput};
use hbs::scheduler::{SessionReport, SessionReporter, TestRunResult};

/// Fake engine: serves a fixed dump and answers `run` from a script.
#[derive(Default)]
pub struct FakeEngine {
    dump: String,
    cores: String,
    exit_codes: HashMap<String, i32>,
    killed: Vec<String>,
    unavailable: Vec<String>,
    runs: Mutex<Vec<String>>,
    calls: Mutex<Vec<String>>,
}

impl FakeEngine {
    pub fn with_dump(dump: &str) -> Self {
        Self {
            dump: dump.to_string(),
            ..Default::default()
        }
    }

    /// Make `target` exit with `code` (default is 0).
    pub fn exit_code(mut self, target: &str, code: i32) -> Self {
        self.exit_codes.insert(target.to_string(), code);
        self
    }

    /// `list-cores` output.
    pub fn with_cores(mut self, listing: &str) -> Self {
        self.cores = listing.to_string();
        self
    }

    /// Make `target` end without an exit code, as if killed by a signal.
    pub fn killed(mut self, target: &str) -> Self {
        self.killed.push(target.to_string());
        self
    }

    /// Make `target` fail to start.
    pub fn unavailable(mut self, target: &str) -> Self {
        self.unavailable.push(target.to_string());
        self
    }

    /// Targets passed to `run`, in invocation order.
    pub fn runs(&self) -> Vec<String> {
        self.runs.lock().unwrap().clone()
    }

    /// Listing commands received, e.g. `list-targets lib::fifo`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Engine for FakeEngine {
    async fn dump_cores(&self) -> EngineResult<String> {
        self.record("dump-cores".to_string());
        Ok(self.dump.clone())
    }

    async fn list_cores(&self) -> EngineResult<String> {
        self.record("list-cores".to_string());
        Ok(self.cores.clone())
    }

    async fn list_targets(&self, core: &str) -> EngineResult<String> {
        self.record(format!("list-targets {core}"));
        Ok(String::new())
    }

    async fn dep_graph(&self, target: &str) -> EngineResult<String> {
        self.record(format!("dep-graph {target}"));
        Ok(String::new())
    }

    async fn run_target(&self, target: &str, _mode: OutputMode) -> EngineResult<RunOutput> {
        self.runs.lock().unwrap().push(target.to_string());
        tokio::task::yield_now().await;

        if self.unavailable.iter().any(|t| t == target) {
            return Err(EngineError::Unavailable {
                program: "fake-engine".to_string(),
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            });
        }

        if self.killed.iter().any(|t| t == target) {
            return Ok(RunOutput {
                exit_code: None,
                output: String::new(),
                duration: Duration::from_millis(1),
            });
        }

        let code = self.exit_codes.get(target).copied().unwrap_or(0);
        Ok(RunOutput {
            exit_code: Some(code),
            output: format!("{target}: exit {code}"),
            duration: Duration::from_millis(1),
        })
    }
}

/// Reporter that records every hook call.
#[derive(Default)]
pub struct RecordingReporter {
    pub started_with: Option<(Vec<String>, usize)>,
    pub started: Vec<String>,
    pub completed: Vec<String>,
    pub finished: Option<SessionReport>,
}

impl SessionReporter for RecordingReporter {
    fn on_session_start(&mut self, targets: &[String], workers: usize) {
        self.started_with = Some((targets.to_vec(), workers));
    }

    fn on_test_start(&mut self, path: &str) {
        self.started.push(path.to_string());
    }

    fn on_test_complete(&mut self, result: &TestRunResult) {
        self.completed.push(result.path.clone());
    }

    fn on_session_complete(&mut self, report: &SessionReport) {
        self.finished = Some(report.clone());
    }
}

pub const SCENARIO_DUMP: &str = r#"{"proj::a": {"targets": ["tb_x", "build"]}, "proj::b": {"targets": ["y_tb"]}}"#;

pub const THREE_TESTS_DUMP: &str =
    r#"{"soc::top": {"targets": ["tb_2", "bitstream", "tb_1"]}, "lib::fifo": {"targets": ["tb", "synth"]}}"#;
