//! Parallel testbench scheduler
//!
//! A session runs every selected target path through the engine's `run`
//! command using a bounded pool of workers:
//!
//! - the queue holds target paths in the (sorted) order the filter produced;
//! - each worker pops the next path when idle and waits for the engine;
//! - workers send start/finish events to the coordinator over a channel, so
//!   reporter hooks and result bookkeeping happen on a single task;
//! - a failing target never stops the session, every queued target is tried.
//!
//! The final [`SessionReport`] is sorted by target path, independent of the
//! order in which workers finished.

use std::collections::{HashSet, VecDeque};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;

use crate::config::Config;
use crate::engine::{Engine, OutputMode};
use crate::filter::TargetPath;

/// Reason recorded for targets left without a result after a worker panic.
pub const WORKER_PANICKED: &str = "worker panicked";

// ============================================================================
// Results
// ============================================================================

/// How a single target run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOutcome {
    /// Engine exited with status 0.
    Passed,
    /// Engine exited non-zero (`None` when killed by a signal).
    Failed { exit_code: Option<i32> },
    /// The target could not be run at all, or timed out.
    Errored { reason: String },
}

/// Result of running one test target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRunResult {
    pub path: TargetPath,
    pub outcome: TestOutcome,
    /// Captured engine output for this target only.
    pub output: String,
    pub duration: Duration,
}

impl TestRunResult {
    fn errored(path: TargetPath, reason: impl Into<String>, duration: Duration) -> Self {
        Self {
            path,
            outcome: TestOutcome::Errored { reason: reason.into() },
            output: String::new(),
            duration,
        }
    }

    pub fn is_passed(&self) -> bool {
        self.outcome == TestOutcome::Passed
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, TestOutcome::Failed { .. })
    }

    pub fn is_errored(&self) -> bool {
        matches!(self.outcome, TestOutcome::Errored { .. })
    }
}

/// Aggregated outcome of a test session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionReport {
    /// One entry per selected target, sorted by target path.
    pub results: Vec<TestRunResult>,
    /// Number of workers actually started.
    pub workers: usize,
    /// Wall-clock time of the whole session.
    pub duration: Duration,
}

impl SessionReport {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.is_passed()).count()
    }

    pub fn failed(&self) -> Vec<&TestRunResult> {
        self.results.iter().filter(|r| r.is_failed()).collect()
    }

    pub fn errored(&self) -> Vec<&TestRunResult> {
        self.results.iter().filter(|r| r.is_errored()).collect()
    }

    /// True when nothing failed or errored (an empty session succeeds).
    pub fn is_success(&self) -> bool {
        self.results.iter().all(TestRunResult::is_passed)
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }
}

/// Uncoloured one-line summary, e.g. `3 attempted: 2 passed, 1 failed in 1.50s`.
pub fn format_summary(report: &SessionReport) -> String {
    let secs = report.duration.as_secs_f64();
    if report.total() == 0 {
        return format!("no test targets selected in {secs:.2}s");
    }

    let mut parts = Vec::new();
    let passed = report.passed();
    let failed = report.failed().len();
    let errored = report.errored().len();
    if passed > 0 {
        parts.push(format!("{passed} passed"));
    }
    if failed > 0 {
        parts.push(format!("{failed} failed"));
    }
    if errored > 0 {
        parts.push(format!("{errored} errored"));
    }

    format!("{} attempted: {} in {secs:.2}s", report.total(), parts.join(", "))
}

// ============================================================================
// Reporter
// ============================================================================

/// Hooks for presenting session progress.
///
/// All hooks are called from the coordinating task, never concurrently.
pub trait SessionReporter {
    /// Called once before any target starts.
    fn on_session_start(&mut self, _targets: &[TargetPath], _workers: usize) {}

    /// Called when a worker picks up a target.
    fn on_test_start(&mut self, _path: &str) {}

    /// Called when a target finishes, in completion order.
    fn on_test_complete(&mut self, result: &TestRunResult);

    /// Called once with the final, sorted report.
    fn on_session_complete(&mut self, report: &SessionReport);
}

/// Reporter that prints nothing.
#[derive(Debug, Default)]
pub struct SilentReporter;

impl SessionReporter for SilentReporter {
    fn on_test_complete(&mut self, _result: &TestRunResult) {}

    fn on_session_complete(&mut self, _report: &SessionReport) {}
}

// ============================================================================
// Scheduler
// ============================================================================

/// Session parameters, fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub workers: NonZeroUsize,
    pub target_timeout: Option<Duration>,
}

impl SchedulerConfig {
    pub fn new(workers: NonZeroUsize) -> Self {
        Self {
            workers,
            target_timeout: None,
        }
    }

    pub fn with_target_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.target_timeout = timeout;
        self
    }
}

impl From<&Config> for SchedulerConfig {
    fn from(config: &Config) -> Self {
        Self {
            workers: config.workers,
            target_timeout: config.target_timeout,
        }
    }
}

enum WorkerEvent {
    Started(TargetPath),
    Finished(TestRunResult),
}

type WorkQueue = Arc<Mutex<VecDeque<TargetPath>>>;

pub struct Scheduler {
    engine: Arc<dyn Engine>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(engine: Arc<dyn Engine>, config: SchedulerConfig) -> Self {
        Self { engine, config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Workers needed for `targets` targets: never more than there is work for.
    pub fn worker_count(&self, targets: usize) -> usize {
        self.config.workers.get().min(targets)
    }

    /// Run every target once and aggregate the outcomes.
    #[tracing::instrument(skip_all, fields(targets = targets.len(), workers = self.config.workers.get()))]
    pub async fn run_session(&self, targets: Vec<TargetPath>, reporter: &mut dyn SessionReporter) -> SessionReport {
        let start = Instant::now();
        let workers = self.worker_count(targets.len());
        reporter.on_session_start(&targets, workers);

        let queue: WorkQueue = Arc::new(Mutex::new(targets.iter().cloned().collect()));
        let (events, mut inbox) = mpsc::unbounded_channel();

        let mut pool = JoinSet::new();
        for _ in 0..workers {
            pool.spawn(worker(
                Arc::clone(&queue),
                Arc::clone(&self.engine),
                self.config.target_timeout,
                events.clone(),
            ));
        }
        // Inbox closes once the last worker drops its sender.
        drop(events);

        let mut results = Vec::with_capacity(targets.len());
        while let Some(event) = inbox.recv().await {
            match event {
                WorkerEvent::Started(path) => reporter.on_test_start(&path),
                WorkerEvent::Finished(result) => {
                    reporter.on_test_complete(&result);
                    results.push(result);
                }
            }
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "test worker terminated abnormally");
            }
        }

        let missing: Vec<TargetPath> = {
            let reported: HashSet<&str> = results.iter().map(|r| r.path.as_str()).collect();
            targets
                .iter()
                .filter(|path| !reported.contains(path.as_str()))
                .cloned()
                .collect()
        };
        for path in missing {
            let result = TestRunResult::errored(path, WORKER_PANICKED, Duration::ZERO);
            reporter.on_test_complete(&result);
            results.push(result);
        }

        results.sort_by(|a, b| a.path.cmp(&b.path));
        let report = SessionReport {
            results,
            workers,
            duration: start.elapsed(),
        };
        tracing::info!(
            total = report.total(),
            passed = report.passed(),
            duration_ms = report.duration.as_millis() as u64,
            "test session finished"
        );
        reporter.on_session_complete(&report);
        report
    }
}

async fn worker(
    queue: WorkQueue,
    engine: Arc<dyn Engine>,
    timeout: Option<Duration>,
    events: mpsc::UnboundedSender<WorkerEvent>,
) {
    loop {
        let Some(path) = queue.lock().await.pop_front() else {
            break;
        };
        let _ = events.send(WorkerEvent::Started(path.clone()));
        let result = run_one(engine.as_ref(), path, timeout).await;
        let _ = events.send(WorkerEvent::Finished(result));
    }
}

/// Run a single target and classify the outcome.
pub async fn run_one(engine: &dyn Engine, path: TargetPath, timeout: Option<Duration>) -> TestRunResult {
    let start = Instant::now();

    let attempt = match timeout {
        Some(limit) => match tokio::time::timeout(limit, engine.run_target(&path, OutputMode::Capture)).await {
            Ok(attempt) => attempt,
            Err(_) => {
                tracing::warn!(target_path = %path, limit_secs = limit.as_secs_f64(), "target timed out");
                return TestRunResult::errored(
                    path,
                    format!("timed out after {:.1}s", limit.as_secs_f64()),
                    start.elapsed(),
                );
            }
        },
        None => engine.run_target(&path, OutputMode::Capture).await,
    };

    let result = match attempt {
        Ok(run) => {
            let outcome = if run.success() {
                TestOutcome::Passed
            } else {
                TestOutcome::Failed {
                    exit_code: run.exit_code,
                }
            };
            TestRunResult {
                path,
                outcome,
                output: run.output,
                duration: run.duration,
            }
        }
        Err(e) => TestRunResult::errored(path, e.to_string(), start.elapsed()),
    };

    tracing::debug!(
        target_path = %result.path,
        outcome = ?result.outcome,
        duration_ms = result.duration.as_millis() as u64,
        "target finished"
    );
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::engine::{EngineResult, RunOutput};

    /// Sleeps for `delay` per run and records the peak number of concurrent runs.
    #[derive(Default)]
    struct SlowEngine {
        delay: Duration,
        panic_on: Option<&'static str>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Engine for SlowEngine {
        async fn dump_cores(&self) -> EngineResult<String> {
            Ok("{}".to_string())
        }

        async fn list_cores(&self) -> EngineResult<String> {
            Ok(String::new())
        }

        async fn list_targets(&self, _core: &str) -> EngineResult<String> {
            Ok(String::new())
        }

        async fn dep_graph(&self, _target: &str) -> EngineResult<String> {
            Ok(String::new())
        }

        async fn run_target(&self, target: &str, _mode: OutputMode) -> EngineResult<RunOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.panic_on == Some(target) {
                panic!("engine crashed on {target}");
            }
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(RunOutput {
                exit_code: Some(0),
                output: format!("ran {target}"),
                duration: self.delay,
            })
        }
    }

    fn paths(names: &[&str]) -> Vec<TargetPath> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn workers(n: usize) -> SchedulerConfig {
        SchedulerConfig::new(NonZeroUsize::new(n).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_pool_is_bounded() {
        let engine = Arc::new(SlowEngine {
            delay: Duration::from_millis(50),
            ..Default::default()
        });
        let scheduler = Scheduler::new(engine.clone(), workers(2));
        let targets = paths(&["c::tb_1", "c::tb_2", "c::tb_3", "c::tb_4", "c::tb_5"]);

        let report = scheduler.run_session(targets, &mut SilentReporter).await;

        assert_eq!(report.total(), 5);
        assert_eq!(report.workers, 2);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 5);
        assert_eq!(engine.peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_workers_capped_by_target_count() {
        let engine = Arc::new(SlowEngine::default());
        let scheduler = Scheduler::new(engine, workers(16));
        let report = scheduler.run_session(paths(&["a::tb", "b::tb"]), &mut SilentReporter).await;
        assert_eq!(report.workers, 2);
        assert!(report.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_marks_target_errored() {
        let engine = Arc::new(SlowEngine {
            delay: Duration::from_secs(60),
            ..Default::default()
        });
        let config = workers(2).with_target_timeout(Some(Duration::from_secs(5)));
        let scheduler = Scheduler::new(engine, config);

        let report = scheduler.run_session(paths(&["a::tb", "b::tb"]), &mut SilentReporter).await;

        assert_eq!(report.errored().len(), 2);
        for result in &report.results {
            assert_eq!(
                result.outcome,
                TestOutcome::Errored {
                    reason: "timed out after 5.0s".to_string()
                }
            );
        }
        assert_eq!(report.exit_code(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_worker_does_not_lose_targets() {
        let engine = Arc::new(SlowEngine {
            delay: Duration::from_millis(10),
            panic_on: Some("a::tb"),
            ..Default::default()
        });
        let scheduler = Scheduler::new(engine, workers(2));

        let report = scheduler
            .run_session(paths(&["a::tb", "b::tb", "c::tb"]), &mut SilentReporter)
            .await;

        assert_eq!(report.total(), 3);
        assert_eq!(report.results[0].path, "a::tb");
        assert_eq!(
            report.results[0].outcome,
            TestOutcome::Errored {
                reason: WORKER_PANICKED.to_string()
            }
        );
        assert!(report.results[1].is_passed());
        assert!(report.results[2].is_passed());
    }

    #[test]
    fn test_summary_formatting() {
        let result = |path: &str, outcome: TestOutcome| TestRunResult {
            path: path.to_string(),
            outcome,
            output: String::new(),
            duration: Duration::ZERO,
        };
        let report = SessionReport {
            results: vec![
                result("p::a::tb", TestOutcome::Passed),
                result("p::b::tb", TestOutcome::Failed { exit_code: Some(1) }),
                result("p::c::tb", TestOutcome::Passed),
            ],
            workers: 2,
            duration: Duration::from_millis(1500),
        };
        insta::assert_snapshot!(format_summary(&report), @"3 attempted: 2 passed, 1 failed in 1.50s");

        let empty = SessionReport::default();
        insta::assert_snapshot!(format_summary(&empty), @"no test targets selected in 0.00s");
    }
}
