#![forbid(unsafe_code)]
//! HBS command-line front end
//!
//! `hbs` lists the cores and targets known to the HBS build engine, runs single
//! targets, and discovers and runs testbench targets in parallel. Parsing of
//! `.hbs` files, dependency resolution and target execution stay in the
//! external engine, which this crate drives as a subprocess.
//!
//! - [`metadata`] - engine `dump-cores` payload
//! - [`filter`] - testbench naming convention and pattern selection
//! - [`scheduler`] - bounded worker pool and session report
//! - [`engine`] - engine boundary and its subprocess implementation
//! - [`cli`] - command-line dispatch
//!
//! ## Panic Policy
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` module enforces
//!   `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.

pub mod cli;
pub mod config;
pub mod engine;
pub mod filter;
pub mod metadata;
pub mod scheduler;
pub mod version;

pub use config::Config;
pub use engine::{Engine, EngineError, OutputMode, ProcessEngine, RunOutput};
pub use filter::{TargetPath, is_test_target, select_tests};
pub use metadata::{Metadata, MetadataError};
pub use scheduler::{Scheduler, SchedulerConfig, SessionReport, SessionReporter, TestOutcome, TestRunResult};
