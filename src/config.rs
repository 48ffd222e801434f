//! Runtime configuration for `hbs`
//!
//! Built once at startup and passed explicitly to the commands that need it.
//!
//! | setting          | environment          | default                                      |
//! |------------------|----------------------|----------------------------------------------|
//! | engine           | `HBS_ENGINE`         | `hbs.tcl` beside the executable, else `PATH` |
//! | workers          | (`test -workers N`)  | number of available CPUs                     |
//! | target timeout   | `HBS_TARGET_TIMEOUT` | none                                         |

use std::env;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

/// Environment variable naming the engine executable.
pub const ENGINE_ENV: &str = "HBS_ENGINE";
/// Environment variable holding the per-target timeout in seconds.
pub const TARGET_TIMEOUT_ENV: &str = "HBS_TARGET_TIMEOUT";
/// Engine executable looked up when `HBS_ENGINE` is unset.
pub const DEFAULT_ENGINE: &str = "hbs.tcl";

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("invalid {name} value '{value}': expected a positive number of seconds")]
    #[diagnostic(code(hbs::config::invalid_timeout))]
    InvalidTimeout { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Engine executable.
    pub engine: PathBuf,
    /// Default worker count for test sessions.
    pub workers: NonZeroUsize,
    /// Per-target limit for test runs; `None` waits indefinitely.
    pub target_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: find_engine(),
            workers: default_workers(),
            target_timeout: None,
        }
    }
}

impl Config {
    /// Defaults overlaid with `HBS_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(engine) = env::var_os(ENGINE_ENV).filter(|v| !v.is_empty()) {
            config.engine = PathBuf::from(engine);
        }
        if let Ok(value) = env::var(TARGET_TIMEOUT_ENV) {
            config.target_timeout = Some(parse_timeout(TARGET_TIMEOUT_ENV, &value)?);
        }

        Ok(config)
    }

    pub fn with_engine(mut self, engine: impl Into<PathBuf>) -> Self {
        self.engine = engine.into();
        self
    }

    pub fn with_workers(mut self, workers: NonZeroUsize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_target_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.target_timeout = timeout;
        self
    }
}

/// Locate the engine: `hbs.tcl` in the directory of the running executable,
/// otherwise the bare name so the OS resolves it through `PATH`.
pub fn find_engine() -> PathBuf {
    if let Ok(exe_path) = env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let engine = exe_dir.join(DEFAULT_ENGINE);
            if engine.is_file() {
                return engine;
            }
        }
    }
    PathBuf::from(DEFAULT_ENGINE)
}

/// Number of available processing units, 1 if it cannot be determined.
pub fn default_workers() -> NonZeroUsize {
    std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
}

fn parse_timeout(name: &'static str, value: &str) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidTimeout {
            name,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_workers_is_positive() {
        assert!(default_workers().get() >= 1);
    }

    #[test]
    fn test_default_has_no_timeout() {
        assert_eq!(Config::default().target_timeout, None);
    }

    #[test]
    fn test_builder_setters() {
        let config = Config::default()
            .with_engine("/opt/hbs/hbs.tcl")
            .with_workers(NonZeroUsize::new(3).unwrap())
            .with_target_timeout(Some(Duration::from_secs(30)));
        assert_eq!(config.engine, PathBuf::from("/opt/hbs/hbs.tcl"));
        assert_eq!(config.workers.get(), 3);
        assert_eq!(config.target_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_parse_timeout() {
        assert_eq!(parse_timeout(TARGET_TIMEOUT_ENV, "90").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_timeout(TARGET_TIMEOUT_ENV, " 5 ").unwrap(), Duration::from_secs(5));
        for bad in ["0", "-1", "1.5", "", "soon"] {
            assert!(parse_timeout(TARGET_TIMEOUT_ENV, bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_invalid_timeout_message() {
        let err = parse_timeout(TARGET_TIMEOUT_ENV, "soon").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid HBS_TARGET_TIMEOUT value 'soon': expected a positive number of seconds"
        );
    }
}
