//! Core/target metadata as reported by the engine's `dump-cores` command.
//!
//! The dump is a JSON object mapping each absolute core path to an object
//! with (at least) a `targets` array:
//!
//! ```json
//! {
//!   "proj::a": { "targets": ["tb_x", "build"] },
//!   "proj::b": { "targets": ["y_tb"] }
//! }
//! ```
//!
//! Any other per-core fields are ignored. Metadata is never cached; every
//! command that needs it asks the engine for a fresh dump.

use std::collections::{BTreeMap, HashSet};

use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;

use crate::filter::{TargetPath, target_path};

/// Absolute, `::`-separated core path (e.g. `a::b::c`).
pub type CorePath = String;

/// Errors raised when the engine's dump does not have the expected shape.
#[derive(Debug, Error, Diagnostic)]
pub enum MetadataError {
    #[error("malformed core metadata: {0}")]
    #[diagnostic(
        code(hbs::metadata::malformed),
        help("expected a JSON object mapping core paths to {{ \"targets\": [name, ...] }}")
    )]
    InvalidJson(#[from] serde_json::Error),

    #[error("malformed core metadata: target '{target}' listed more than once in core '{core}'")]
    #[diagnostic(code(hbs::metadata::duplicate_target))]
    DuplicateTarget { core: CorePath, target: String },

    #[error("malformed core metadata: target path '{path}' is produced by more than one core")]
    #[diagnostic(code(hbs::metadata::duplicate_target_path))]
    DuplicateTargetPath { path: TargetPath },
}

/// Per-core information from the dump.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CoreInfo {
    pub targets: Vec<String>,
}

/// Snapshot of every core and its targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Metadata {
    cores: BTreeMap<CorePath, CoreInfo>,
}

impl Metadata {
    /// Parse and validate a `dump-cores` payload.
    pub fn parse(json: &str) -> Result<Self, MetadataError> {
        let metadata: Metadata = serde_json::from_str(json)?;
        metadata.validate()?;
        Ok(metadata)
    }

    /// Target paths must be globally unique. Core paths may themselves contain
    /// `::`, so `a` + `tb_x::y_tb` and `a::tb_x` + `y_tb` collide.
    fn validate(&self) -> Result<(), MetadataError> {
        let mut paths = HashSet::new();
        for (core, info) in &self.cores {
            let mut seen = HashSet::with_capacity(info.targets.len());
            for target in &info.targets {
                if !seen.insert(target.as_str()) {
                    return Err(MetadataError::DuplicateTarget {
                        core: core.clone(),
                        target: target.clone(),
                    });
                }
                let path = target_path(core, target);
                if paths.contains(&path) {
                    return Err(MetadataError::DuplicateTargetPath { path });
                }
                paths.insert(path);
            }
        }
        Ok(())
    }

    /// Iterate cores in core-path order.
    pub fn cores(&self) -> impl Iterator<Item = (&str, &CoreInfo)> {
        self.cores.iter().map(|(path, info)| (path.as_str(), info))
    }

    /// Target names of one core, if the core exists.
    pub fn targets(&self, core: &str) -> Option<&[String]> {
        self.cores.get(core).map(|info| info.targets.as_slice())
    }

    pub fn len(&self) -> usize {
        self.cores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cores.is_empty()
    }
}

impl FromIterator<(CorePath, Vec<String>)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (CorePath, Vec<String>)>>(iter: I) -> Self {
        Self {
            cores: iter
                .into_iter()
                .map(|(core, targets)| (core, CoreInfo { targets }))
                .collect(),
        }
    }
}
