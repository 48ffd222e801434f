//! Test target selection.
//!
//! A target is a testbench when its name is `tb`, starts with `tb_`/`tb-`, or
//! ends with `_tb`/`-tb`. Selection by patterns is plain case-sensitive
//! substring matching against the full target path; an empty pattern list
//! selects everything.

use crate::metadata::Metadata;

/// Fully qualified `core::path::target` identifier.
pub type TargetPath = String;

/// Separator between the core path and the target name.
pub const PATH_SEPARATOR: &str = "::";

/// Whether a target name follows the testbench naming convention.
pub fn is_test_target(name: &str) -> bool {
    name == "tb"
        || name.starts_with("tb_")
        || name.starts_with("tb-")
        || name.ends_with("_tb")
        || name.ends_with("-tb")
}

/// True if `haystack` contains at least one pattern, or `patterns` is empty.
pub fn matches_any<S: AsRef<str>>(haystack: &str, patterns: &[S]) -> bool {
    patterns.is_empty() || patterns.iter().any(|p| haystack.contains(p.as_ref()))
}

pub fn target_path(core: &str, target: &str) -> TargetPath {
    format!("{core}{PATH_SEPARATOR}{target}")
}

/// Select the test targets whose path matches `patterns`, sorted by path.
pub fn select_tests<S: AsRef<str>>(metadata: &Metadata, patterns: &[S]) -> Vec<TargetPath> {
    let mut selected: Vec<TargetPath> = metadata
        .cores()
        .flat_map(|(core, info)| {
            info.targets
                .iter()
                .filter(|name| is_test_target(name))
                .map(move |name| target_path(core, name))
        })
        .filter(|path| matches_any(path, patterns))
        .collect();

    selected.sort();
    selected
}

/// Lines of `text` matching `patterns` (used for engine listings).
pub fn select_lines<'a, S: AsRef<str>>(text: &'a str, patterns: &[S]) -> Vec<&'a str> {
    text.lines().filter(|line| matches_any(line, patterns)).collect()
}
