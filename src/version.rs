//! hbs version information.
//!
//! Taken from Cargo metadata (`CARGO_PKG_VERSION`) at compile time so the
//! CLI `--version` output and any log lines agree on one value.

/// The hbs version string (for example, `0.1.0`).
pub const HBS_VERSION: &str = env!("CARGO_PKG_VERSION");
