//! Help texts for `hbs help [command]`

pub const HELP_HELP: &str = "Usage:

  hbs <command> [arguments]

The command is one of:

  help          Print help message
  dep-graph     Output dependency graph for given target
  dump-cores    Dump info about cores in JSON format
  list-cores    List cores found in .hbs files
  list-targets  List targets for given core
  run           Run given target
  test          Run testbenches matching given target path patterns

Type 'hbs help <command>' to obtain more information about particular command.";

pub const DEP_GRAPH_HELP: &str = "Usage:

  hbs dep-graph <target-path>

Output the dependency graph of the provided target.
The target path must be absolute target path containing
the core path and target name.";

pub const DUMP_CORES_HELP: &str = "Usage:

  hbs dump-cores

Dump info about cores found in the .hbs files in JSON format.
The info is dumped to the stdout. A user can redirect to a file on his own.";

pub const LIST_CORES_HELP: &str = "Usage:

  hbs list-cores [core-path-patterns...]

List cores found in .hbs files.
If core path patterns are not provided, all cores are listed.
If core path patterns are provided, only cores whose paths contain
at least one pattern are listed.";

pub const LIST_TARGETS_HELP: &str = "Usage:

  hbs list-targets <core-path>

List targets of the provided core.
Exactly one core path must be provided.";

pub const RUN_HELP: &str = "Usage:

  hbs run <target-path>

Run provided target. The target path must be absolute target path containing
the core path and target name.

Example:

  hbs run your::core::path::target-name";

pub const TEST_HELP: &str = "Usage:

  hbs test [-workers N] [target-path-patterns...]

Run test targets. Test targets are detected automatically.
A test target is a target which name:
  - starts with \"tb-\" or \"tb_\",
  - ends with \"-tb\" or \"_tb\",
  - equals \"tb\".

-workers specifies the number of targets to run simultaneously (in parallel).
N must be a positive integer. -workers must be provided before target path patterns.
Otherwise, it will be treated as one of the target path patterns.
By default the number of workers equals the number of available CPUs.

If target path patterns are not provided, all test targets are run.
If target path patterns are provided, only targets whose paths contain
at least one pattern are run.

Set HBS_TARGET_TIMEOUT to a number of seconds to mark targets running
longer than that as errored.";

/// Help text for a topic; `None` (or `help`) gives the overview.
pub fn help_text(topic: Option<&str>) -> Option<&'static str> {
    match topic.unwrap_or("") {
        "" | "help" => Some(HELP_HELP),
        "dep-graph" => Some(DEP_GRAPH_HELP),
        "dump-cores" => Some(DUMP_CORES_HELP),
        "list-cores" => Some(LIST_CORES_HELP),
        "list-targets" => Some(LIST_TARGETS_HELP),
        "run" => Some(RUN_HELP),
        "test" => Some(TEST_HELP),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overview_for_no_topic() {
        assert_eq!(help_text(None), Some(HELP_HELP));
        assert_eq!(help_text(Some("help")), Some(HELP_HELP));
    }

    #[test]
    fn test_every_listed_command_has_help() {
        for command in ["dep-graph", "dump-cores", "list-cores", "list-targets", "run", "test"] {
            let text = help_text(Some(command)).unwrap_or_default();
            assert!(text.contains(&format!("hbs {command}")), "missing help for {command}");
            assert!(HELP_HELP.contains(command));
        }
    }

    #[test]
    fn test_unknown_topic() {
        assert_eq!(help_text(Some("build")), None);
        assert_eq!(help_text(Some("TEST")), None);
    }
}
