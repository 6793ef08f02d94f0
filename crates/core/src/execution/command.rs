//! Command-line construction for a task invocation.

use std::path::Path;

use crate::catalog::Task;
use crate::error::CoreError;
use crate::parameters::{parse_bool, BoundParameters};

/// Token in a task's executable replaced by the input file path.
pub const INPUT_PLACEHOLDER: &str = "$INPUT";

/// A program and its arguments, ready to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

/// Build the argument vector for `task`.
///
/// The executable template is split on whitespace with `$INPUT` substituted,
/// then each of the task's parameters that has a bound value is appended in
/// declaration order: `flag value`, or just `flag` for a truthy bool-valued
/// parameter. A parameter with an empty flag contributes only its value.
pub fn build_command_line(
    task: &Task,
    parameters: &BoundParameters,
    input_path: &Path,
) -> Result<CommandLine, CoreError> {
    let input = input_path.to_string_lossy();
    let mut tokens = task
        .executable
        .split_whitespace()
        .map(|t| t.replace(INPUT_PLACEHOLDER, &input));

    let program = tokens.next().ok_or_else(|| {
        CoreError::Internal(format!("Task '{}' has an empty executable", task.name))
    })?;
    let mut args: Vec<String> = tokens.collect();

    for param in &task.parameters {
        let Some(value) = parameters.get(&task.name, &param.rest_alias) else {
            continue;
        };
        if param.bool_valued {
            if parse_bool(value).unwrap_or(false) && !param.flag.is_empty() {
                args.push(param.flag.clone());
            }
            continue;
        }
        if !param.flag.is_empty() {
            args.push(param.flag.clone());
        }
        args.push(value.to_string());
    }

    Ok(CommandLine { program, args })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::catalog::fixtures::task;
    use crate::parameters::ParameterKey;

    fn bound(pairs: &[(&str, &str, &str)]) -> BoundParameters {
        pairs
            .iter()
            .map(|(t, a, v)| (ParameterKey::new(*t, *a), v.to_string()))
            .collect::<BTreeMap<_, _>>()
            .into()
    }

    #[test]
    fn substitutes_input_and_appends_flags() {
        let mut t = task(1, "task1", &["this", "that"]);
        t.executable = "python3 run.py --in $INPUT".into();
        let cmd = build_command_line(
            &t,
            &bound(&[("task1", "this", "1"), ("task1", "that", "x")]),
            Path::new("/work/input.txt"),
        )
        .expect("build");
        assert_eq!(cmd.program, "python3");
        assert_eq!(
            cmd.args,
            ["run.py", "--in", "/work/input.txt", "--this", "1", "--that", "x"]
        );
    }

    #[test]
    fn other_tasks_bindings_are_not_used() {
        let t = task(1, "task1", &["this"]);
        let cmd = build_command_line(
            &t,
            &bound(&[("task2", "this", "nope")]),
            Path::new("in"),
        )
        .expect("build");
        assert!(cmd.args.is_empty());
    }

    #[test]
    fn bool_valued_emits_flag_only_when_truthy() {
        let mut t = task(1, "task1", &["verbose", "quiet"]);
        t.parameters[0].bool_valued = true;
        t.parameters[1].bool_valued = true;
        let cmd = build_command_line(
            &t,
            &bound(&[("task1", "verbose", "true"), ("task1", "quiet", "false")]),
            Path::new("in"),
        )
        .expect("build");
        assert_eq!(cmd.args, ["--verbose"]);
    }

    #[test]
    fn empty_flag_passes_bare_value() {
        let mut t = task(1, "task1", &["pos"]);
        t.parameters[0].flag = String::new();
        let cmd = build_command_line(&t, &bound(&[("task1", "pos", "v")]), Path::new("in"))
            .expect("build");
        assert_eq!(cmd.args, ["v"]);
    }

    #[test]
    fn empty_executable_is_an_error() {
        let mut t = task(1, "task1", &[]);
        t.executable = "   ".into();
        assert!(build_command_line(&t, &BoundParameters::default(), Path::new("in")).is_err());
    }
}
