//! Task process execution.
//!
//! [`command`] turns a task plus its bound parameters into an argument
//! vector; [`subprocess`] spawns it with a timeout and captures its output.
//! Neither touches storage, so both are unit-testable in isolation.

pub mod command;
pub mod subprocess;

pub use command::{build_command_line, CommandLine, INPUT_PLACEHOLDER};
pub use subprocess::{run_process, ProcessError, ProcessOutput, ProcessSpec};
