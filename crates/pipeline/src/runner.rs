//! Backend runners: execute one task invocation and classify the outcome.
//!
//! A runner never returns `Err`: every failure is folded into a
//! [`StepOutcome`], either [`StepOutcome::ExecutionError`] (the task ran and
//! reported failure) or [`StepOutcome::Crash`] (it could not run to a normal
//! exit).

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use analytics_core::blob::{BlobRef, LocalBlobStore};
use analytics_core::catalog::Task;
use analytics_core::execution::{build_command_line, run_process, ProcessError, ProcessSpec};
use analytics_core::parameters::BoundParameters;
use analytics_core::types::SubmissionId;

/// One task invocation within a submission.
#[derive(Debug, Clone)]
pub struct StepRequest {
    pub submission_id: SubmissionId,
    /// Ordering index of the step being executed.
    pub step: u32,
    pub task: Task,
    /// All of the submission's bindings; the runner picks the task's own.
    pub parameters: BoundParameters,
    /// Input file inside `working_directory`.
    pub input_path: PathBuf,
    pub working_directory: PathBuf,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success {
        message: String,
        result_data: Option<BlobRef>,
    },
    /// The task ran and reported failure.
    ExecutionError { message: String },
    /// The task could not start, was killed or timed out.
    Crash { message: String },
}

impl StepOutcome {
    pub fn message(&self) -> &str {
        match self {
            Self::Success { message, .. }
            | Self::ExecutionError { message }
            | Self::Crash { message } => message,
        }
    }
}

/// Executes a task against its backend.
#[async_trait]
pub trait BackendRunner: Send + Sync {
    async fn execute(&self, request: StepRequest) -> StepOutcome;
}

// ---------------------------------------------------------------------------
// ProcessRunner
// ---------------------------------------------------------------------------

/// Runs tasks as local subprocesses in the submission's working directory.
///
/// Exit code 0 is success, any other exit code is an execution error, and
/// everything else (spawn failure, signal, timeout, unreadable output) is a
/// crash.
pub struct ProcessRunner {
    blobs: LocalBlobStore,
}

impl ProcessRunner {
    pub fn new(blobs: LocalBlobStore) -> Self {
        Self { blobs }
    }

    /// Store the step's output and build the success outcome.
    async fn capture(&self, request: &StepRequest, stdout: &str) -> StepOutcome {
        let prefix = format!("results/{}/{}", request.submission_id, request.step);

        let matched = match &request.task.out_glob {
            Some(suffix) => {
                match find_output(&request.working_directory, suffix, &request.input_path).await {
                    Ok(found) => found,
                    Err(e) => {
                        return StepOutcome::Crash {
                            message: format!("Failed to scan working directory: {e}"),
                        }
                    }
                }
            }
            None => None,
        };

        let stored = match matched {
            Some(path) => self.blobs.put_file(&prefix, &path).await,
            None => {
                let filename = format!("{}.out", request.task.name);
                self.blobs.put(&prefix, &filename, stdout.as_bytes()).await
            }
        };

        match stored {
            Ok(blob) => StepOutcome::Success {
                message: last_line(stdout)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{} completed", request.task.name)),
                result_data: Some(blob),
            },
            Err(e) => StepOutcome::Crash {
                message: format!("Failed to store output of {}: {e}", request.task.name),
            },
        }
    }
}

#[async_trait]
impl BackendRunner for ProcessRunner {
    async fn execute(&self, request: StepRequest) -> StepOutcome {
        let command = match build_command_line(
            &request.task,
            &request.parameters,
            &request.input_path,
        ) {
            Ok(command) => command,
            Err(e) => {
                return StepOutcome::Crash {
                    message: e.to_string(),
                }
            }
        };

        tracing::debug!(
            submission_id = %request.submission_id,
            step = request.step,
            task = %request.task.name,
            program = %command.program,
            args = ?command.args,
            "Spawning task process"
        );

        let spec = ProcessSpec {
            command,
            working_directory: request.working_directory.clone(),
            env_vars: vec![
                ("SUBMISSION_ID".into(), request.submission_id.to_string()),
                ("STEP".into(), request.step.to_string()),
            ],
            timeout: request.timeout,
        };

        let output = match run_process(spec).await {
            Ok(output) => output,
            Err(ProcessError::Timeout { elapsed_ms }) => {
                return StepOutcome::Crash {
                    message: format!(
                        "{} timed out after {}s",
                        request.task.name,
                        elapsed_ms / 1000
                    ),
                }
            }
            Err(e) => {
                return StepOutcome::Crash {
                    message: format!("{} could not be run: {e}", request.task.name),
                }
            }
        };

        tracing::debug!(
            submission_id = %request.submission_id,
            step = request.step,
            exit_code = ?output.exit_code,
            signal = ?output.signal,
            duration_ms = output.duration_ms,
            "Task process exited"
        );

        match (output.exit_code, output.signal) {
            (Some(0), _) => self.capture(&request, &output.stdout).await,
            (Some(code), _) => StepOutcome::ExecutionError {
                message: last_line(&output.stderr)
                    .map(|line| format!("{} failed: {line}", request.task.name))
                    .unwrap_or_else(|| {
                        format!("{} exited with status {code}", request.task.name)
                    }),
            },
            (None, Some(signal)) => StepOutcome::Crash {
                message: format!("{} was killed by signal {signal}", request.task.name),
            },
            (None, None) => StepOutcome::Crash {
                message: format!("{} terminated abnormally", request.task.name),
            },
        }
    }
}

/// Last non-empty line of `text`, trimmed.
fn last_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).rev().find(|l| !l.is_empty())
}

/// First file (by name) in `dir` whose name ends with `suffix`, ignoring the
/// submission's own input file.
async fn find_output(
    dir: &Path,
    suffix: &str,
    input_path: &Path,
) -> std::io::Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut matches = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path == input_path || !entry.file_type().await?.is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().ends_with(suffix) {
            matches.push(path);
        }
    }
    matches.sort();
    Ok(matches.into_iter().next())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
