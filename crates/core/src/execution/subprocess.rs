//! Subprocess spawning with a timeout.
//!
//! [`run_process`] spawns a [`ProcessSpec`], captures stdout/stderr and
//! enforces the timeout. It reports the raw exit information; deciding
//! whether a non-zero exit is a controlled failure is the caller's job.

use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use super::command::CommandLine;

/// Maximum stdout or stderr size captured per stream (10 MiB).
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Everything needed to spawn one task process.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub command: CommandLine,
    pub working_directory: PathBuf,
    pub env_vars: Vec<(String, String)>,
    /// Maximum wall-clock time before the process is killed.
    pub timeout: Duration,
}

/// Captured output from a process that ran to exit.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Terminating signal, if any.
    pub signal: Option<i32>,
    pub duration_ms: u64,
}

/// Failures that prevented the process from running to exit.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Executable not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Process timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Spawn the process described by `spec` and wait for it, bounded by
/// `spec.timeout`. The child is killed if the timeout fires.
pub async fn run_process(spec: ProcessSpec) -> Result<ProcessOutput, ProcessError> {
    let mut cmd = Command::new(&spec.command.program);
    cmd.args(&spec.command.args)
        .current_dir(&spec.working_directory)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in &spec.env_vars {
        cmd.env(key, value);
    }

    let start = Instant::now();
    let mut child = cmd.spawn().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ProcessError::NotFound(spec.command.program.clone()),
        std::io::ErrorKind::PermissionDenied => {
            ProcessError::PermissionDenied(spec.command.program.clone())
        }
        _ => ProcessError::Io(e),
    })?;

    let stdout_task = tokio::spawn(read_stream(child.stdout.take()));
    let stderr_task = tokio::spawn(read_stream(child.stderr.take()));

    match tokio::time::timeout(spec.timeout, child.wait()).await {
        Ok(Ok(status)) => {
            let duration_ms = start.elapsed().as_millis() as u64;
            let stdout = stdout_task.await.unwrap_or_default();
            let stderr = stderr_task.await.unwrap_or_default();
            Ok(ProcessOutput {
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
                exit_code: status.code(),
                signal: status.signal(),
                duration_ms,
            })
        }
        Ok(Err(e)) => Err(ProcessError::Io(e)),
        Err(_elapsed) => {
            // Dropping `child` kills it (kill_on_drop).
            drop(child);
            stdout_task.abort();
            stderr_task.abort();
            Err(ProcessError::Timeout {
                elapsed_ms: start.elapsed().as_millis() as u64,
            })
        }
    }
}

/// Read an entire output stream into a byte buffer, capped at [`MAX_OUTPUT_BYTES`].
///
/// Output past the cap is drained and discarded so the pipe stays open until
/// the process exits.
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
        let _ = tokio::io::copy(&mut h, &mut tokio::io::sink()).await;
    }
    buf
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(program: &str, args: &[&str], dir: &std::path::Path, timeout: Duration) -> ProcessSpec {
        ProcessSpec {
            command: CommandLine {
                program: program.into(),
                args: args.iter().map(|a| a.to_string()).collect(),
            },
            working_directory: dir.to_path_buf(),
            env_vars: vec![],
            timeout,
        }
    }

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let out = run_process(spec("sh", &["-c", "echo hello"], dir.path(), Duration::from_secs(5)))
            .await
            .expect("run");
        assert_eq!(out.exit_code, Some(0));
        assert_eq!(out.stdout.trim(), "hello");
        assert!(out.signal.is_none());
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported_not_errored() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let out = run_process(spec(
            "sh",
            &["-c", "echo oops >&2; exit 42"],
            dir.path(),
            Duration::from_secs(5),
        ))
        .await
        .expect("run");
        assert_eq!(out.exit_code, Some(42));
        assert!(out.stderr.contains("oops"));
    }

    #[tokio::test]
    async fn output_past_the_cap_is_discarded_without_killing_the_process() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let out = run_process(spec(
            "sh",
            &["-c", "head -c 11000000 /dev/zero"],
            dir.path(),
            Duration::from_secs(30),
        ))
        .await
        .expect("run");
        assert_eq!(out.signal, None);
        assert_eq!(out.exit_code, Some(0));
        assert_eq!(out.stdout.len(), MAX_OUTPUT_BYTES);
    }

    #[tokio::test]
    async fn killed_by_signal_has_no_exit_code() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let out = run_process(spec("sh", &["-c", "kill -9 $$"], dir.path(), Duration::from_secs(5)))
            .await
            .expect("run");
        assert_eq!(out.exit_code, None);
        assert_eq!(out.signal, Some(9));
    }

    #[tokio::test]
    async fn runs_in_working_directory_with_env() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let mut s = spec(
            "sh",
            &["-c", "echo $MY_VAR > marker.txt"],
            dir.path(),
            Duration::from_secs(5),
        );
        s.env_vars.push(("MY_VAR".into(), "hello_world".into()));
        run_process(s).await.expect("run");
        let marker = std::fs::read_to_string(dir.path().join("marker.txt")).expect("marker");
        assert_eq!(marker.trim(), "hello_world");
    }

    #[tokio::test]
    async fn missing_executable_is_not_found() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let result = run_process(spec(
            "/nonexistent/binary",
            &[],
            dir.path(),
            Duration::from_secs(5),
        ))
        .await;
        assert!(matches!(result, Err(ProcessError::NotFound(_))));
    }

    #[tokio::test]
    async fn timeout_kills_process() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let result = run_process(spec(
            "sh",
            &["-c", "sleep 60"],
            dir.path(),
            Duration::from_millis(200),
        ))
        .await;
        assert!(matches!(result, Err(ProcessError::Timeout { .. })));
    }
}
