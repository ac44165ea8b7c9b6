//! External tool execution.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::ProcessError;

/// Captured output of a finished process.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs external tools, optionally bounded by a timeout.
///
/// A timed-out child is killed when its future is dropped.
#[derive(Debug, Clone, Default)]
pub struct ToolRunner {
    timeout: Option<Duration>,
}

impl ToolRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run `program` in `cwd` and capture its output, whatever the exit code.
    pub async fn output<I, S>(
        &self,
        program: &str,
        args: I,
        cwd: &Path,
    ) -> Result<ToolOutput, ProcessError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(program = %program, cwd = %cwd.display(), "Running tool");

        let child = command.output();
        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, child)
                .await
                .map_err(|_| ProcessError::TimedOut {
                    program: program.to_string(),
                    timeout,
                })?,
            None => child.await,
        }
        .map_err(|source| ProcessError::Spawn {
            program: program.to_string(),
            source,
        })?;

        Ok(ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Like [`ToolRunner::output`], but any exit code outside `accepted` is an error.
    pub async fn run_accepting<I, S>(
        &self,
        program: &str,
        args: I,
        cwd: &Path,
        accepted: &[i32],
    ) -> Result<ToolOutput, ProcessError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let output = self.output(program, args, cwd).await?;
        match output.code {
            Some(code) if accepted.contains(&code) => Ok(output),
            code => Err(ProcessError::Failed {
                program: program.to_string(),
                code,
                stderr: output.stderr.trim().to_string(),
            }),
        }
    }

    /// Run `program` and require a zero exit code.
    pub async fn run<I, S>(
        &self,
        program: &str,
        args: I,
        cwd: &Path,
    ) -> Result<ToolOutput, ProcessError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        self.run_accepting(program, args, cwd, &[0]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let output = ToolRunner::default()
            .run("sh", ["-c", "echo hello"], dir.path())
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = ToolRunner::default()
            .run("sh", ["-c", "echo oops >&2; exit 3"], dir.path())
            .await
            .unwrap_err();
        match err {
            ProcessError::Failed { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "oops");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_accepted_exit_codes() {
        let dir = tempfile::tempdir().unwrap();
        let output = ToolRunner::default()
            .run_accepting("sh", ["-c", "exit 1"], dir.path(), &[0, 1])
            .await
            .unwrap();
        assert_eq!(output.code, Some(1));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let err = ToolRunner::default()
            .run("definitely-not-a-real-tool", ["--version"], dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let err = ToolRunner::new(Some(Duration::from_millis(50)))
            .run("sh", ["-c", "sleep 5"], dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::TimedOut { .. }));
    }
}
