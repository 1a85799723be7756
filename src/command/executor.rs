//! Command executor - runs external programs with a timeout

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error};

/// A program and its arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Errors that can occur while running a command
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Command '{command}' timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("{}", failure_text(.command, .status, .stderr))]
    Failure {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("Command '{command}' failed: {source}")]
    Execution {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

fn failure_text(command: &str, status: &Option<i32>, stderr: &str) -> String {
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    match status {
        Some(code) => format!("Command '{}' exited with status {}", command, code),
        None => format!("Command '{}' was terminated by a signal", command),
    }
}

/// Runs external commands on behalf of the update pipeline and reboot primitive
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` in `cwd`, returning its trimmed stdout
    async fn run(
        &self,
        command: &CommandSpec,
        cwd: &Path,
        timeout: Duration,
    ) -> Result<String, CommandError>;
}

/// Spawns real processes
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandExecutor;

impl CommandExecutor {
    /// Create a new command executor
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for CommandExecutor {
    async fn run(
        &self,
        command: &CommandSpec,
        cwd: &Path,
        timeout: Duration,
    ) -> Result<String, CommandError> {
        let text = command.to_string();
        debug!("Running: {} (cwd={})", text, cwd.display());

        let child = Command::new(&command.program)
            .args(&command.args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the wait future on timeout kills the child
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                error!("Command '{}' could not start: {}", text, source);
                CommandError::Execution {
                    command: text.clone(),
                    source,
                }
            })?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                error!("Command '{}' failed while running: {}", text, source);
                return Err(CommandError::Execution {
                    command: text,
                    source,
                });
            }
            Err(_) => {
                error!("Command '{}' timed out after {:?}", text, timeout);
                return Err(CommandError::Timeout {
                    command: text,
                    timeout,
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!(
                "Command failed (rc={:?}): {}",
                output.status.code(),
                stderr
            );
            return Err(CommandError::Failure {
                command: text,
                status: output.status.code(),
                stderr,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!("Command '{}' finished ({} bytes of output)", text, stdout.len());
        Ok(stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh", ["-c", script])
    }

    #[tokio::test]
    async fn test_success_returns_trimmed_stdout() {
        let out = CommandExecutor::new()
            .run(&sh("echo '  hello  '"), Path::new("."), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn test_runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = CommandExecutor::new()
            .run(&CommandSpec::new("pwd", Vec::<String>::new()), dir.path(), Duration::from_secs(5))
            .await
            .unwrap();
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(Path::new(&out).canonicalize().unwrap(), expected);
    }

    #[tokio::test]
    async fn test_nonzero_exit_carries_stderr() {
        let err = CommandExecutor::new()
            .run(&sh("echo '  broken pipe  ' >&2; exit 3"), Path::new("."), Duration::from_secs(5))
            .await
            .unwrap_err();

        match &err {
            CommandError::Failure { status, stderr, .. } => {
                assert_eq!(*status, Some(3));
                assert_eq!(stderr, "broken pipe");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.to_string(), "broken pipe");
    }

    #[tokio::test]
    async fn test_nonzero_exit_without_stderr_reports_status() {
        let err = CommandExecutor::new()
            .run(&sh("exit 1"), Path::new("."), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Command 'sh -c exit 1' exited with status 1");
    }

    #[tokio::test]
    async fn test_timeout_names_command_and_limit() {
        let cmd = CommandSpec::new("sleep", ["5"]);
        let err = CommandExecutor::new()
            .run(&cmd, Path::new("."), Duration::from_secs(1))
            .await
            .unwrap_err();

        assert!(matches!(err, CommandError::Timeout { .. }));
        assert_eq!(err.to_string(), "Command 'sleep 5' timed out after 1s");
    }

    #[tokio::test]
    async fn test_sub_second_timeout_keeps_millis() {
        let err = CommandExecutor::new()
            .run(&CommandSpec::new("sleep", ["5"]), Path::new("."), Duration::from_millis(250))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Command 'sleep 5' timed out after 250ms");
    }

    #[tokio::test]
    async fn test_timed_out_command_is_killed() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let script = format!("sleep 2; touch '{}'", marker.display());

        let err = CommandExecutor::new()
            .run(&sh(&script), dir.path(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Timeout { .. }));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_missing_program_is_execution_error() {
        let cmd = CommandSpec::new("definitely-not-a-real-program-xyz", Vec::<String>::new());
        let err = CommandExecutor::new()
            .run(&cmd, Path::new("."), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Execution { .. }));
        assert!(err.to_string().starts_with("Command 'definitely-not-a-real-program-xyz' failed:"));
    }

    #[test]
    fn test_display_joins_arguments() {
        let cmd = CommandSpec::new("git", ["pull", "--ff-only"]);
        assert_eq!(cmd.to_string(), "git pull --ff-only");
    }
}
