//! Scripted command runner for unit tests

use super::{CommandError, CommandRunner, CommandSpec};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// A recorded invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    pub cwd: PathBuf,
}

/// Replays queued results in order and records every call.
/// Calls beyond the queue succeed with empty output.
#[derive(Default)]
pub struct ScriptedRunner {
    replies: Mutex<VecDeque<Result<String, CommandError>>>,
    calls: Mutex<Vec<Invocation>>,
    finished: Mutex<Vec<String>>,
    delay: Duration,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply_ok(self, stdout: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(stdout.to_string()));
        self
    }

    pub fn reply_err(self, err: CommandError) -> Self {
        self.replies.lock().unwrap().push_back(Err(err));
        self
    }

    /// Every call takes `delay` before replying
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.command).collect()
    }

    /// Commands that ran to completion, in order
    pub fn finished(&self) -> Vec<String> {
        self.finished.lock().unwrap().clone()
    }
}

/// Non-zero exit with the given stderr
pub fn failure(command: &str, stderr: &str) -> CommandError {
    CommandError::Failure {
        command: command.to_string(),
        status: Some(1),
        stderr: stderr.to_string(),
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        command: &CommandSpec,
        cwd: &Path,
        _timeout: Duration,
    ) -> Result<String, CommandError> {
        let text = command.to_string();
        self.calls.lock().unwrap().push(Invocation {
            command: text.clone(),
            cwd: cwd.to_path_buf(),
        });
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.finished.lock().unwrap().push(text);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }
}
