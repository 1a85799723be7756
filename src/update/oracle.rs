//! Version oracle - what is deployed, what is upstream, and the sync itself

use crate::command::{CommandRunner, CommandSpec};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use dryer_shared::{SyncOutcome, VersionInfo};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Source of version information and upstream changes for a working tree
#[async_trait]
pub trait VersionOracle: Send + Sync {
    /// Read the deployed revision without touching the working tree
    async fn current_version(&self, path: &Path) -> Result<VersionInfo>;

    /// Whether upstream has revisions the working tree lacks. Never merges.
    async fn update_available(&self, path: &Path) -> Result<bool>;

    /// Fetch and merge upstream into the working tree
    async fn sync_from_upstream(&self, path: &Path) -> Result<SyncOutcome>;
}

/// Oracle backed by the `git` binary
pub struct GitOracle {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl GitOracle {
    /// Create a new git oracle
    pub fn new(runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    async fn git(&self, path: &Path, args: &[&str]) -> Result<String> {
        let command = CommandSpec::new("git", args.iter().copied());
        Ok(self.runner.run(&command, path, self.timeout).await?)
    }

    async fn head(&self, path: &Path) -> Result<String> {
        self.git(path, &["rev-parse", "HEAD"]).await
    }
}

#[async_trait]
impl VersionOracle for GitOracle {
    async fn current_version(&self, path: &Path) -> Result<VersionInfo> {
        let commit = self.head(path).await?;
        let short_commit = self.git(path, &["rev-parse", "--short", "HEAD"]).await?;
        let branch = self.git(path, &["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        let log = self.git(path, &["log", "-1", "--format=%cI%n%s"]).await?;

        let (date, message) = log
            .split_once('\n')
            .map(|(date, subject)| (date.trim(), subject.trim()))
            .unwrap_or((log.trim(), ""));
        if date.is_empty() {
            return Err(anyhow!("Unexpected git log output: {:?}", log));
        }

        Ok(VersionInfo {
            commit,
            short_commit,
            branch,
            date: date.to_string(),
            message: message.to_string(),
        })
    }

    async fn update_available(&self, path: &Path) -> Result<bool> {
        self.git(path, &["fetch", "--quiet"]).await?;
        let behind = self
            .git(path, &["rev-list", "--count", "HEAD..@{u}"])
            .await?;
        let behind: u64 = behind
            .parse()
            .with_context(|| format!("Unexpected rev-list output: {:?}", behind))?;

        debug!("Working tree is {} revision(s) behind upstream", behind);
        Ok(behind > 0)
    }

    async fn sync_from_upstream(&self, path: &Path) -> Result<SyncOutcome> {
        let before = self.head(path).await?;
        let summary = self.git(path, &["pull", "--ff-only"]).await?;
        let after = self.head(path).await?;

        if before == after {
            info!("Sync left HEAD at {}", before);
            Ok(SyncOutcome::unchanged(summary))
        } else {
            info!("Sync moved HEAD {} -> {}", before, after);
            Ok(SyncOutcome::changed(summary))
        }
    }
}
