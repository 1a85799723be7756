//! Update orchestrator - runs sync, dependency refresh and asset rebuild in order

use super::oracle::VersionOracle;
use crate::command::{CommandRunner, CommandSpec};
use anyhow::Result;
use dryer_shared::pipeline::{PipelineEvent, PipelineState, TransitionResult, UpdatePipeline};
use dryer_shared::{Stage, UpdateResult, VersionInfo};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// One command of a stage, run from `dir` relative to the project root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCommand {
    #[serde(flatten)]
    pub command: CommandSpec,
    #[serde(default)]
    pub dir: PathBuf,
}

impl StageCommand {
    pub fn new(command: CommandSpec, dir: impl Into<PathBuf>) -> Self {
        Self {
            command,
            dir: dir.into(),
        }
    }
}

/// Commands making up the dependency-refresh and rebuild stages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCommands {
    pub deps: Vec<StageCommand>,
    pub build: Vec<StageCommand>,
}

impl Default for StageCommands {
    fn default() -> Self {
        Self {
            deps: vec![
                StageCommand::new(CommandSpec::new("cargo", ["fetch", "--locked"]), ""),
                StageCommand::new(CommandSpec::new("npm", ["ci"]), "frontend"),
            ],
            build: vec![
                StageCommand::new(
                    CommandSpec::new("cargo", ["build", "--release", "--locked"]),
                    "",
                ),
                StageCommand::new(CommandSpec::new("npm", ["run", "build"]), "frontend"),
            ],
        }
    }
}

/// A stage failed; carries how far the pipeline got
#[derive(Error, Debug)]
#[error("{source}")]
pub struct StageFailure {
    pub stage: Stage,
    pub completed: Vec<Stage>,
    #[source]
    pub source: anyhow::Error,
}

/// Runs the staged self-update against one project working tree
pub struct UpdateOrchestrator {
    project_path: PathBuf,
    oracle: Arc<dyn VersionOracle>,
    runner: Arc<dyn CommandRunner>,
    stages: StageCommands,
    timeout: Duration,
}

impl UpdateOrchestrator {
    /// Create a new orchestrator
    pub fn new(
        project_path: impl Into<PathBuf>,
        oracle: Arc<dyn VersionOracle>,
        runner: Arc<dyn CommandRunner>,
        stages: StageCommands,
        timeout: Duration,
    ) -> Self {
        Self {
            project_path: project_path.into(),
            oracle,
            runner,
            stages,
            timeout,
        }
    }

    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    /// Currently deployed revision
    pub async fn current_version(&self) -> Result<VersionInfo> {
        self.oracle.current_version(&self.project_path).await
    }

    /// Whether upstream is ahead of the working tree
    pub async fn update_available(&self) -> Result<bool> {
        self.oracle.update_available(&self.project_path).await
    }

    /// Run the whole pipeline. Stage failures are folded into the result.
    pub async fn full_update(&self) -> UpdateResult {
        let mut pipeline = UpdatePipeline::new();

        match self.run_pipeline(&mut pipeline).await {
            Ok(result) => result,
            Err(failure) => {
                error!(
                    "Update failed at {} after steps {:?}: {}",
                    failure.stage, failure.completed, failure
                );
                let message = format!("Update failed: {}", failure);
                UpdateResult::failed(failure.completed, message)
            }
        }
    }

    async fn run_pipeline(&self, pipeline: &mut UpdatePipeline) -> Result<UpdateResult, StageFailure> {
        advance(pipeline, PipelineEvent::Started);

        info!("Syncing from upstream...");
        let sync = self
            .oracle
            .sync_from_upstream(&self.project_path)
            .await
            .map_err(|e| fail(pipeline, e))?;

        if !sync.changed {
            advance(pipeline, PipelineEvent::SyncUnchanged);
            info!("No update found");
            return Ok(UpdateResult::up_to_date());
        }
        info!("Upstream changes applied: {}", sync.summary);
        advance(pipeline, PipelineEvent::SyncApplied);

        info!("Refreshing dependencies...");
        self.run_stage(&self.stages.deps)
            .await
            .map_err(|e| fail(pipeline, e))?;
        advance(pipeline, PipelineEvent::DepsRefreshed);

        info!("Rebuilding assets...");
        self.run_stage(&self.stages.build)
            .await
            .map_err(|e| fail(pipeline, e))?;
        advance(pipeline, PipelineEvent::AssetsRebuilt);

        Ok(UpdateResult::applied(pipeline.completed().to_vec()))
    }

    async fn run_stage(&self, commands: &[StageCommand]) -> Result<()> {
        for step in commands {
            let cwd = self.project_path.join(&step.dir);
            self.runner.run(&step.command, &cwd, self.timeout).await?;
        }
        Ok(())
    }
}

fn advance(pipeline: &mut UpdatePipeline, event: PipelineEvent) {
    if let TransitionResult::Invalid { from, event } = pipeline.process_event(event) {
        warn!("Ignoring pipeline event {:?} in state {:?}", event, from);
    }
}

fn fail(pipeline: &mut UpdatePipeline, source: anyhow::Error) -> StageFailure {
    let stage = pipeline.state().active_stage().unwrap_or(Stage::Sync);
    advance(pipeline, PipelineEvent::StageFailed);
    debug_assert_eq!(pipeline.state(), PipelineState::Failed);

    StageFailure {
        stage,
        completed: pipeline.completed().to_vec(),
        source,
    }
}
