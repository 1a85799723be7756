//! Single-flight gate around the orchestrator
//!
//! The pipeline mutates the project working tree in place, so two runs must
//! never interleave. A second caller is turned away instead of queued.

use super::orchestrator::UpdateOrchestrator;
use dryer_shared::{update, UpdateResult};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{}", update::MSG_IN_PROGRESS)]
pub struct UpdateInProgress;

/// Allows one `full_update` at a time
pub struct UpdateGate {
    orchestrator: UpdateOrchestrator,
    running: Mutex<()>,
}

impl UpdateGate {
    pub fn new(orchestrator: UpdateOrchestrator) -> Self {
        Self {
            orchestrator,
            running: Mutex::new(()),
        }
    }

    pub fn orchestrator(&self) -> &UpdateOrchestrator {
        &self.orchestrator
    }

    /// Run the pipeline unless another run holds the gate
    pub async fn try_full_update(&self) -> Result<UpdateResult, UpdateInProgress> {
        let Ok(_guard) = self.running.try_lock() else {
            warn!("Rejecting update request: a pipeline is already running");
            return Err(UpdateInProgress);
        };
        Ok(self.orchestrator.full_update().await)
    }
}
