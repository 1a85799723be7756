//! Update Pipeline State Machine
//!
//! Defines the valid transitions of the staged self-update and keeps the
//! list of completed stages in step with them.

use crate::Stage;

/// Where the pipeline currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Syncing,
    /// Terminal: sync found nothing new
    UpToDate,
    RefreshingDeps,
    RebuildingAssets,
    /// Terminal: every stage completed
    Succeeded,
    /// Terminal: a stage failed
    Failed,
}

impl PipelineState {
    /// Terminal states accept no further events
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::UpToDate | PipelineState::Succeeded | PipelineState::Failed
        )
    }

    /// The stage being executed in this state, if any
    pub fn active_stage(&self) -> Option<Stage> {
        match self {
            PipelineState::Syncing => Some(Stage::Sync),
            PipelineState::RefreshingDeps => Some(Stage::Deps),
            PipelineState::RebuildingAssets => Some(Stage::Build),
            _ => None,
        }
    }
}

/// Events that drive the pipeline forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineEvent {
    /// Pipeline kicked off, sync begins
    Started,
    /// Sync completed without moving the working tree
    SyncUnchanged,
    /// Sync completed and brought in new revisions
    SyncApplied,
    /// Dependency refresh completed
    DepsRefreshed,
    /// Asset rebuild completed
    AssetsRebuilt,
    /// The active stage failed
    StageFailed,
}

/// Result of a state transition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition was valid and state changed
    Success(PipelineState),
    /// Transition was invalid from current state
    Invalid {
        from: PipelineState,
        event: PipelineEvent,
    },
}

/// The update pipeline state machine
#[derive(Debug)]
pub struct UpdatePipeline {
    current_state: PipelineState,
    completed: Vec<Stage>,
}

impl Default for UpdatePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdatePipeline {
    /// Create a new pipeline in Idle state
    pub fn new() -> Self {
        Self {
            current_state: PipelineState::Idle,
            completed: Vec::with_capacity(Stage::ORDER.len()),
        }
    }

    /// Get current state
    pub fn state(&self) -> PipelineState {
        self.current_state
    }

    /// Stages completed so far, in execution order
    pub fn completed(&self) -> &[Stage] {
        &self.completed
    }

    /// Consume the pipeline and keep the completed stages
    pub fn into_completed(self) -> Vec<Stage> {
        self.completed
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: PipelineEvent) -> TransitionResult {
        let Some(next) = self.next_state(event) else {
            return TransitionResult::Invalid {
                from: self.current_state,
                event,
            };
        };

        // A stage counts as done only when its completion event lands
        if event != PipelineEvent::StageFailed {
            if let Some(stage) = self.current_state.active_stage() {
                self.completed.push(stage);
            }
        }

        self.current_state = next;
        TransitionResult::Success(next)
    }

    /// Get the next state for a given event, if the transition is valid
    fn next_state(&self, event: PipelineEvent) -> Option<PipelineState> {
        use PipelineEvent::*;
        use PipelineState::*;

        match (self.current_state, event) {
            (Idle, Started) => Some(Syncing),

            (Syncing, SyncUnchanged) => Some(UpToDate),
            (Syncing, SyncApplied) => Some(RefreshingDeps),

            (RefreshingDeps, DepsRefreshed) => Some(RebuildingAssets),

            (RebuildingAssets, AssetsRebuilt) => Some(Succeeded),

            // Any running stage can fail
            (Syncing | RefreshingDeps | RebuildingAssets, StageFailed) => Some(Failed),

            _ => None,
        }
    }
}

/// Check if a transition from one state to another is generally valid
pub fn is_valid_transition(from: PipelineState, to: PipelineState) -> bool {
    use PipelineState::*;

    match (from, to) {
        (Idle, Syncing) => true,
        (Syncing, UpToDate) => true,
        (Syncing, RefreshingDeps) => true,
        (RefreshingDeps, RebuildingAssets) => true,
        (RebuildingAssets, Succeeded) => true,
        (Syncing | RefreshingDeps | RebuildingAssets, Failed) => true,
        _ => false,
    }
}
