//! Dryer Shared Types
//!
//! This crate provides the wire types exchanged over the device HTTP API and
//! the state machine that drives the self-update pipeline.

pub mod pipeline;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Update parameters for the system
pub mod update {
    /// Default timeout for every external command, in seconds
    pub const COMMAND_TIMEOUT_SECS: u64 = 300;

    /// Minimum delay between the response leaving the process and the reboot
    pub const REBOOT_MIN_DELAY_SECS: u64 = 3;

    /// Message returned when the sync found nothing new
    pub const MSG_UP_TO_DATE: &str = "Already up to date.";

    /// Message returned when every stage succeeded
    pub const MSG_APPLIED: &str = "Update applied. Rebooting...";

    /// Message returned when another pipeline holds the gate
    pub const MSG_IN_PROGRESS: &str = "Update already in progress";
}

/// One ordered step of the update pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Fetch and merge upstream changes
    Sync,
    /// Refresh dependencies
    Deps,
    /// Rebuild assets and binaries
    Build,
}

impl Stage {
    /// All stages in execution order
    pub const ORDER: [Stage; 3] = [Stage::Sync, Stage::Deps, Stage::Build];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Sync => "sync",
            Stage::Deps => "deps",
            Stage::Build => "build",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Unknown stage: {0}")]
pub struct UnknownStage(pub String);

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sync" => Ok(Stage::Sync),
            "deps" => Ok(Stage::Deps),
            "build" => Ok(Stage::Build),
            other => Err(UnknownStage(other.to_string())),
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Outcome of one `full_update` run, returned verbatim by `POST /apply`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub update_applied: bool,
    pub message: String,
    pub steps: Vec<Stage>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub error: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub reboot: bool,
}

impl UpdateResult {
    /// Sync found nothing new; later stages were skipped
    pub fn up_to_date() -> Self {
        Self {
            update_applied: false,
            message: update::MSG_UP_TO_DATE.into(),
            steps: vec![Stage::Sync],
            error: false,
            reboot: false,
        }
    }

    /// Every stage completed; the device must reboot
    pub fn applied(steps: Vec<Stage>) -> Self {
        Self {
            update_applied: true,
            message: update::MSG_APPLIED.into(),
            steps,
            error: false,
            reboot: true,
        }
    }

    /// A stage failed after `steps` completed
    pub fn failed(steps: Vec<Stage>, message: impl Into<String>) -> Self {
        Self {
            update_applied: false,
            message: message.into(),
            steps,
            error: true,
            reboot: false,
        }
    }

    /// Whether the caller has to schedule the deferred reboot
    pub fn reboot_requested(&self) -> bool {
        self.reboot
    }
}

/// Currently deployed revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub commit: String,
    pub short_commit: String,
    pub branch: String,
    pub date: String,
    pub message: String,
}

/// Structured result of an upstream sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// The working tree moved to a new revision
    pub changed: bool,
    /// Human-readable summary, for logs only
    pub summary: String,
}

impl SyncOutcome {
    pub fn unchanged(summary: impl Into<String>) -> Self {
        Self {
            changed: false,
            summary: summary.into(),
        }
    }

    pub fn changed(summary: impl Into<String>) -> Self {
        Self {
            changed: true,
            summary: summary.into(),
        }
    }
}

/// Body of `GET /check`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCheck {
    pub update_available: bool,
}
