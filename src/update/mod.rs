//! Device self-update
//!
//! This module handles:
//! - Querying the deployed revision and upstream state
//! - Running the staged pipeline (sync, dependency refresh, asset rebuild)
//! - Folding stage failures into a structured result
//! - Keeping the pipeline single-flight

mod gate;
mod oracle;
mod orchestrator;

pub use gate::{UpdateGate, UpdateInProgress};
pub use oracle::{GitOracle, VersionOracle};
pub use orchestrator::{StageCommand, StageCommands, UpdateOrchestrator};
