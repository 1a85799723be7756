//! External command execution for the device
//!
//! This module handles:
//! - Spawning programs from an argument vector (never through a shell)
//! - Bounding every run with a timeout
//! - Classifying failures into timeout, non-zero exit and launch errors

mod executor;

pub use executor::{CommandError, CommandExecutor, CommandRunner, CommandSpec};

#[cfg(test)]
pub mod testing;
