//! Board-level system control
//!
//! Detects whether the process runs on the target board and owns the
//! reboot path, including deferring it until after an HTTP response.

mod capability;
mod reboot;

pub use capability::HardwareCapability;
pub use reboot::{DeviceReboot, RebootScheduler};
