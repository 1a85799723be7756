//! Device reboot and its deferred scheduling

use super::capability::HardwareCapability;
use crate::command::{CommandError, CommandRunner, CommandSpec};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Privileged reboot, elided on development hosts
pub struct DeviceReboot {
    capability: HardwareCapability,
    runner: Arc<dyn CommandRunner>,
    command: CommandSpec,
    timeout: Duration,
}

impl DeviceReboot {
    /// Create a new reboot primitive
    pub fn new(
        capability: HardwareCapability,
        runner: Arc<dyn CommandRunner>,
        command: CommandSpec,
        timeout: Duration,
    ) -> Self {
        Self {
            capability,
            runner,
            command,
            timeout,
        }
    }

    /// Reboot the board. Command failures are returned unchanged.
    pub async fn reboot(&self) -> Result<(), CommandError> {
        if !self.capability.is_embedded() {
            info!("Reboot skipped (not running on target hardware)");
            return Ok(());
        }

        info!("Rebooting device: {}", self.command);
        self.runner
            .run(&self.command, Path::new("/"), self.timeout)
            .await
            .map(|_| ())
    }
}

/// Fires the reboot once a response has left the process
#[derive(Clone)]
pub struct RebootScheduler {
    reboot: Arc<DeviceReboot>,
    min_delay: Duration,
}

impl RebootScheduler {
    /// Create a new scheduler
    pub fn new(reboot: Arc<DeviceReboot>, min_delay: Duration) -> Self {
        Self { reboot, min_delay }
    }

    /// Reboot after `response_sent` resolves and the minimum delay passes.
    /// There is no way to cancel once scheduled.
    pub fn schedule_reboot<F>(&self, response_sent: F) -> JoinHandle<()>
    where
        F: Future + Send + 'static,
        F::Output: Send,
    {
        let reboot = self.reboot.clone();
        let min_delay = self.min_delay;

        tokio::spawn(async move {
            response_sent.await;
            info!(
                "Response delivered, rebooting in {}s",
                min_delay.as_secs_f32()
            );
            tokio::time::sleep(min_delay).await;

            if let Err(e) = reboot.reboot().await {
                error!("Reboot failed: {}", e);
            }
        })
    }
}
