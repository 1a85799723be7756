mod api;
mod command;
mod config;
mod dryer;
mod presets;
mod stats;
mod system;
mod update;

use anyhow::Result;
use api::AppState;
use clap::Parser;
use command::{CommandExecutor, CommandRunner};
use config::{Args, DeviceConfig};
use dryer::SimulatedDryer;
use presets::PresetStore;
use std::sync::Arc;
use std::time::Duration;
use system::{DeviceReboot, HardwareCapability, RebootScheduler};
use update::{GitOracle, UpdateGate, UpdateOrchestrator};

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();
    let config = DeviceConfig::load(&args)?;

    info!("Dryer device starting");
    info!("  Project: {}", config.project_path.display());
    info!("  Presets: {}", config.presets_file.display());

    // Detected once; everything downstream gets a copy
    let capability = config
        .reboot
        .embedded
        .map(HardwareCapability::forced)
        .unwrap_or_else(HardwareCapability::detect);

    let runner: Arc<dyn CommandRunner> = Arc::new(CommandExecutor::new());
    let timeout = config.update.command_timeout();

    let orchestrator = UpdateOrchestrator::new(
        config.project_path.clone(),
        Arc::new(GitOracle::new(runner.clone(), timeout)),
        runner.clone(),
        config.update.stages.clone(),
        timeout,
    );
    let reboot = DeviceReboot::new(
        capability,
        runner.clone(),
        config.reboot.command.clone(),
        timeout,
    );
    let reboots = RebootScheduler::new(Arc::new(reboot), config.reboot.delay());
    info!(
        "Update pipeline ready (timeout {}s, reboot delay {}s)",
        timeout.as_secs(),
        config.reboot.delay_secs
    );

    let dryer = Arc::new(SimulatedDryer::new(
        config.dryer.setpoint,
        config.dryer.filter_hours,
    ));
    let _sampler = dryer
        .clone()
        .start_sampling(Duration::from_secs(config.dryer.sample_period_secs.max(1)));
    info!("Dryer sampler started");

    let state = Arc::new(AppState {
        updates: UpdateGate::new(orchestrator),
        reboots,
        dryer,
        presets: PresetStore::new(config.presets_file.clone()),
    });

    api::serve(config.listen, state).await
}
