//! Device configuration
//!
//! Every section has defaults, so an empty (or absent) TOML file yields a
//! working development setup. Example:
//!
//! ```toml
//! listen = "0.0.0.0:8000"
//! project_path = "/home/pi/dryer"
//!
//! [update]
//! command_timeout_secs = 600
//!
//! [reboot]
//! delay_secs = 5
//! embedded = true
//! ```

use crate::command::CommandSpec;
use crate::update::StageCommands;
use anyhow::{Context, Result};
use clap::Parser;
use dryer_shared::update::{COMMAND_TIMEOUT_SECS, REBOOT_MIN_DELAY_SECS};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "dryer-device", version, about = "Filament dryer control service")]
pub struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "DRYER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to serve the API on
    #[arg(short, long)]
    pub listen: Option<SocketAddr>,

    /// Git checkout the updater operates on
    #[arg(short, long)]
    pub project: Option<PathBuf>,
}

/// Update pipeline settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Per-command timeout
    pub command_timeout_secs: u64,
    /// Dependency refresh and rebuild commands
    pub stages: StageCommands,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: COMMAND_TIMEOUT_SECS,
            stages: StageCommands::default(),
        }
    }
}

impl UpdateConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Reboot settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RebootConfig {
    pub command: CommandSpec,
    /// Minimum wait between the response leaving and the reboot
    pub delay_secs: u64,
    /// Override hardware detection
    pub embedded: Option<bool>,
}

impl Default for RebootConfig {
    fn default() -> Self {
        Self {
            command: CommandSpec::new("sudo", ["reboot"]),
            delay_secs: REBOOT_MIN_DELAY_SECS,
            embedded: None,
        }
    }
}

impl RebootConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

/// Drying process settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DryerConfig {
    /// Setpoint at startup (°C)
    pub setpoint: f64,
    /// Filter counter at startup (hours)
    pub filter_hours: f64,
    /// History sampling period
    pub sample_period_secs: u64,
}

impl Default for DryerConfig {
    fn default() -> Self {
        Self {
            setpoint: 50.0,
            filter_hours: 0.0,
            sample_period_secs: 5,
        }
    }
}

/// Full device configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub listen: SocketAddr,
    pub project_path: PathBuf,
    pub presets_file: PathBuf,
    pub update: UpdateConfig,
    pub reboot: RebootConfig,
    pub dryer: DryerConfig,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8000)),
            project_path: PathBuf::from("."),
            presets_file: PathBuf::from("presets.json"),
            update: UpdateConfig::default(),
            reboot: RebootConfig::default(),
            dryer: DryerConfig::default(),
        }
    }
}

impl DeviceConfig {
    /// Parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Defaults, then the config file, then command line overrides
    pub fn load(args: &Args) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        if let Some(listen) = args.listen {
            config.listen = listen;
        }
        if let Some(project) = &args.project {
            config.project_path = project.clone();
        }
        Ok(config)
    }
}
