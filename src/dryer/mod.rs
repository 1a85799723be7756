//! Drying process control
//!
//! The HTTP layer only talks to the `DryerControl` trait. The simulated
//! implementation stands in for the heater/fan loop on development hosts.

mod simulated;

pub use simulated::SimulatedDryer;

use async_trait::async_trait;
use serde::Serialize;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Lowest accepted setpoint in °C
pub const TEMP_MIN: f64 = 0.0;

/// Highest accepted setpoint in °C
pub const TEMP_MAX: f64 = 70.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DryerError {
    #[error("Temperature must be between {TEMP_MIN} and {TEMP_MAX}°C")]
    SetpointOutOfRange(f64),

    #[error("Filter hours must be a non-negative number, got {0}")]
    InvalidHours(f64),

    #[error("Unknown history mode: {0}")]
    UnknownHistoryMode(String),
}

/// Snapshot returned by `GET /status`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DryerStatus {
    pub setpoint: f64,
    pub current_temp: i64,
    pub current_humidity: i64,
    pub dew_point: i64,
    pub heater: bool,
    pub fan: bool,
    pub status: bool,
    pub valve: f64,
    pub errors: Vec<String>,
    pub drying_elapsed_seconds: u64,
}

/// One point of the history chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySample {
    pub timestamp: String,
    pub temperature: f64,
    pub humidity: f64,
    pub heater_ratio: f64,
    pub fan_ratio: f64,
    pub valve: f64,
}

/// Operating hour counters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OperatingHours {
    pub partial_hours: f64,
    pub total_hours: f64,
    pub filter_hours: f64,
}

/// How far back `GET /history` looks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryWindow {
    OneMinute,
    #[default]
    OneHour,
    TwelveHours,
}

impl HistoryWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryWindow::OneMinute => "1m",
            HistoryWindow::OneHour => "1h",
            HistoryWindow::TwelveHours => "12h",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            HistoryWindow::OneMinute => Duration::from_secs(60),
            HistoryWindow::OneHour => Duration::from_secs(60 * 60),
            HistoryWindow::TwelveHours => Duration::from_secs(12 * 60 * 60),
        }
    }
}

impl FromStr for HistoryWindow {
    type Err = DryerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(HistoryWindow::OneMinute),
            "1h" => Ok(HistoryWindow::OneHour),
            "12h" => Ok(HistoryWindow::TwelveHours),
            other => Err(DryerError::UnknownHistoryMode(other.to_string())),
        }
    }
}

/// Operations the API needs from the drying process
#[async_trait]
pub trait DryerControl: Send + Sync {
    async fn status(&self) -> DryerStatus;

    /// Start or stop a drying session
    async fn set_running(&self, running: bool);

    async fn set_setpoint(&self, value: f64) -> Result<f64, DryerError>;

    async fn history(&self, window: HistoryWindow) -> Vec<HistorySample>;

    async fn reset_filter_hours(&self);

    /// Override the filter counter, folding in the running session first
    async fn set_filter_hours(&self, hours: f64) -> Result<f64, DryerError>;

    async fn operating_hours(&self) -> OperatingHours;

    async fn is_running(&self) -> bool;
}

/// Round to two decimals for the wire
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
