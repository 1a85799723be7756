//! Simulated dryer with a first-order thermal model

use super::{
    round2, DryerControl, DryerError, DryerStatus, HistorySample, HistoryWindow, OperatingHours,
    TEMP_MAX, TEMP_MIN,
};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant};
use tracing::{debug, info};

const AMBIENT_TEMP: f64 = 22.0;
const AMBIENT_HUMIDITY: f64 = 45.0;
const MIN_HUMIDITY: f64 = 5.0;
/// °C per second while the heater is on
const HEAT_RATE: f64 = 0.08;
/// Fraction of the gap to ambient lost per second
const LOSS_RATE: f64 = 0.002;
/// Heater switches on below setpoint minus this band
const HYSTERESIS: f64 = 0.5;
const VENT_OPENING: f64 = 0.3;
const HISTORY_RETENTION: Duration = Duration::from_secs(12 * 60 * 60);

#[derive(Debug, Clone)]
struct Sample {
    at: DateTime<Local>,
    temperature: f64,
    humidity: f64,
    heater_ratio: f64,
    fan_ratio: f64,
    valve: f64,
}

#[derive(Debug)]
struct DryerState {
    setpoint: f64,
    running: bool,
    session_start: Option<Instant>,
    /// Hours are counted up to this instant
    accounted_until: Option<Instant>,
    temperature: f64,
    humidity: f64,
    heater: bool,
    fan: bool,
    valve: f64,
    filter_hours: f64,
    total_hours: f64,
    partial_hours: f64,
    history: VecDeque<Sample>,
}

impl DryerState {
    /// Fold the running session into the hour counters
    fn accumulate_session(&mut self, now: Instant) {
        if let Some(since) = self.accounted_until {
            let hours = now.duration_since(since).as_secs_f64() / 3600.0;
            self.filter_hours += hours;
            self.total_hours += hours;
            self.partial_hours += hours;
            self.accounted_until = Some(now);
        }
    }

    fn step(&mut self, dt: Duration) {
        let dt = dt.as_secs_f64();

        if self.running {
            self.heater = self.temperature < self.setpoint - HYSTERESIS;
            self.fan = true;
            self.valve = VENT_OPENING;
        } else {
            self.heater = false;
            self.fan = false;
            self.valve = 0.0;
        }

        let heating = if self.heater { HEAT_RATE } else { 0.0 };
        self.temperature += (heating - LOSS_RATE * (self.temperature - AMBIENT_TEMP)) * dt;

        let target = if self.running { MIN_HUMIDITY } else { AMBIENT_HUMIDITY };
        self.humidity += (target - self.humidity) * (LOSS_RATE * dt).min(1.0);
    }

    fn record(&mut self, at: DateTime<Local>) {
        self.history.push_back(Sample {
            at,
            temperature: self.temperature,
            humidity: self.humidity,
            heater_ratio: if self.heater { 1.0 } else { 0.0 },
            fan_ratio: if self.fan { 1.0 } else { 0.0 },
            valve: self.valve,
        });

        let retention = chrono::Duration::seconds(HISTORY_RETENTION.as_secs() as i64);
        while let Some(front) = self.history.front() {
            if at - front.at > retention {
                self.history.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Magnus approximation of the dew point
fn dew_point(temperature: f64, relative_humidity: f64) -> f64 {
    const A: f64 = 17.62;
    const B: f64 = 243.12;
    let rh = relative_humidity.clamp(1.0, 100.0) / 100.0;
    let gamma = (A * temperature) / (B + temperature) + rh.ln();
    (B * gamma) / (A - gamma)
}

/// In-memory dryer used when no heater hardware is attached
pub struct SimulatedDryer {
    state: RwLock<DryerState>,
}

impl SimulatedDryer {
    /// Create a new simulated dryer at ambient conditions
    pub fn new(setpoint: f64, filter_hours: f64) -> Self {
        Self {
            state: RwLock::new(DryerState {
                setpoint,
                running: false,
                session_start: None,
                accounted_until: None,
                temperature: AMBIENT_TEMP,
                humidity: AMBIENT_HUMIDITY,
                heater: false,
                fan: false,
                valve: 0.0,
                filter_hours,
                total_hours: 0.0,
                partial_hours: 0.0,
                history: VecDeque::new(),
            }),
        }
    }

    /// Advance the model by `period` and record a history sample, forever
    pub fn start_sampling(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let mut state = self.state.write().await;
                state.step(period);
                state.record(Local::now());
                debug!(
                    "Dryer sample: temp={:.1} hum={:.1} heater={}",
                    state.temperature, state.humidity, state.heater
                );
            }
        })
    }
}

#[async_trait]
impl DryerControl for SimulatedDryer {
    async fn status(&self) -> DryerStatus {
        let state = self.state.read().await;
        let elapsed = match (state.running, state.session_start) {
            (true, Some(start)) => start.elapsed().as_secs(),
            _ => 0,
        };

        DryerStatus {
            setpoint: state.setpoint,
            current_temp: state.temperature.round() as i64,
            current_humidity: state.humidity.round() as i64,
            dew_point: dew_point(state.temperature, state.humidity).round() as i64,
            heater: state.heater,
            fan: state.fan,
            status: state.running,
            valve: round2(state.valve),
            errors: Vec::new(),
            drying_elapsed_seconds: elapsed,
        }
    }

    async fn set_running(&self, running: bool) {
        let mut state = self.state.write().await;
        if state.running == running {
            return;
        }

        let now = Instant::now();
        if running {
            state.partial_hours = 0.0;
            state.session_start = Some(now);
            state.accounted_until = Some(now);
            info!("Drying started at {:.1}°C", state.setpoint);
        } else {
            state.accumulate_session(now);
            state.session_start = None;
            state.accounted_until = None;
            info!("Drying stopped after {:.2}h", state.partial_hours);
        }
        state.running = running;
    }

    async fn set_setpoint(&self, value: f64) -> Result<f64, DryerError> {
        if !(TEMP_MIN..=TEMP_MAX).contains(&value) {
            return Err(DryerError::SetpointOutOfRange(value));
        }
        let mut state = self.state.write().await;
        state.setpoint = value;
        info!("Setpoint changed to {:.1}°C", value);
        Ok(value)
    }

    async fn history(&self, window: HistoryWindow) -> Vec<HistorySample> {
        let state = self.state.read().await;
        let since = Local::now() - chrono::Duration::seconds(window.duration().as_secs() as i64);

        state
            .history
            .iter()
            .filter(|s| s.at >= since)
            .map(|s| HistorySample {
                timestamp: s.at.format("%Y-%m-%d %H:%M:%S").to_string(),
                temperature: round2(s.temperature),
                humidity: round2(s.humidity),
                heater_ratio: round2(s.heater_ratio),
                fan_ratio: round2(s.fan_ratio),
                valve: round2(s.valve),
            })
            .collect()
    }

    async fn reset_filter_hours(&self) {
        let mut state = self.state.write().await;
        state.accumulate_session(Instant::now());
        state.filter_hours = 0.0;
        info!("Filter hours reset");
    }

    async fn set_filter_hours(&self, hours: f64) -> Result<f64, DryerError> {
        if !hours.is_finite() || hours < 0.0 {
            return Err(DryerError::InvalidHours(hours));
        }
        let mut state = self.state.write().await;
        state.accumulate_session(Instant::now());
        state.filter_hours = hours;
        Ok(hours)
    }

    async fn operating_hours(&self) -> OperatingHours {
        let mut state = self.state.write().await;
        state.accumulate_session(Instant::now());
        OperatingHours {
            partial_hours: round2(state.partial_hours),
            total_hours: round2(state.total_hours),
            filter_hours: round2(state.filter_hours),
        }
    }

    async fn is_running(&self) -> bool {
        self.state.read().await.running
    }
}
