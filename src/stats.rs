//! Host telemetry for the stats page

use crate::dryer::OperatingHours;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use sysinfo::{Disks, System};

const THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub dryer: DryerStats,
    pub system: SystemStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct DryerStats {
    pub partial_hours: f64,
    pub total_hours: f64,
    pub filter_hours: f64,
    pub status: bool,
}

impl DryerStats {
    pub fn new(hours: OperatingHours, running: bool) -> Self {
        Self {
            partial_hours: hours.partial_hours,
            total_hours: hours.total_hours,
            filter_hours: hours.filter_hours,
            status: running,
        }
    }
}

/// Readings that cannot be taken on this host are `None` (`null` on the wire)
#[derive(Debug, Clone, Serialize)]
pub struct SystemStats {
    pub cpu_usage_percent: Option<f64>,
    pub cpu_temp_c: Option<f64>,
    pub cpu_freq_mhz: Option<f64>,
    pub load_average: Option<LoadAverage>,
    pub memory: Option<MemoryStats>,
    pub disk: Option<DiskStats>,
    pub uptime_seconds: u64,
    pub platform: Option<String>,
    pub hostname: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LoadAverage {
    #[serde(rename = "1m")]
    pub one: f64,
    #[serde(rename = "5m")]
    pub five: f64,
    #[serde(rename = "15m")]
    pub fifteen: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MemoryStats {
    pub total_mb: f64,
    pub used_mb: f64,
    pub available_mb: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DiskStats {
    pub total_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
    pub percent: f64,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        round_to(used as f64 / total as f64 * 100.0, 1)
    }
}

/// Thermal zones report millidegrees Celsius
fn parse_millidegrees(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .map(|m| round_to(m as f64 / 1000.0, 1))
}

fn read_cpu_temp(path: &Path) -> Option<f64> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|raw| parse_millidegrees(&raw))
}

fn memory_stats(total: u64, available: u64) -> Option<MemoryStats> {
    if total == 0 {
        return None;
    }
    let used = total.saturating_sub(available);
    Some(MemoryStats {
        total_mb: round_to(total as f64 / BYTES_PER_MB, 1),
        used_mb: round_to(used as f64 / BYTES_PER_MB, 1),
        available_mb: round_to(available as f64 / BYTES_PER_MB, 1),
        percent: percent(used, total),
    })
}

fn root_disk() -> Option<DiskStats> {
    let disks = Disks::new_with_refreshed_list();
    let root = disks
        .iter()
        .find(|d| d.mount_point() == Path::new("/"))?;

    let total = root.total_space();
    let free = root.available_space();
    let used = total.saturating_sub(free);
    Some(DiskStats {
        total_gb: round_to(total as f64 / BYTES_PER_GB, 2),
        used_gb: round_to(used as f64 / BYTES_PER_GB, 2),
        free_gb: round_to(free as f64 / BYTES_PER_GB, 2),
        percent: percent(used, total),
    })
}

/// Collect a snapshot. Blocks for one CPU sampling interval, so call it
/// from `spawn_blocking`.
pub fn collect_system() -> SystemStats {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.refresh_cpu();
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL.max(Duration::from_millis(100)));
    sys.refresh_cpu();

    let cpu_usage_percent = if sys.cpus().is_empty() {
        None
    } else {
        Some(round_to(sys.global_cpu_info().cpu_usage() as f64, 1))
    };
    let cpu_freq_mhz = sys
        .cpus()
        .first()
        .map(|cpu| cpu.frequency())
        .filter(|&mhz| mhz > 0)
        .map(|mhz| mhz as f64);

    let load = System::load_average();
    let load_average = Some(LoadAverage {
        one: load.one,
        five: load.five,
        fifteen: load.fifteen,
    });

    SystemStats {
        cpu_usage_percent,
        cpu_temp_c: read_cpu_temp(Path::new(THERMAL_ZONE)),
        cpu_freq_mhz,
        load_average,
        memory: memory_stats(sys.total_memory(), sys.available_memory()),
        disk: root_disk(),
        uptime_seconds: System::uptime(),
        platform: System::cpu_arch(),
        hostname: System::host_name(),
    }
}
