//! Common data types used throughout the application

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overall application mode. Exactly one mode may be active system-wide,
/// enforced by the mode lock rather than in-process state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    /// Interactive hardware diagnostics
    Diagnostics,
    /// Unattended motion-triggered capture
    Autonomous,
}

impl std::fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Diagnostics => write!(f, "diagnostics"),
            Self::Autonomous => write!(f, "autonomous"),
        }
    }
}

/// Contents of the mode lock file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeLockRecord {
    /// Mode the owning process is running in
    pub mode: OperatingMode,
    /// Process id of the owner
    pub pid: u32,
    /// When the lock was acquired
    pub timestamp: DateTime<Utc>,
}

/// Direction of current flow reported by the power monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerFlow {
    Charging,
    Discharging,
    Idle,
    Unknown,
}

/// Raw telemetry handed to the battery estimator
#[derive(Debug, Clone, Copy)]
pub struct PowerReading {
    /// Bus voltage in volts
    pub voltage_v: f64,
    /// Signed current in milliamps, if the sense chip reported one
    pub current_ma: Option<f64>,
    /// Flow direction classified from the current sign
    pub flow: PowerFlow,
}

/// Learned battery state, persisted across restarts.
///
/// Mutated only by the battery estimator. A corrupt or missing state file
/// resets to `Default` rather than failing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatteryState {
    /// Capacity learned from observed charge cycles, in mAh
    pub learned_capacity_mah: Option<f64>,
    /// Coulomb-counted state of charge as a fraction in [0, 1]
    pub soc_coulomb: Option<f64>,
    /// Amp-hours discharged since the last near-full event
    pub discharge_since_full_ah: f64,
    /// Amp-hours charged since the last near-empty event
    pub charge_since_empty_ah: f64,
    /// Unix timestamp of the previous sample
    pub last_sample_unix: Option<f64>,
    /// Current of the previous sample, in amps
    pub last_current_a: f64,
    /// Flow direction of the previous sample
    pub last_flow: Option<PowerFlow>,
    /// Total samples recorded since the state file was created
    pub samples_recorded: u64,
}

impl Default for BatteryState {
    fn default() -> Self {
        Self {
            learned_capacity_mah: None,
            soc_coulomb: None,
            discharge_since_full_ah: 0.0,
            charge_since_empty_ah: 0.0,
            last_sample_unix: None,
            last_current_a: 0.0,
            last_flow: None,
            samples_recorded: 0,
        }
    }
}

/// One row of the append-only battery telemetry history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatterySample {
    /// Unix timestamp of the sample
    pub timestamp: f64,
    /// Bus voltage in volts
    pub voltage_v: f64,
    /// Signed current in milliamps
    pub current_ma: Option<f64>,
    /// Flow direction at sample time
    pub flow: PowerFlow,
}

/// Result returned after recording a battery sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatteryEstimate {
    /// Blended state of charge, percent, clamped to [0, 100]
    pub soc_pct: f64,
    /// State of charge derived from the voltage curve alone
    pub voltage_soc_pct: f64,
    /// Coulomb-counted state of charge, percent, once initialised
    pub coulomb_soc_pct: Option<f64>,
    /// Capacity used for projections (learned, else nominal), in mAh
    pub capacity_mah: f64,
    /// Projected hours until empty while discharging above the noise floor
    pub time_to_empty_hours: Option<f64>,
    /// Projected hours until full while charging above the noise floor
    pub time_to_full_hours: Option<f64>,
    /// Total samples recorded so far
    pub samples_recorded: u64,
}

/// Snapshot of the run controller, safe to call from any context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunControllerStatus {
    /// Whether a recording task is currently active
    pub recording_active: bool,
    /// Path of the most recent successful recording
    pub recording_path: Option<PathBuf>,
    /// Purpose tag of the current camera lease holder, if any
    pub camera_in_use_by: Option<String>,
    /// Unix timestamp when the last recording ended (0.0 if never)
    pub last_recording_end_unix: f64,
}
