//! Application configuration structures
//!
//! All sections carry serde defaults so a partial config file (or none at
//! all) yields a usable configuration. Loading strategy lives in the infra
//! crate; these are pure data.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::OperatingMode;

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Operating mode requested at startup
    pub mode: OperatingMode,
    /// Well-known path of the cross-process mode lock record
    pub mode_lock_path: PathBuf,
    /// Camera device and capture geometry
    pub camera: CameraConfig,
    /// Recording output and pacing
    pub recording: RecordingConfig,
    /// Motion sensing inputs
    pub motion: MotionConfig,
    /// Recurring daily quiet windows, e.g. `{start = "22:00", end = "06:00"}`
    pub sleep_windows: Vec<SleepWindowSpec>,
    /// Battery telemetry and estimator settings
    pub power: PowerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: OperatingMode::Diagnostics,
            mode_lock_path: std::env::temp_dir().join("nestwatch_mode.json"),
            camera: CameraConfig::default(),
            recording: RecordingConfig::default(),
            motion: MotionConfig::default(),
            sleep_windows: Vec::new(),
            power: PowerConfig::default(),
        }
    }
}

/// Camera device selection and capture geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// V4L2 device index (`/dev/video<N>`)
    pub device_index: u32,
    pub record_width: u32,
    pub record_height: u32,
    pub record_fps: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self { device_index: 0, record_width: 1280, record_height: 720, record_fps: 15.0 }
    }
}

/// Recording output locations and pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Primary output directory; recordings land in date-partitioned
    /// subdirectories beneath it
    pub recordings_dir: PathBuf,
    /// Optional secondary storage; finished files are mirrored here
    /// best-effort
    pub mirror_dir: Option<PathBuf>,
    /// Hard wall-clock cap on a single recording
    pub max_seconds: u64,
    /// Minimum cooldown between the end of one recording and the start of
    /// the next
    pub min_gap_seconds: u64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            recordings_dir: PathBuf::from("recordings"),
            mirror_dir: None,
            max_seconds: 30,
            min_gap_seconds: 45,
        }
    }
}

/// Motion sensing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// BCM pin numbers of PIR sensors; empty means no motion hardware and
    /// the controller falls back to timer-based triggering
    pub pir_pins: Vec<u32>,
    /// Motion loop poll interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self { pir_pins: vec![17, 27], poll_interval_ms: 250 }
    }
}

/// One recurring daily quiet window, times as `"HH:MM"` strings.
///
/// Validation happens when the sleep scheduler is built; malformed entries
/// are dropped with a diagnostic, not fatal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SleepWindowSpec {
    pub start: String,
    pub end: String,
}

/// Battery telemetry and estimator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerConfig {
    /// Nameplate battery capacity, used until a capacity has been learned
    pub nominal_capacity_mah: f64,
    /// Directory holding the learned state and sample history files
    pub data_dir: PathBuf,
    /// Telemetry poll interval in seconds
    pub sample_interval_secs: u64,
    /// sysfs power-supply directory to poll (e.g.
    /// `/sys/class/power_supply/battery`); `None` disables telemetry
    pub supply_dir: Option<PathBuf>,
}

impl Default for PowerConfig {
    fn default() -> Self {
        let data_dir = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir)
            .join(".local/share/nestwatch");
        Self { nominal_capacity_mah: 10_000.0, data_dir, sample_interval_secs: 60, supply_dir: None }
    }
}
