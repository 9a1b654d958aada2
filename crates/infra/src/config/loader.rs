//! Configuration loader
//!
//! Builds the application [`Config`] in three layers:
//! 1. Built-in defaults
//! 2. The first config file found (probed paths below, JSON or TOML)
//! 3. `NESTWATCH_*` environment variable overrides
//!
//! ## Environment Variables
//! - `NESTWATCH_MODE`: `diagnostics` or `autonomous`
//! - `NESTWATCH_MODE_LOCK_PATH`: mode lock record path
//! - `NESTWATCH_RECORDINGS_DIR`: primary recording output directory
//! - `NESTWATCH_MIRROR_DIR`: secondary mirror directory
//! - `NESTWATCH_PIR_PINS`: comma-separated BCM pins, e.g. `17,27`
//! - `NESTWATCH_SLEEP_WINDOWS`: comma-separated `HH:MM-HH:MM` ranges
//! - `NESTWATCH_BATTERY_CAPACITY_MAH`: nominal battery capacity
//! - `NESTWATCH_DATA_DIR`: battery state/history directory
//! - `NESTWATCH_CAMERA_DEVICE`: V4L2 device index
//!
//! ## File Locations
//! The loader probes `./nestwatch.json`, `./nestwatch.toml`,
//! `./config.json`, `./config.toml` in that order.

use std::path::Path;

use nestwatch_domain::{Config, NestwatchError, OperatingMode, Result, SleepWindowSpec};
use tracing::info;

const PROBE_PATHS: [&str; 4] = ["nestwatch.json", "nestwatch.toml", "config.json", "config.toml"];

/// Load configuration with the default probing strategy.
///
/// # Errors
/// Returns `NestwatchError::Config` when a config file exists but cannot
/// be parsed, or an environment override carries an invalid value.
/// A missing file is not an error; defaults apply.
pub fn load() -> Result<Config> {
    let mut config = Config::default();
    for candidate in PROBE_PATHS {
        let path = Path::new(candidate);
        if path.is_file() {
            config = load_from_path(path)?;
            info!(path = %path.display(), "config.loaded_from_file");
            break;
        }
    }
    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Parse a specific config file, JSON or TOML by extension.
pub fn load_from_path(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| NestwatchError::Config(format!("cannot read {}: {e}", path.display())))?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str(&content)
            .map_err(|e| NestwatchError::Config(format!("invalid TOML in {}: {e}", path.display()))),
        _ => serde_json::from_str(&content)
            .map_err(|e| NestwatchError::Config(format!("invalid JSON in {}: {e}", path.display()))),
    }
}

fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Some(value) = env_var("NESTWATCH_MODE") {
        config.mode = match value.to_lowercase().as_str() {
            "diagnostics" => OperatingMode::Diagnostics,
            "autonomous" => OperatingMode::Autonomous,
            other => {
                return Err(NestwatchError::Config(format!("unknown mode {other:?}")));
            }
        };
    }
    if let Some(value) = env_var("NESTWATCH_MODE_LOCK_PATH") {
        config.mode_lock_path = value.into();
    }
    if let Some(value) = env_var("NESTWATCH_RECORDINGS_DIR") {
        config.recording.recordings_dir = value.into();
    }
    if let Some(value) = env_var("NESTWATCH_MIRROR_DIR") {
        config.recording.mirror_dir = Some(value.into());
    }
    if let Some(value) = env_var("NESTWATCH_PIR_PINS") {
        config.motion.pir_pins = parse_pins(&value)?;
    }
    if let Some(value) = env_var("NESTWATCH_SLEEP_WINDOWS") {
        config.sleep_windows = parse_sleep_windows(&value);
    }
    if let Some(value) = env_var("NESTWATCH_BATTERY_CAPACITY_MAH") {
        config.power.nominal_capacity_mah = value
            .parse()
            .map_err(|_| NestwatchError::Config(format!("invalid capacity {value:?}")))?;
    }
    if let Some(value) = env_var("NESTWATCH_DATA_DIR") {
        config.power.data_dir = value.into();
    }
    if let Some(value) = env_var("NESTWATCH_CAMERA_DEVICE") {
        config.camera.device_index = value
            .parse()
            .map_err(|_| NestwatchError::Config(format!("invalid device index {value:?}")))?;
    }
    Ok(())
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

/// Parse `"17,27"` into pin numbers. An empty list disables PIR hardware.
fn parse_pins(value: &str) -> Result<Vec<u32>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse()
                .map_err(|_| NestwatchError::Config(format!("invalid pin {part:?}")))
        })
        .collect()
}

/// Split `"22:00-06:00,12:30-13:00"` into window specs.
///
/// Time-of-day validation happens in the sleep scheduler, which drops
/// malformed windows with a diagnostic instead of failing startup.
fn parse_sleep_windows(value: &str) -> Vec<SleepWindowSpec> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (start, end) = part.split_once('-').unwrap_or((part, ""));
            SleepWindowSpec { start: start.trim().to_string(), end: end.trim().to_string() }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nestwatch.json");
        std::fs::write(
            &path,
            r#"{
                "mode": "autonomous",
                "recording": {"min_gap_seconds": 90},
                "sleep_windows": [{"start": "22:00", "end": "06:00"}]
            }"#,
        )
        .unwrap();

        let config = load_from_path(&path).unwrap();
        assert_eq!(config.mode, OperatingMode::Autonomous);
        assert_eq!(config.recording.min_gap_seconds, 90);
        // Unspecified sections keep their defaults.
        assert_eq!(config.recording.max_seconds, 30);
        assert_eq!(config.sleep_windows.len(), 1);
    }

    #[test]
    fn toml_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nestwatch.toml");
        std::fs::write(
            &path,
            "mode = \"diagnostics\"\n\n[camera]\ndevice_index = 2\nrecord_fps = 10.0\n",
        )
        .unwrap();

        let config = load_from_path(&path).unwrap();
        assert_eq!(config.mode, OperatingMode::Diagnostics);
        assert_eq!(config.camera.device_index, 2);
        assert_eq!(config.camera.record_width, 1280);
    }

    #[test]
    fn malformed_file_is_a_hard_stop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nestwatch.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(matches!(load_from_path(&path), Err(NestwatchError::Config(_))));
    }

    #[test]
    fn pin_list_parsing() {
        assert_eq!(parse_pins("17,27").unwrap(), vec![17, 27]);
        assert_eq!(parse_pins(" 4 , 5 ").unwrap(), vec![4, 5]);
        assert_eq!(parse_pins("").unwrap(), Vec::<u32>::new());
        assert!(parse_pins("17,abc").is_err());
    }

    #[test]
    fn sleep_window_parsing_defers_validation() {
        let windows = parse_sleep_windows("22:00-06:00, 12:30-13:00");
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].start, "22:00");
        assert_eq!(windows[1].end, "13:00");
        // Malformed entries pass through; the scheduler drops them later.
        let odd = parse_sleep_windows("garbage");
        assert_eq!(odd.len(), 1);
        assert_eq!(odd[0].end, "");
    }
}
