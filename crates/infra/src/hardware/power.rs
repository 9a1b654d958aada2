//! Power telemetry input
//!
//! Reads voltage/current from a sysfs power-supply node and classifies the
//! current flow direction for the battery estimator.

use std::fs;
use std::path::PathBuf;

use nestwatch_domain::constants::IDLE_CURRENT_BAND_MA;
use nestwatch_domain::{NestwatchError, PowerFlow, PowerReading, Result};

/// Source of raw power telemetry
pub trait PowerMonitor: Send + Sync {
    /// Read one voltage/current sample.
    ///
    /// # Errors
    /// `HardwareUnavailable` when the sense hardware cannot be reached.
    fn read(&self) -> Result<PowerReading>;
}

/// Classify flow direction from a signed current in milliamps.
///
/// Positive current charges the battery. Currents inside the idle band are
/// noise, not real flow; an absent reading is `Unknown`.
pub fn classify_flow(current_ma: Option<f64>) -> PowerFlow {
    match current_ma {
        None => PowerFlow::Unknown,
        Some(ma) if ma.abs() <= IDLE_CURRENT_BAND_MA => PowerFlow::Idle,
        Some(ma) if ma > 0.0 => PowerFlow::Charging,
        Some(_) => PowerFlow::Discharging,
    }
}

/// [`PowerMonitor`] reading a `/sys/class/power_supply/<name>` node.
///
/// Expects `voltage_now` in microvolts and `current_now` in microamps, the
/// kernel power-supply class convention.
pub struct SysfsPowerMonitor {
    supply_dir: PathBuf,
}

impl SysfsPowerMonitor {
    pub fn new(supply_dir: PathBuf) -> Self {
        Self { supply_dir }
    }

    fn read_micro(&self, file: &str) -> Result<f64> {
        let path = self.supply_dir.join(file);
        let content = fs::read_to_string(&path).map_err(|e| {
            NestwatchError::HardwareUnavailable(format!("cannot read {}: {e}", path.display()))
        })?;
        content
            .trim()
            .parse::<f64>()
            .map_err(|_| NestwatchError::HardwareUnavailable(format!("bad value in {file}")))
    }
}

impl PowerMonitor for SysfsPowerMonitor {
    fn read(&self) -> Result<PowerReading> {
        let voltage_v = self.read_micro("voltage_now")? / 1_000_000.0;
        // current_now is optional; some supplies expose voltage only.
        let current_ma = self.read_micro("current_now").ok().map(|ua| ua / 1000.0);
        Ok(PowerReading { voltage_v, current_ma, flow: classify_flow(current_ma) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_classification() {
        assert_eq!(classify_flow(None), PowerFlow::Unknown);
        assert_eq!(classify_flow(Some(0.0)), PowerFlow::Idle);
        assert_eq!(classify_flow(Some(25.0)), PowerFlow::Idle);
        assert_eq!(classify_flow(Some(-25.0)), PowerFlow::Idle);
        assert_eq!(classify_flow(Some(120.0)), PowerFlow::Charging);
        assert_eq!(classify_flow(Some(-480.0)), PowerFlow::Discharging);
    }

    #[test]
    fn sysfs_node_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("voltage_now"), "3870000\n").unwrap();
        fs::write(dir.path().join("current_now"), "-412000\n").unwrap();
        let monitor = SysfsPowerMonitor::new(dir.path().to_path_buf());
        let reading = monitor.read().unwrap();
        assert!((reading.voltage_v - 3.87).abs() < 1e-9);
        assert_eq!(reading.current_ma, Some(-412.0));
        assert_eq!(reading.flow, PowerFlow::Discharging);
    }

    #[test]
    fn voltage_only_supply_reads_unknown_flow() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("voltage_now"), "4100000\n").unwrap();
        let monitor = SysfsPowerMonitor::new(dir.path().to_path_buf());
        let reading = monitor.read().unwrap();
        assert_eq!(reading.current_ma, None);
        assert_eq!(reading.flow, PowerFlow::Unknown);
    }

    #[test]
    fn missing_node_is_unavailable() {
        let monitor = SysfsPowerMonitor::new(PathBuf::from("/definitely/not/here"));
        assert!(matches!(monitor.read(), Err(NestwatchError::HardwareUnavailable(_))));
    }
}
