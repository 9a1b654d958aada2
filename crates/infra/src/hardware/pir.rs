//! PIR motion input over the sysfs GPIO interface

use std::fs;
use std::path::PathBuf;

use nestwatch_core::MotionSensor;
use nestwatch_domain::{NestwatchError, Result};
use tracing::{debug, warn};

const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// [`MotionSensor`] reading PIR pins through `/sys/class/gpio`
pub struct SysfsPirSensor {
    root: PathBuf,
    pins: Vec<u32>,
}

impl SysfsPirSensor {
    pub fn new(pins: Vec<u32>) -> Self {
        Self { root: PathBuf::from(SYSFS_GPIO_ROOT), pins }
    }

    /// Pin root override for tests
    #[cfg(test)]
    fn with_root(root: PathBuf, pins: Vec<u32>) -> Self {
        Self { root, pins }
    }

    fn pin_dir(&self, pin: u32) -> PathBuf {
        self.root.join(format!("gpio{pin}"))
    }
}

impl MotionSensor for SysfsPirSensor {
    fn setup(&self) -> Result<()> {
        if self.pins.is_empty() {
            return Err(NestwatchError::HardwareUnavailable("no PIR pins configured".into()));
        }
        if !self.root.exists() {
            return Err(NestwatchError::HardwareUnavailable(format!(
                "{} does not exist; GPIO not available",
                self.root.display()
            )));
        }
        for &pin in &self.pins {
            let dir = self.pin_dir(pin);
            if !dir.exists() {
                // Export can fail with EBUSY when the pin is already
                // claimed; surface anything else.
                fs::write(self.root.join("export"), pin.to_string()).map_err(|e| {
                    NestwatchError::HardwareUnavailable(format!("cannot export pin {pin}: {e}"))
                })?;
            }
            if let Err(err) = fs::write(dir.join("direction"), "in") {
                warn!(pin, error = %err, "pir.direction_set_failed");
            }
        }
        debug!(pins = ?self.pins, "pir.pins_configured");
        Ok(())
    }

    fn read_any_active(&self) -> Result<bool> {
        for &pin in &self.pins {
            let value = fs::read_to_string(self.pin_dir(pin).join("value")).map_err(|e| {
                NestwatchError::HardwareUnavailable(format!("cannot read pin {pin}: {e}"))
            })?;
            if value.trim() == "1" {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn cleanup(&self) {
        for &pin in &self.pins {
            if let Err(err) = fs::write(self.root.join("unexport"), pin.to_string()) {
                debug!(pin, error = %err, "pir.unexport_failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a fake sysfs tree with pre-exported pins
    fn fake_gpio(dir: &tempfile::TempDir, pins: &[(u32, &str)]) -> PathBuf {
        let root = dir.path().join("gpio");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("export"), "").unwrap();
        fs::write(root.join("unexport"), "").unwrap();
        for (pin, value) in pins {
            let pin_dir = root.join(format!("gpio{pin}"));
            fs::create_dir_all(&pin_dir).unwrap();
            fs::write(pin_dir.join("direction"), "in").unwrap();
            fs::write(pin_dir.join("value"), value).unwrap();
        }
        root
    }

    #[test]
    fn any_active_pin_triggers() {
        let dir = tempfile::tempdir().unwrap();
        let root = fake_gpio(&dir, &[(17, "0\n"), (27, "1\n")]);
        let sensor = SysfsPirSensor::with_root(root, vec![17, 27]);
        sensor.setup().unwrap();
        assert!(sensor.read_any_active().unwrap());
    }

    #[test]
    fn all_idle_pins_do_not_trigger() {
        let dir = tempfile::tempdir().unwrap();
        let root = fake_gpio(&dir, &[(17, "0\n"), (27, "0\n")]);
        let sensor = SysfsPirSensor::with_root(root, vec![17, 27]);
        assert!(!sensor.read_any_active().unwrap());
    }

    #[test]
    fn missing_gpio_tree_reports_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let sensor = SysfsPirSensor::with_root(dir.path().join("nope"), vec![17]);
        assert!(matches!(sensor.setup(), Err(NestwatchError::HardwareUnavailable(_))));
    }

    #[test]
    fn no_pins_reports_unavailable() {
        let sensor = SysfsPirSensor::new(Vec::new());
        assert!(matches!(sensor.setup(), Err(NestwatchError::HardwareUnavailable(_))));
    }
}
