//! Durable storage for the battery estimator
//!
//! Two files under the data directory: `battery_state.json` holding the
//! learned state (atomic replace on save) and `battery_samples.jsonl`, an
//! append-only line-delimited history for offline inspection.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use nestwatch_core::BatteryStateStore;
use nestwatch_domain::{BatterySample, BatteryState, NestwatchError, Result};
use tracing::warn;

const STATE_FILENAME: &str = "battery_state.json";
const HISTORY_FILENAME: &str = "battery_samples.jsonl";

/// File-backed implementation of [`BatteryStateStore`]
pub struct FileBatteryStore {
    state_path: PathBuf,
    history_path: PathBuf,
}

impl FileBatteryStore {
    /// Create a store under `data_dir`, creating the directory if needed.
    pub fn new(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir).map_err(|e| {
            NestwatchError::Storage(format!("cannot create {}: {e}", data_dir.display()))
        })?;
        Ok(Self {
            state_path: data_dir.join(STATE_FILENAME),
            history_path: data_dir.join(HISTORY_FILENAME),
        })
    }
}

impl BatteryStateStore for FileBatteryStore {
    fn load(&self) -> Result<Option<BatteryState>> {
        let content = match fs::read_to_string(&self.state_path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        match serde_json::from_str(&content) {
            Ok(state) => Ok(Some(state)),
            Err(err) => {
                // Corrupt state resets to defaults rather than failing.
                warn!(error = %err, path = %self.state_path.display(), "battery.state_corrupt");
                Ok(None)
            }
        }
    }

    fn save(&self, state: &BatteryState) -> Result<()> {
        let payload = serde_json::to_string(state)?;
        let tmp = self.state_path.with_extension("json.tmp");
        fs::write(&tmp, payload)
            .and_then(|()| fs::rename(&tmp, &self.state_path))
            .map_err(|e| NestwatchError::Storage(format!("cannot save battery state: {e}")))
    }

    fn append_sample(&self, sample: &BatterySample) -> Result<()> {
        let mut line = serde_json::to_string(sample)?;
        line.push('\n');
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.history_path)
            .and_then(|mut file| file.write_all(line.as_bytes()))
            .map_err(|e| NestwatchError::Storage(format!("cannot append battery sample: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use nestwatch_domain::PowerFlow;

    use super::*;

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBatteryStore::new(dir.path()).unwrap();
        assert!(store.load().unwrap().is_none());

        let state = BatteryState {
            learned_capacity_mah: Some(9_500.0),
            soc_coulomb: Some(0.75),
            samples_recorded: 42,
            ..BatteryState::default()
        };
        store.save(&state).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.learned_capacity_mah, Some(9_500.0));
        assert_eq!(loaded.soc_coulomb, Some(0.75));
        assert_eq!(loaded.samples_recorded, 42);
    }

    #[test]
    fn corrupt_state_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBatteryStore::new(dir.path()).unwrap();
        fs::write(dir.path().join(STATE_FILENAME), "{ broken").unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn history_appends_one_line_per_sample() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBatteryStore::new(dir.path()).unwrap();
        for i in 0..3 {
            store
                .append_sample(&BatterySample {
                    timestamp: f64::from(i) * 60.0,
                    voltage_v: 3.9,
                    current_ma: Some(-250.0),
                    flow: PowerFlow::Discharging,
                })
                .unwrap();
        }
        let content = fs::read_to_string(dir.path().join(HISTORY_FILENAME)).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        let parsed: BatterySample = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(parsed.timestamp, 120.0);
    }
}
