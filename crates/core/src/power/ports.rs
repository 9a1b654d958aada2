//! Persistence port for the battery estimator

use nestwatch_domain::{BatterySample, BatteryState, Result};

/// Durable storage for learned battery state and the raw sample history.
///
/// Implementations must make `save` atomic enough that a crash mid-write
/// leaves either the old or the new content, never a truncated hybrid.
/// A corrupt state file is reported as `Ok(None)`, not an error.
pub trait BatteryStateStore: Send + Sync {
    /// Load the persisted state, if any
    fn load(&self) -> Result<Option<BatteryState>>;
    /// Persist the current state
    fn save(&self, state: &BatteryState) -> Result<()>;
    /// Append one raw sample to the history log
    fn append_sample(&self, sample: &BatterySample) -> Result<()>;
}
