//! Adaptive battery estimation
//!
//! Converts raw voltage/current telemetry into a state-of-charge and
//! runtime projection, learning the real battery capacity from observed
//! charge cycles. Deliberately heuristic: a voltage lookup curve blended
//! with coulomb counting, not a physical cell model.

mod estimator;
mod ports;

pub use estimator::{voltage_to_soc, BatteryEstimator};
pub use ports::BatteryStateStore;
