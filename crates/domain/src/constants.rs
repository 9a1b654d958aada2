//! Battery chemistry and controller tuning constants

/// Approximate Li-Ion discharge curve (voltage -> state-of-charge %).
///
/// Monotonic descending anchor points; readings between anchors are
/// linearly interpolated, readings outside the table clamp to 100% / 0%.
pub const BATTERY_SOC_CURVE: [(f64, f64); 24] = [
    (4.20, 100.0),
    (4.15, 98.0),
    (4.12, 95.0),
    (4.10, 93.0),
    (4.05, 90.0),
    (4.00, 80.0),
    (3.95, 72.0),
    (3.92, 65.0),
    (3.90, 60.0),
    (3.87, 55.0),
    (3.84, 50.0),
    (3.80, 45.0),
    (3.78, 40.0),
    (3.75, 35.0),
    (3.72, 30.0),
    (3.70, 27.0),
    (3.68, 24.0),
    (3.65, 20.0),
    (3.60, 15.0),
    (3.55, 10.0),
    (3.50, 6.0),
    (3.45, 3.0),
    (3.40, 1.0),
    (3.35, 0.0),
];

/// Charging at or above this voltage counts as a near-full event
pub const FULL_VOLTAGE_THRESHOLD: f64 = 4.15;

/// Discharging at or below this voltage counts as a near-empty event
pub const EMPTY_VOLTAGE_THRESHOLD: f64 = 3.40;

/// Ignore gaps longer than this for coulomb counting (seconds)
pub const MAX_SAMPLE_GAP_SECONDS: f64 = 600.0;

/// Require at least this fraction of nominal capacity in a cycle before
/// updating the learned capacity
pub const MIN_CYCLE_FRACTION: f64 = 0.2;

/// EWMA weight toward a newly observed capacity
pub const CAPACITY_SMOOTHING: f64 = 0.3;

/// Below this current (amps) noise dominates and no runtime is projected
pub const MIN_RUNTIME_CURRENT_A: f64 = 0.05;

/// Currents inside this band (milliamps, absolute) are classified as idle
pub const IDLE_CURRENT_BAND_MA: f64 = 30.0;

/// Floor for the timer-based fallback trigger when no PIR hardware is
/// available (seconds)
pub const FALLBACK_TRIGGER_FLOOR_SECONDS: u64 = 120;

/// How long the motion loop waits between polls during a sleep window
pub const SLEEP_BACKOFF_SECONDS: u64 = 30;
