//! Quiet-hours scheduling
//!
//! The autonomous controller suppresses motion evaluation during configured
//! daily windows. Windows are inclusive of their start and exclusive of
//! their end, and may wrap around midnight (`22:00`–`06:00`).

use chrono::NaiveTime;
use nestwatch_domain::SleepWindowSpec;
use tracing::{debug, info, warn};

/// Inclusive-exclusive window representing quiet hours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepWindow {
    start: NaiveTime,
    end: NaiveTime,
}

impl SleepWindow {
    /// Whether `value` falls inside this window.
    ///
    /// A window whose start is later than its end spans midnight.
    pub fn contains(&self, value: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= value && value < self.end
        } else {
            value >= self.start || value < self.end
        }
    }
}

/// Determine whether the system should be in a low-power state
#[derive(Debug, Clone, Default)]
pub struct SleepScheduler {
    windows: Vec<SleepWindow>,
}

impl SleepScheduler {
    /// Build a scheduler from configured window specs.
    ///
    /// Malformed entries are logged and skipped; a scheduler with zero
    /// valid windows always reports "not sleep time".
    pub fn from_specs(specs: &[SleepWindowSpec]) -> Self {
        let mut windows = Vec::new();
        for spec in specs {
            match (parse_time(&spec.start), parse_time(&spec.end)) {
                (Some(start), Some(end)) => windows.push(SleepWindow { start, end }),
                _ => {
                    warn!(start = %spec.start, end = %spec.end, "sleep.invalid_window");
                }
            }
        }
        if windows.is_empty() {
            debug!("sleep.no_windows_configured");
        } else {
            info!(count = windows.len(), "sleep.windows_configured");
        }
        Self { windows }
    }

    /// Whether `now` falls inside any configured quiet window
    pub fn is_sleep_time(&self, now: NaiveTime) -> bool {
        self.windows.iter().any(|w| w.contains(now))
    }
}

/// Parse a `"HH:MM"` time-of-day string.
///
/// Stricter than chrono's own parser: exactly two colon-separated fields,
/// both in range.
fn parse_time(value: &str) -> Option<NaiveTime> {
    let mut parts = value.split(':');
    let hour: u32 = parts.next()?.trim().parse().ok()?;
    let minute: u32 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    NaiveTime::from_hms_opt(hour, minute, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(start: &str, end: &str) -> SleepWindowSpec {
        SleepWindowSpec { start: start.to_string(), end: end.to_string() }
    }

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn normal_window_is_half_open() {
        let scheduler = SleepScheduler::from_specs(&[spec("13:00", "15:30")]);
        assert!(!scheduler.is_sleep_time(at(12, 59)));
        assert!(scheduler.is_sleep_time(at(13, 0)));
        assert!(scheduler.is_sleep_time(at(15, 29)));
        assert!(!scheduler.is_sleep_time(at(15, 30)));
    }

    #[test]
    fn wraparound_window_spans_midnight() {
        let scheduler = SleepScheduler::from_specs(&[spec("22:00", "06:00")]);
        assert!(scheduler.is_sleep_time(at(22, 0)));
        assert!(scheduler.is_sleep_time(at(23, 59)));
        assert!(scheduler.is_sleep_time(at(0, 0)));
        assert!(scheduler.is_sleep_time(at(5, 59)));
        assert!(!scheduler.is_sleep_time(at(6, 0)));
        assert!(!scheduler.is_sleep_time(at(12, 0)));
    }

    #[test]
    fn malformed_windows_are_dropped() {
        let scheduler = SleepScheduler::from_specs(&[
            spec("25:00", "06:00"),
            spec("22:00", "6pm"),
            spec("22", "06:00"),
            spec("10:00", "11:00"),
        ]);
        assert!(scheduler.is_sleep_time(at(10, 30)));
        assert!(!scheduler.is_sleep_time(at(23, 0)));
    }

    #[test]
    fn no_windows_means_never_asleep() {
        let scheduler = SleepScheduler::from_specs(&[]);
        assert!(!scheduler.is_sleep_time(at(0, 0)));
        assert!(!scheduler.is_sleep_time(at(12, 0)));
    }

    #[test]
    fn multiple_windows_are_unioned() {
        let scheduler = SleepScheduler::from_specs(&[spec("01:00", "02:00"), spec("22:00", "23:00")]);
        assert!(scheduler.is_sleep_time(at(1, 30)));
        assert!(scheduler.is_sleep_time(at(22, 30)));
        assert!(!scheduler.is_sleep_time(at(12, 0)));
    }
}
