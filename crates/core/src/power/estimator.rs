//! Learning-based battery estimation

use std::sync::{Arc, Mutex, PoisonError};

use nestwatch_domain::constants::{
    BATTERY_SOC_CURVE, CAPACITY_SMOOTHING, EMPTY_VOLTAGE_THRESHOLD, FULL_VOLTAGE_THRESHOLD,
    MAX_SAMPLE_GAP_SECONDS, MIN_CYCLE_FRACTION, MIN_RUNTIME_CURRENT_A,
};
use nestwatch_domain::{BatteryEstimate, BatterySample, BatteryState, PowerFlow};
use tracing::{info, warn};

use super::ports::BatteryStateStore;

/// Map a voltage reading to an approximate SoC percentage.
///
/// Linear interpolation between adjacent curve anchors; readings outside
/// the table clamp to 100% / 0%.
pub fn voltage_to_soc(voltage: f64) -> f64 {
    let curve = &BATTERY_SOC_CURVE;
    let (top_v, _) = curve[0];
    let (bottom_v, bottom_soc) = curve[curve.len() - 1];
    if voltage >= top_v {
        return 100.0;
    }
    if voltage <= bottom_v {
        return 0.0;
    }
    for pair in curve.windows(2) {
        let (v_hi, soc_hi) = pair[0];
        let (v_lo, soc_lo) = pair[1];
        if v_lo <= voltage && voltage <= v_hi {
            let span = v_hi - v_lo;
            if span <= 0.0 {
                return soc_lo;
            }
            let fraction = (voltage - v_lo) / span;
            return soc_lo + fraction * (soc_hi - soc_lo);
        }
    }
    bottom_soc.clamp(0.0, 100.0)
}

/// Persist battery telemetry and learn refined capacity/runtime estimates.
///
/// Safe to call from any context; internal state sits behind a mutex so
/// the telemetry poller and ad hoc status calls may interleave. Store
/// failures are logged and absorbed: the in-memory estimate is still
/// returned and the next successful write catches up.
pub struct BatteryEstimator {
    store: Arc<dyn BatteryStateStore>,
    nominal_capacity_mah: f64,
    state: Mutex<BatteryState>,
}

impl BatteryEstimator {
    /// Create an estimator backed by `store`, loading any persisted state.
    ///
    /// A missing or unreadable state file starts from defaults.
    pub fn new(store: Arc<dyn BatteryStateStore>, nominal_capacity_mah: f64) -> Self {
        let state = match store.load() {
            Ok(Some(state)) => state,
            Ok(None) => BatteryState::default(),
            Err(err) => {
                warn!(error = %err, "battery.state_load_failed");
                BatteryState::default()
            }
        };
        Self { store, nominal_capacity_mah, state: Mutex::new(state) }
    }

    /// Record a telemetry sample and return updated estimates.
    ///
    /// Appends the sample to the history log, updates and persists the
    /// learned state, and derives a fresh estimate. Irregular timestamps
    /// degrade gracefully: gaps beyond the reliability window skip coulomb
    /// integration rather than corrupting the counters.
    pub fn record_sample(
        &self,
        timestamp_unix: f64,
        voltage_v: f64,
        current_ma: Option<f64>,
        flow: PowerFlow,
    ) -> BatteryEstimate {
        let current_a = current_ma.unwrap_or(0.0) / 1000.0;

        let sample = BatterySample { timestamp: timestamp_unix, voltage_v, current_ma, flow };
        if let Err(err) = self.store.append_sample(&sample) {
            warn!(error = %err, "battery.history_append_failed");
        }

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.update_state(&mut state, timestamp_unix, voltage_v, current_a, flow);
        if let Err(err) = self.store.save(&state) {
            warn!(error = %err, "battery.state_save_failed");
        }
        self.build_estimate(&state, voltage_v, current_a, flow)
    }

    fn update_state(
        &self,
        state: &mut BatteryState,
        timestamp: f64,
        voltage_v: f64,
        current_a: f64,
        flow: PowerFlow,
    ) {
        let capacity_ah_ref =
            (state.learned_capacity_mah.unwrap_or(self.nominal_capacity_mah) / 1000.0).max(0.1);

        // Coulomb counting when consecutive samples are close enough and
        // agree on flow direction.
        if let Some(last_timestamp) = state.last_sample_unix {
            let delta_seconds = timestamp - last_timestamp;
            if delta_seconds > 0.0 && delta_seconds <= MAX_SAMPLE_GAP_SECONDS {
                let delta_hours = delta_seconds / 3600.0;
                let avg_current = (current_a.abs() + state.last_current_a.abs()) / 2.0;
                match (state.last_flow, flow) {
                    (Some(PowerFlow::Discharging), PowerFlow::Discharging) => {
                        let discharge_ah = avg_current * delta_hours;
                        state.discharge_since_full_ah += discharge_ah;
                        if let Some(soc) = state.soc_coulomb {
                            state.soc_coulomb = Some((soc - discharge_ah / capacity_ah_ref).max(0.0));
                        }
                    }
                    (Some(PowerFlow::Charging), PowerFlow::Charging) => {
                        let charge_ah = avg_current * delta_hours;
                        state.charge_since_empty_ah += charge_ah;
                        if let Some(soc) = state.soc_coulomb {
                            state.soc_coulomb = Some((soc + charge_ah / capacity_ah_ref).min(1.0));
                        }
                    }
                    _ => {}
                }
            }
        }

        // Near-full / near-empty events reset the counters and refine the
        // learned capacity once a deep-enough cycle has been observed.
        let nominal_ah = (self.nominal_capacity_mah / 1000.0).max(0.1);
        let min_cycle_ah = nominal_ah * MIN_CYCLE_FRACTION;

        if flow == PowerFlow::Charging && voltage_v >= FULL_VOLTAGE_THRESHOLD {
            if state.discharge_since_full_ah >= min_cycle_ah {
                self.learn_capacity(state, state.discharge_since_full_ah * 1000.0);
            }
            state.soc_coulomb = Some(1.0);
            state.discharge_since_full_ah = 0.0;
            state.charge_since_empty_ah = 0.0;
        } else if flow == PowerFlow::Discharging && voltage_v <= EMPTY_VOLTAGE_THRESHOLD {
            if state.charge_since_empty_ah >= min_cycle_ah {
                self.learn_capacity(state, state.charge_since_empty_ah * 1000.0);
            }
            state.soc_coulomb = Some(0.0);
            state.charge_since_empty_ah = 0.0;
        }

        // First obvious full/empty encounter initialises the coulomb counter.
        if state.soc_coulomb.is_none() {
            if voltage_v >= FULL_VOLTAGE_THRESHOLD && flow == PowerFlow::Charging {
                state.soc_coulomb = Some(1.0);
            } else if voltage_v <= EMPTY_VOLTAGE_THRESHOLD && flow == PowerFlow::Discharging {
                state.soc_coulomb = Some(0.0);
            }
        }

        state.last_sample_unix = Some(timestamp);
        state.last_current_a = current_a;
        state.last_flow = Some(flow);
        state.samples_recorded += 1;
    }

    fn learn_capacity(&self, state: &mut BatteryState, observed_capacity_mah: f64) {
        let updated = match state.learned_capacity_mah {
            Some(previous) => {
                (1.0 - CAPACITY_SMOOTHING) * previous + CAPACITY_SMOOTHING * observed_capacity_mah
            }
            None => observed_capacity_mah,
        };
        let floored = updated.max(self.nominal_capacity_mah * MIN_CYCLE_FRACTION);
        info!(
            observed_mah = observed_capacity_mah,
            learned_mah = floored,
            "battery.capacity_learned"
        );
        state.learned_capacity_mah = Some(floored);
    }

    fn build_estimate(
        &self,
        state: &BatteryState,
        voltage_v: f64,
        current_a: f64,
        flow: PowerFlow,
    ) -> BatteryEstimate {
        let capacity_mah = state.learned_capacity_mah.unwrap_or(self.nominal_capacity_mah);
        let voltage_soc = voltage_to_soc(voltage_v);
        let blended = match state.soc_coulomb {
            Some(coulomb) => (voltage_soc + coulomb * 100.0) / 2.0,
            None => voltage_soc,
        }
        .clamp(0.0, 100.0);

        let mut time_to_empty = None;
        let mut time_to_full = None;
        if flow == PowerFlow::Discharging && current_a.abs() >= MIN_RUNTIME_CURRENT_A {
            let available_ah = (capacity_mah / 1000.0) * (blended / 100.0);
            if available_ah > 0.0 {
                time_to_empty = Some(available_ah / current_a.abs());
            }
        } else if flow == PowerFlow::Charging && current_a >= MIN_RUNTIME_CURRENT_A {
            let remaining_ah = (capacity_mah / 1000.0) * (1.0 - blended / 100.0).max(0.0);
            if remaining_ah > 0.0 {
                time_to_full = Some(remaining_ah / current_a);
            }
        }

        BatteryEstimate {
            soc_pct: blended,
            voltage_soc_pct: voltage_soc,
            coulomb_soc_pct: state.soc_coulomb.map(|soc| soc * 100.0),
            capacity_mah,
            time_to_empty_hours: time_to_empty,
            time_to_full_hours: time_to_full,
            samples_recorded: state.samples_recorded,
        }
    }
}

#[cfg(test)]
mod tests {
    use nestwatch_domain::Result;

    use super::*;

    /// In-memory store; `None` inner state simulates a missing file.
    #[derive(Default)]
    struct MemoryStore {
        state: Mutex<Option<BatteryState>>,
        samples: Mutex<Vec<BatterySample>>,
    }

    impl BatteryStateStore for MemoryStore {
        fn load(&self) -> Result<Option<BatteryState>> {
            Ok(self.state.lock().unwrap().clone())
        }

        fn save(&self, state: &BatteryState) -> Result<()> {
            *self.state.lock().unwrap() = Some(state.clone());
            Ok(())
        }

        fn append_sample(&self, sample: &BatterySample) -> Result<()> {
            self.samples.lock().unwrap().push(sample.clone());
            Ok(())
        }
    }

    fn estimator() -> (Arc<MemoryStore>, BatteryEstimator) {
        let store = Arc::new(MemoryStore::default());
        let est = BatteryEstimator::new(Arc::clone(&store) as Arc<dyn BatteryStateStore>, 10_000.0);
        (store, est)
    }

    #[test]
    fn voltage_mapping_is_idempotent_and_clamped() {
        assert!((voltage_to_soc(3.84) - 50.0).abs() < 1e-9);
        assert_eq!(voltage_to_soc(3.84), voltage_to_soc(3.84));
        assert_eq!(voltage_to_soc(5.0), 100.0);
        assert_eq!(voltage_to_soc(2.0), 0.0);
        // Between the 4.00/80 and 3.95/72 anchors.
        let mid = voltage_to_soc(3.975);
        assert!(mid > 72.0 && mid < 80.0);
    }

    #[test]
    fn soc_stays_in_range_at_extremes() {
        let (_, est) = estimator();
        let high = est.record_sample(0.0, 5.0, Some(-100.0), PowerFlow::Discharging);
        assert!(high.soc_pct >= 0.0 && high.soc_pct <= 100.0);
        let low = est.record_sample(60.0, 2.0, Some(-100.0), PowerFlow::Discharging);
        assert!(low.soc_pct >= 0.0 && low.soc_pct <= 100.0);
        assert_eq!(low.samples_recorded, 2);
    }

    #[test]
    fn coulomb_soc_is_clamped_under_adversarial_input() {
        let (_, est) = estimator();
        // Initialise coulomb tracking at full.
        est.record_sample(0.0, 4.18, Some(500.0), PowerFlow::Charging);
        // Absurd discharge currents must never push the counter outside range.
        est.record_sample(540.0, 3.80, Some(-500_000.0), PowerFlow::Discharging);
        let estimate = est.record_sample(600.0, 3.80, Some(-500_000.0), PowerFlow::Discharging);
        let coulomb = estimate.coulomb_soc_pct.unwrap();
        assert!(coulomb >= 0.0 && coulomb <= 100.0);
    }

    #[test]
    fn long_gap_skips_coulomb_integration() {
        let (store, est) = estimator();
        est.record_sample(0.0, 4.18, Some(500.0), PowerFlow::Charging);
        est.record_sample(60.0, 3.90, Some(-1000.0), PowerFlow::Discharging);
        est.record_sample(120.0, 3.90, Some(-1000.0), PowerFlow::Discharging);
        let accumulated =
            store.state.lock().unwrap().as_ref().unwrap().discharge_since_full_ah;
        assert!(accumulated > 0.0);

        // A 700 s gap exceeds the reliability window; the counter must not move.
        est.record_sample(820.0, 3.88, Some(-1000.0), PowerFlow::Discharging);
        let after_gap = store.state.lock().unwrap().as_ref().unwrap().discharge_since_full_ah;
        assert_eq!(accumulated, after_gap);
    }

    #[test]
    fn full_cycle_refines_learned_capacity() {
        let (store, est) = estimator();
        // Start at full to pin the coulomb counter and reset accumulators.
        est.record_sample(0.0, 4.18, Some(800.0), PowerFlow::Charging);

        // Discharge at 24 A in 6 min steps; each integrated pair adds
        // 2.4 Ah, comfortably past the 20% (2 Ah) minimum cycle.
        let mut ts = 0.0;
        for _ in 0..25 {
            ts += 360.0;
            est.record_sample(ts, 3.80, Some(-24_000.0), PowerFlow::Discharging);
        }
        let cycle_ah = store.state.lock().unwrap().as_ref().unwrap().discharge_since_full_ah;
        assert!(cycle_ah >= 2.0, "cycle too shallow: {cycle_ah}");

        // Return to full; observed capacity blends into the learned value.
        ts += 60.0;
        let estimate = est.record_sample(ts, 4.18, Some(800.0), PowerFlow::Charging);
        let learned = store.state.lock().unwrap().as_ref().unwrap().learned_capacity_mah;
        let learned = learned.unwrap();
        let observed_mah = cycle_ah * 1000.0;
        // First observation is taken as-is (no previous learned value).
        assert!((learned - observed_mah).abs() < 1.0);
        assert_eq!(estimate.capacity_mah, learned);
        // Accumulators reset after the near-full event.
        assert_eq!(store.state.lock().unwrap().as_ref().unwrap().discharge_since_full_ah, 0.0);
    }

    #[test]
    fn second_cycle_is_smoothed_not_replaced() {
        let (store, est) = estimator();
        est.record_sample(0.0, 4.18, Some(800.0), PowerFlow::Charging);
        let mut ts = 0.0;
        for _ in 0..25 {
            ts += 360.0;
            est.record_sample(ts, 3.80, Some(-24_000.0), PowerFlow::Discharging);
        }
        ts += 60.0;
        est.record_sample(ts, 4.18, Some(800.0), PowerFlow::Charging);
        let first = store.state.lock().unwrap().as_ref().unwrap().learned_capacity_mah.unwrap();

        // A deeper second cycle moves the estimate toward, not onto, the
        // new observation.
        for _ in 0..25 {
            ts += 360.0;
            est.record_sample(ts, 3.80, Some(-36_000.0), PowerFlow::Discharging);
        }
        let second_cycle_ah =
            store.state.lock().unwrap().as_ref().unwrap().discharge_since_full_ah;
        ts += 60.0;
        est.record_sample(ts, 4.18, Some(800.0), PowerFlow::Charging);
        let second = store.state.lock().unwrap().as_ref().unwrap().learned_capacity_mah.unwrap();
        let observed = second_cycle_ah * 1000.0;
        assert!(second > first);
        assert!(second < observed);
    }

    #[test]
    fn runtime_projection_at_half_charge() {
        let store = Arc::new(MemoryStore::default());
        // Seed a learned state at exactly 50% coulomb SoC with matching
        // voltage (3.84 V -> 50%) so the blend stays at 50.
        store
            .save(&BatteryState {
                soc_coulomb: Some(0.5),
                ..BatteryState::default()
            })
            .unwrap();
        let est = BatteryEstimator::new(Arc::clone(&store) as Arc<dyn BatteryStateStore>, 10_000.0);
        let estimate = est.record_sample(0.0, 3.84, Some(-1000.0), PowerFlow::Discharging);
        assert!((estimate.soc_pct - 50.0).abs() < 1e-9);
        // available 5.0 Ah at 1.0 A -> 5 hours
        let tte = estimate.time_to_empty_hours.unwrap();
        assert!((tte - 5.0).abs() < 1e-9);
        assert!(estimate.time_to_full_hours.is_none());
    }

    #[test]
    fn noise_floor_suppresses_projection() {
        let (_, est) = estimator();
        let estimate = est.record_sample(0.0, 3.84, Some(-30.0), PowerFlow::Discharging);
        assert!(estimate.time_to_empty_hours.is_none());
        let idle = est.record_sample(60.0, 3.84, Some(-500.0), PowerFlow::Idle);
        assert!(idle.time_to_empty_hours.is_none());
        assert!(idle.time_to_full_hours.is_none());
    }

    #[test]
    fn state_survives_across_estimator_instances() {
        let store = Arc::new(MemoryStore::default());
        {
            let est =
                BatteryEstimator::new(Arc::clone(&store) as Arc<dyn BatteryStateStore>, 10_000.0);
            est.record_sample(0.0, 4.18, Some(500.0), PowerFlow::Charging);
            est.record_sample(60.0, 4.18, Some(500.0), PowerFlow::Charging);
        }
        let est = BatteryEstimator::new(Arc::clone(&store) as Arc<dyn BatteryStateStore>, 10_000.0);
        let estimate = est.record_sample(120.0, 4.18, Some(500.0), PowerFlow::Charging);
        assert_eq!(estimate.samples_recorded, 3);
        assert_eq!(estimate.coulomb_soc_pct, Some(100.0));
    }

    #[test]
    fn history_log_receives_every_sample() {
        let (store, est) = estimator();
        est.record_sample(0.0, 3.9, Some(-200.0), PowerFlow::Discharging);
        est.record_sample(60.0, 3.9, None, PowerFlow::Unknown);
        let samples = store.samples.lock().unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].current_ma, None);
    }
}
