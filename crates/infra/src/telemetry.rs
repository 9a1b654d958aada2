//! Periodic power telemetry scheduler
//!
//! Polls the power monitor at a fixed interval and feeds each sample into
//! the battery estimator. Read failures are logged and skipped; the
//! estimator persists its own state. Lifecycle mirrors the other
//! background loops: cancellation token plus a bounded join on stop.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use nestwatch_core::BatteryEstimator;
use nestwatch_domain::NestwatchError;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::hardware::PowerMonitor;

/// Scheduler-specific errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Scheduler is already running
    #[error("Scheduler already running")]
    AlreadyRunning,

    /// Scheduler is not running
    #[error("Scheduler not running")]
    NotRunning,

    /// Stop timed out waiting for the loop to exit
    #[error("Operation timed out after {seconds}s")]
    Timeout {
        /// Join timeout that elapsed
        seconds: u64,
    },
}

impl From<SchedulerError> for NestwatchError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::AlreadyRunning | SchedulerError::NotRunning => {
                NestwatchError::InvalidInput(err.to_string())
            }
            SchedulerError::Timeout { .. } => NestwatchError::Internal(err.to_string()),
        }
    }
}

/// Convenience type alias for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Type alias for task handle to avoid complexity warnings
type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Interval scheduler feeding power telemetry into the battery estimator
pub struct PowerSampleScheduler {
    monitor: Arc<dyn PowerMonitor>,
    estimator: Arc<BatteryEstimator>,
    interval: Duration,
    cancellation_token: CancellationToken,
    task_handle: TaskHandle,
}

impl PowerSampleScheduler {
    pub fn new(
        monitor: Arc<dyn PowerMonitor>,
        estimator: Arc<BatteryEstimator>,
        interval: Duration,
    ) -> Self {
        Self {
            monitor,
            estimator,
            interval,
            cancellation_token: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the polling loop.
    ///
    /// # Errors
    /// Returns [`SchedulerError::AlreadyRunning`] when already started.
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        // New token so the scheduler can restart after a stop.
        self.cancellation_token = CancellationToken::new();
        let monitor = Arc::clone(&self.monitor);
        let estimator = Arc::clone(&self.estimator);
        let interval = self.interval;
        let cancel = self.cancellation_token.clone();

        let handle = tokio::spawn(async move {
            sample_loop(monitor, estimator, interval, cancel).await;
        });
        *self.task_handle.lock().await = Some(handle);

        info!(interval_secs = self.interval.as_secs(), "telemetry.scheduler_started");
        Ok(())
    }

    /// Stop the polling loop gracefully.
    ///
    /// # Errors
    /// [`SchedulerError::NotRunning`] when there is nothing to stop;
    /// [`SchedulerError::Timeout`] when the loop does not exit in time.
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation_token.cancel();
        if let Some(handle) = self.task_handle.lock().await.take() {
            let join_timeout = Duration::from_secs(5);
            match tokio::time::timeout(join_timeout, handle).await {
                Ok(_) => {}
                Err(_) => return Err(SchedulerError::Timeout { seconds: join_timeout.as_secs() }),
            }
        }
        info!("telemetry.scheduler_stopped");
        Ok(())
    }

    /// Whether the background loop is currently active
    pub fn is_running(&self) -> bool {
        self.task_handle
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|h| !h.is_finished()))
            .unwrap_or(false)
    }
}

async fn sample_loop(
    monitor: Arc<dyn PowerMonitor>,
    estimator: Arc<BatteryEstimator>,
    interval: Duration,
    cancel: CancellationToken,
) {
    debug!("telemetry.sample_loop_active");
    loop {
        match monitor.read() {
            Ok(reading) => {
                let estimate = estimator.record_sample(
                    unix_now(),
                    reading.voltage_v,
                    reading.current_ma,
                    reading.flow,
                );
                debug!(
                    voltage_v = reading.voltage_v,
                    soc_pct = estimate.soc_pct,
                    capacity_mah = estimate.capacity_mah,
                    time_to_empty_hours = estimate.time_to_empty_hours,
                    "telemetry.sample_recorded"
                );
            }
            Err(err) => {
                warn!(error = %err, "telemetry.read_failed");
            }
        }
        tokio::select! {
            _ = cancel.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }
    }
    debug!("telemetry.sample_loop_finished");
}

fn unix_now() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    use nestwatch_core::BatteryStateStore;
    use nestwatch_domain::{BatterySample, BatteryState, PowerFlow, PowerReading};

    use super::*;

    struct FixedMonitor {
        reads: AtomicUsize,
    }

    impl PowerMonitor for FixedMonitor {
        fn read(&self) -> nestwatch_domain::Result<PowerReading> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(PowerReading {
                voltage_v: 3.9,
                current_ma: Some(-300.0),
                flow: PowerFlow::Discharging,
            })
        }
    }

    #[derive(Default)]
    struct NullStore {
        samples: StdMutex<usize>,
    }

    impl BatteryStateStore for NullStore {
        fn load(&self) -> nestwatch_domain::Result<Option<BatteryState>> {
            Ok(None)
        }

        fn save(&self, _state: &BatteryState) -> nestwatch_domain::Result<()> {
            Ok(())
        }

        fn append_sample(&self, _sample: &BatterySample) -> nestwatch_domain::Result<()> {
            *self.samples.lock().unwrap() += 1;
            Ok(())
        }
    }

    #[tokio::test]
    async fn samples_flow_into_the_estimator() {
        let monitor = Arc::new(FixedMonitor { reads: AtomicUsize::new(0) });
        let store = Arc::new(NullStore::default());
        let estimator = Arc::new(BatteryEstimator::new(
            Arc::clone(&store) as Arc<dyn BatteryStateStore>,
            10_000.0,
        ));
        let mut scheduler = PowerSampleScheduler::new(
            Arc::clone(&monitor) as Arc<dyn PowerMonitor>,
            estimator,
            Duration::from_millis(20),
        );

        scheduler.start().await.unwrap();
        assert!(scheduler.is_running());
        assert!(matches!(scheduler.start().await, Err(SchedulerError::AlreadyRunning)));

        tokio::time::sleep(Duration::from_millis(90)).await;
        scheduler.stop().await.unwrap();

        let reads = monitor.reads.load(Ordering::SeqCst);
        assert!(reads >= 2, "expected repeated polls, saw {reads}");
        assert_eq!(*store.samples.lock().unwrap(), reads);
        assert!(matches!(scheduler.stop().await, Err(SchedulerError::NotRunning)));
    }

    #[tokio::test]
    async fn scheduler_can_restart_after_stop() {
        let monitor = Arc::new(FixedMonitor { reads: AtomicUsize::new(0) });
        let store = Arc::new(NullStore::default());
        let estimator = Arc::new(BatteryEstimator::new(
            Arc::clone(&store) as Arc<dyn BatteryStateStore>,
            10_000.0,
        ));
        let mut scheduler = PowerSampleScheduler::new(
            monitor as Arc<dyn PowerMonitor>,
            estimator,
            Duration::from_millis(20),
        );

        scheduler.start().await.unwrap();
        scheduler.stop().await.unwrap();
        scheduler.start().await.unwrap();
        assert!(scheduler.is_running());
        scheduler.stop().await.unwrap();
    }
}
