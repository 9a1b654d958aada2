//! Background supervisor for motion-triggered recordings

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::Local;
use nestwatch_domain::constants::{FALLBACK_TRIGGER_FLOOR_SECONDS, SLEEP_BACKOFF_SECONDS};
use nestwatch_domain::{
    CameraConfig, Config, NestwatchError, RecordingConfig, Result, RunControllerStatus,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::ports::{MotionSensor, RecordOptions, VideoRecorder};
use crate::camera::CameraUsageCoordinator;
use crate::sleep::SleepScheduler;

/// Type alias for task handles to avoid complexity warnings
type TaskHandle = Mutex<Option<JoinHandle<()>>>;

/// Mutable controller state shared with the recording task
#[derive(Debug, Default)]
struct RunState {
    recording_active: bool,
    recording_path: Option<PathBuf>,
    last_recording_end_unix: f64,
}

/// Everything the motion loop and recording task need
struct Shared {
    camera: Arc<CameraUsageCoordinator>,
    recorder: Arc<dyn VideoRecorder>,
    sensor: Mutex<Option<Arc<dyn MotionSensor>>>,
    scheduler: SleepScheduler,
    camera_cfg: CameraConfig,
    recording_cfg: RecordingConfig,
    poll_interval: Duration,
    state: Mutex<RunState>,
    recording_handle: TaskHandle,
}

/// State machine over {Idle, Recording}, driven by a dedicated polling
/// loop task.
///
/// At most one recording runs at a time; the cooldown and busy checks and
/// the transition into Recording are serialized so two near-simultaneous
/// triggers cannot both start captures.
pub struct RunModeController {
    shared: Arc<Shared>,
    cancel: Mutex<CancellationToken>,
    motion_handle: TaskHandle,
}

impl RunModeController {
    /// Build a controller from configuration and collaborators.
    ///
    /// `sensor` is the motion input; pass `None` when no PIR hardware is
    /// configured and the controller will rely on timer-based triggering.
    pub fn new(
        config: &Config,
        camera: Arc<CameraUsageCoordinator>,
        recorder: Arc<dyn VideoRecorder>,
        sensor: Option<Arc<dyn MotionSensor>>,
    ) -> Self {
        let shared = Shared {
            camera,
            recorder,
            sensor: Mutex::new(sensor),
            scheduler: SleepScheduler::from_specs(&config.sleep_windows),
            camera_cfg: config.camera.clone(),
            recording_cfg: config.recording.clone(),
            poll_interval: Duration::from_millis(config.motion.poll_interval_ms),
            state: Mutex::new(RunState::default()),
            recording_handle: Mutex::new(None),
        };
        Self {
            shared: Arc::new(shared),
            cancel: Mutex::new(CancellationToken::new()),
            motion_handle: Mutex::new(None),
        }
    }

    /// Start the motion-detection loop. Idempotent.
    ///
    /// # Errors
    /// Returns `Storage` when the recordings directory cannot be created.
    pub fn start(&self) -> Result<()> {
        let mut handle = lock(&self.motion_handle);
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            debug!("run_controller.already_started");
            return Ok(());
        }

        std::fs::create_dir_all(&self.shared.recording_cfg.recordings_dir).map_err(|e| {
            NestwatchError::Storage(format!(
                "cannot create recordings directory {}: {e}",
                self.shared.recording_cfg.recordings_dir.display()
            ))
        })?;
        if let Some(dir) = &self.shared.recording_cfg.mirror_dir {
            if let Err(err) = std::fs::create_dir_all(dir) {
                warn!(error = %err, path = %dir.display(), "run_controller.mirror_dir_unavailable");
            }
        }

        self.setup_sensor();

        let cancel = CancellationToken::new();
        *lock(&self.cancel) = cancel.clone();
        let shared = Arc::clone(&self.shared);
        *handle = Some(tokio::spawn(async move {
            motion_loop(shared, cancel).await;
        }));
        info!("run_controller.started");
        Ok(())
    }

    /// Signal the loop and any in-flight recording to terminate, then join
    /// both with bounded timeouts. Best-effort: proceeds on timeout rather
    /// than hanging shutdown.
    pub async fn stop(&self) {
        lock(&self.cancel).cancel();

        let motion = lock(&self.motion_handle).take();
        join_bounded(motion, Duration::from_secs(5), "motion loop").await;
        let recording = lock(&self.shared.recording_handle).take();
        join_bounded(recording, Duration::from_secs(10), "recording task").await;

        if let Some(sensor) = lock(&self.shared.sensor).as_ref() {
            sensor.cleanup();
        }
        info!("run_controller.stopped");
    }

    /// Snapshot of the current flags without blocking on the recording task
    pub fn status(&self) -> RunControllerStatus {
        let state = lock(&self.shared.state);
        RunControllerStatus {
            recording_active: state.recording_active,
            recording_path: state.recording_path.clone(),
            camera_in_use_by: self.shared.camera.in_use(),
            last_recording_end_unix: state.last_recording_end_unix,
        }
    }

    /// Configure the motion input, downgrading to timer-based triggering
    /// when the hardware is absent.
    fn setup_sensor(&self) {
        let mut guard = lock(&self.shared.sensor);
        if let Some(sensor) = guard.as_ref() {
            if let Err(err) = sensor.setup() {
                warn!(error = %err, "run_controller.motion_hardware_unavailable");
                *guard = None;
            }
        }
    }
}

/// Join a task handle with a timeout, logging rather than propagating
/// failures.
async fn join_bounded(handle: Option<JoinHandle<()>>, timeout: Duration, what: &str) {
    if let Some(handle) = handle {
        if tokio::time::timeout(timeout, handle).await.is_err() {
            warn!(task = what, timeout_secs = timeout.as_secs(), "run_controller.join_timed_out");
        }
    }
}

async fn motion_loop(shared: Arc<Shared>, cancel: CancellationToken) {
    debug!("run_controller.motion_loop_active");
    loop {
        if cancel.is_cancelled() {
            break;
        }

        if shared.scheduler.is_sleep_time(Local::now().time()) {
            if lock(&shared.state).recording_active {
                info!("run_controller.sleep_window_entered");
            }
            if wait_or_cancelled(&cancel, Duration::from_secs(SLEEP_BACKOFF_SECONDS)).await {
                break;
            }
            continue;
        }

        if shared.check_motion() {
            shared.try_begin_recording(&cancel);
        }
        if wait_or_cancelled(&cancel, shared.poll_interval).await {
            break;
        }
    }
    debug!("run_controller.motion_loop_finished");
}

/// Sleep for `period`, returning true when cancellation fired instead
async fn wait_or_cancelled(cancel: &CancellationToken, period: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        () = tokio::time::sleep(period) => false,
    }
}

impl Shared {
    /// Evaluate the motion predicate.
    ///
    /// With hardware: true iff any configured pin reads active. Without:
    /// timer-based fallback guaranteeing periodic sanity captures.
    fn check_motion(&self) -> bool {
        let guard = lock(&self.sensor);
        match guard.as_ref() {
            Some(sensor) => match sensor.read_any_active() {
                Ok(active) => active,
                Err(err) => {
                    warn!(error = %err, "run_controller.motion_read_failed");
                    false
                }
            },
            None => {
                let floor =
                    self.recording_cfg.min_gap_seconds.max(FALLBACK_TRIGGER_FLOOR_SECONDS) as f64;
                unix_now() - lock(&self.state).last_recording_end_unix > floor
            }
        }
    }

    /// Decide whether a recording may start and, if so, spawn the task.
    ///
    /// The whole decision runs under the recording-handle mutex so only
    /// one trigger can pass the active/cooldown/stale-handle checks.
    fn try_begin_recording(self: &Arc<Self>, cancel: &CancellationToken) {
        let mut handle = lock(&self.recording_handle);
        {
            let state = lock(&self.state);
            if state.recording_active {
                debug!("run_controller.trigger_while_recording");
                return;
            }
            let since_last = unix_now() - state.last_recording_end_unix;
            if since_last < self.recording_cfg.min_gap_seconds as f64 {
                debug!(
                    gap_secs = self.recording_cfg.min_gap_seconds,
                    "run_controller.trigger_within_cooldown"
                );
                return;
            }
        }
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            debug!("run_controller.previous_recording_still_exiting");
            return;
        }

        let shared = Arc::clone(self);
        let cancel = cancel.clone();
        *handle = Some(tokio::spawn(async move {
            record_motion(shared, cancel).await;
        }));
    }
}

async fn record_motion(shared: Arc<Shared>, cancel: CancellationToken) {
    let lease = match shared.camera.acquire("record").await {
        Ok(lease) => lease,
        Err(err) => {
            warn!(error = %err, "run_controller.lease_unavailable");
            return;
        }
    };

    lock(&shared.state).recording_active = true;

    let now = Local::now();
    let day_dir = shared.recording_cfg.recordings_dir.join(now.format("%Y-%m-%d").to_string());
    let path = day_dir.join(format!("{}.mp4", now.format("%H-%M-%S")));
    let outcome = match tokio::fs::create_dir_all(&day_dir).await {
        Ok(()) => {
            info!(path = %path.display(), "run_controller.recording_started");
            let opts = RecordOptions {
                device_index: shared.camera_cfg.device_index,
                width: shared.camera_cfg.record_width,
                height: shared.camera_cfg.record_height,
                fps: shared.camera_cfg.record_fps,
                max_seconds: shared.recording_cfg.max_seconds,
            };
            shared.recorder.record(&path, &opts, cancel).await
        }
        Err(err) => Err(NestwatchError::Storage(format!(
            "cannot create {}: {err}",
            day_dir.display()
        ))),
    };

    match outcome {
        Ok(()) => {
            lock(&shared.state).recording_path = Some(path.clone());
            mirror_recording(&shared, &path).await;
        }
        Err(err) => {
            error!(error = %err, path = %path.display(), "run_controller.recording_failed");
            if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                if remove_err.kind() != std::io::ErrorKind::NotFound {
                    warn!(error = %remove_err, "run_controller.partial_cleanup_failed");
                }
            }
        }
    }

    // Guaranteed cleanup path: flags cleared and cooldown stamped no
    // matter how the capture went; the lease releases on drop.
    {
        let mut state = lock(&shared.state);
        state.recording_active = false;
        state.last_recording_end_unix = unix_now();
    }
    info!("run_controller.recording_finished");
    drop(lease);
}

/// Best-effort copy of a finished recording to secondary storage
async fn mirror_recording(shared: &Shared, path: &std::path::Path) {
    let Some(mirror_root) = &shared.recording_cfg.mirror_dir else {
        return;
    };
    let Some(file_name) = path.file_name() else {
        return;
    };
    let target_dir = match path.parent().and_then(|p| p.file_name()) {
        Some(day) => mirror_root.join(day),
        None => mirror_root.clone(),
    };
    let target = target_dir.join(file_name);
    let copy = async {
        tokio::fs::create_dir_all(&target_dir).await?;
        tokio::fs::copy(path, &target).await
    };
    match copy.await {
        Ok(_) => info!(target = %target.display(), "run_controller.recording_mirrored"),
        Err(err) => {
            warn!(error = %err, target = %target.display(), "run_controller.mirror_failed");
        }
    }
}

fn unix_now() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or_default()
}

/// Lock a mutex, recovering the inner value if a holder panicked
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
