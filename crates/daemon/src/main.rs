//! Nestwatch - autonomous bird-house camera supervisor
//!
//! Startup wiring: logging, configuration, the cross-process mode lock,
//! then either the autonomous controller stack or an idle diagnostics
//! hold, shut down cleanly on ctrl-c.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use nestwatch_core::{BatteryEstimator, CameraUsageCoordinator, MotionSensor, RunModeController, VideoRecorder};
use nestwatch_domain::{Config, OperatingMode, Result};
use nestwatch_infra::hardware::{FfmpegRecorder, PowerMonitor, SysfsPirSensor, SysfsPowerMonitor};
use nestwatch_infra::{config, FileBatteryStore, ModeLock, PowerSampleScheduler, SystemLiveness};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Ok(path) = dotenvy::dotenv() {
        info!(path = %path.display(), "env_file_loaded");
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "nestwatch.startup_failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let config = config::load()?;
    info!(mode = %config.mode, "nestwatch.starting");

    // Refusing to start on a mode conflict is the point: a diagnostics
    // session and the autonomous supervisor must never share the camera.
    let lock = ModeLock::acquire(&config.mode_lock_path, config.mode, Arc::new(SystemLiveness))?;

    match config.mode {
        OperatingMode::Autonomous => run_autonomous(&config).await?,
        OperatingMode::Diagnostics => {
            info!("nestwatch.diagnostics_hold");
            wait_for_shutdown().await;
        }
    }

    lock.release();
    info!("nestwatch.stopped");
    Ok(())
}

async fn run_autonomous(config: &Config) -> Result<()> {
    let camera = Arc::new(CameraUsageCoordinator::new());
    let recorder: Arc<dyn VideoRecorder> = Arc::new(FfmpegRecorder);
    let sensor: Option<Arc<dyn MotionSensor>> = if config.motion.pir_pins.is_empty() {
        None
    } else {
        Some(Arc::new(SysfsPirSensor::new(config.motion.pir_pins.clone())))
    };

    let controller = RunModeController::new(config, Arc::clone(&camera), recorder, sensor);
    controller.start()?;

    let mut telemetry = match &config.power.supply_dir {
        Some(supply_dir) => {
            let store = Arc::new(FileBatteryStore::new(&config.power.data_dir)?);
            let estimator =
                Arc::new(BatteryEstimator::new(store, config.power.nominal_capacity_mah));
            let monitor: Arc<dyn PowerMonitor> =
                Arc::new(SysfsPowerMonitor::new(supply_dir.clone()));
            let mut scheduler = PowerSampleScheduler::new(
                monitor,
                estimator,
                Duration::from_secs(config.power.sample_interval_secs),
            );
            if let Err(err) = scheduler.start().await {
                warn!(error = %err, "nestwatch.telemetry_start_failed");
            }
            Some(scheduler)
        }
        None => {
            info!("nestwatch.telemetry_disabled");
            None
        }
    };

    wait_for_shutdown().await;

    if let Some(scheduler) = telemetry.as_mut() {
        if let Err(err) = scheduler.stop().await {
            warn!(error = %err, "nestwatch.telemetry_stop_failed");
        }
    }
    controller.stop().await;
    Ok(())
}

async fn wait_for_shutdown() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("nestwatch.shutdown_signal"),
        Err(err) => warn!(error = %err, "nestwatch.signal_listen_failed"),
    }
}
