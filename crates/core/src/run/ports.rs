//! Collaborator ports for the run controller

use std::path::Path;

use async_trait::async_trait;
use nestwatch_domain::Result;
use tokio_util::sync::CancellationToken;

/// Capture parameters handed to the video recorder
#[derive(Debug, Clone)]
pub struct RecordOptions {
    /// V4L2 device index
    pub device_index: u32,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Hard wall-clock cap on the recording, independent of cancellation
    pub max_seconds: u64,
}

/// Video capture collaborator.
///
/// Implementations must honor both `cancel` and `max_seconds` as hard
/// stops, leaving a valid container file up to the point of cancellation.
#[async_trait]
pub trait VideoRecorder: Send + Sync {
    /// Record to `output` until the cap elapses or `cancel` fires.
    ///
    /// # Errors
    /// `HardwareUnavailable` when the device cannot be opened,
    /// `CaptureFailed` for anything that goes wrong mid-capture.
    async fn record(
        &self,
        output: &Path,
        opts: &RecordOptions,
        cancel: CancellationToken,
    ) -> Result<()>;
}

/// Motion input collaborator (PIR pins or similar).
///
/// Absence of hardware is a supported condition: a failed `setup` makes
/// the controller fall back to timer-based triggering.
pub trait MotionSensor: Send + Sync {
    /// Claim and configure the input hardware
    fn setup(&self) -> Result<()>;
    /// Whether any configured input currently reads active
    fn read_any_active(&self) -> Result<bool>;
    /// Release the input hardware; must not fail
    fn cleanup(&self);
}
