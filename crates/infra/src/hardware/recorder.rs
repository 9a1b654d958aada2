//! Video capture through ffmpeg
//!
//! Records from a V4L2 device into an mp4 container. The `-t` argument
//! enforces the hard duration cap; cancellation kills the child process
//! and reaps it before returning.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use nestwatch_core::{RecordOptions, VideoRecorder};
use nestwatch_domain::{NestwatchError, Result};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// [`VideoRecorder`] implementation shelling out to ffmpeg
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegRecorder;

#[async_trait]
impl VideoRecorder for FfmpegRecorder {
    async fn record(
        &self,
        output: &Path,
        opts: &RecordOptions,
        cancel: CancellationToken,
    ) -> Result<()> {
        let device = format!("/dev/video{}", opts.device_index);
        let mut child = Command::new("ffmpeg")
            .arg("-hide_banner")
            .args(["-loglevel", "error"])
            .arg("-y")
            .args(["-f", "v4l2"])
            .args(["-framerate", &format!("{}", opts.fps)])
            .args(["-video_size", &format!("{}x{}", opts.width, opts.height)])
            .args(["-i", &device])
            .args(["-t", &opts.max_seconds.to_string()])
            .arg("-an")
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::NotFound => {
                    NestwatchError::HardwareUnavailable("ffmpeg is not installed".into())
                }
                _ => NestwatchError::CaptureFailed(format!("cannot start ffmpeg: {err}")),
            })?;

        tokio::select! {
            status = child.wait() => {
                let status = status
                    .map_err(|e| NestwatchError::CaptureFailed(format!("ffmpeg wait failed: {e}")))?;
                if status.success() {
                    debug!(path = %output.display(), "recorder.capture_complete");
                    Ok(())
                } else {
                    Err(NestwatchError::CaptureFailed(format!(
                        "ffmpeg exited with {status} for {device}"
                    )))
                }
            }
            _ = cancel.cancelled() => {
                debug!(path = %output.display(), "recorder.capture_cancelled");
                if let Err(err) = child.start_kill() {
                    warn!(error = %err, "recorder.kill_failed");
                }
                let _ = child.wait().await;
                Ok(())
            }
        }
    }
}
