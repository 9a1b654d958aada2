//! Hardware-facing adapters
//!
//! Thin I/O implementations of the core ports: video capture through
//! ffmpeg, PIR motion input and power telemetry through sysfs.

mod pir;
mod power;
mod recorder;

pub use pir::SysfsPirSensor;
pub use power::{classify_flow, PowerMonitor, SysfsPowerMonitor};
pub use recorder::FfmpegRecorder;
