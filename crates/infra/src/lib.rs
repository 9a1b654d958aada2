//! # Nestwatch Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - The cross-process mode lock (PID-checked lock file)
//! - Battery state persistence (JSON state + JSONL history)
//! - Configuration loading (environment + file probing)
//! - Hardware-facing adapters (ffmpeg recorder, sysfs PIR and power supply)
//! - The periodic power telemetry scheduler
//!
//! ## Architecture
//! - Implements traits defined in `nestwatch-core`
//! - Contains all "impure" code (I/O, processes, sysfs)

pub mod config;
pub mod hardware;
pub mod mode_lock;
pub mod persistence;
pub mod telemetry;

// Re-export commonly used items
pub use mode_lock::{LivenessProbe, ModeLock, SystemLiveness};
pub use persistence::FileBatteryStore;
pub use telemetry::{PowerSampleScheduler, SchedulerError};
