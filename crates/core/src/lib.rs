//! # Nestwatch Core
//!
//! Runtime coordination services for the bird-house monitor.
//!
//! This crate contains:
//! - The quiet-hours scheduler ([`sleep`])
//! - The camera mutual-exclusion lease ([`camera`])
//! - The adaptive battery/runtime estimator ([`power`])
//! - The motion-triggered recording controller ([`run`])
//!
//! ## Architecture
//! - Depends only on `nestwatch-domain`
//! - Hardware and persistence are reached through ports (traits); the
//!   infra crate provides the impure implementations

pub mod camera;
pub mod power;
pub mod run;
pub mod sleep;

pub use camera::{CameraLease, CameraUsageCoordinator};
pub use power::{BatteryEstimator, BatteryStateStore};
pub use run::{MotionSensor, RecordOptions, RunModeController, VideoRecorder};
pub use sleep::{SleepScheduler, SleepWindow};
