//! Motion-triggered recording supervision
//!
//! The run controller drives a polling loop that consults the sleep
//! scheduler, evaluates motion, and hands positive triggers to a bounded,
//! cancellable recording task holding the camera lease.

mod controller;
mod ports;

pub use controller::RunModeController;
pub use ports::{MotionSensor, RecordOptions, VideoRecorder};
