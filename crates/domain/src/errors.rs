//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::OperatingMode;

/// Main error type for Nestwatch
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum NestwatchError {
    /// The camera lease is currently held by another caller.
    #[error("Camera is in use by {holder}")]
    CameraBusy {
        /// Purpose tag of the current lease holder
        holder: String,
    },

    /// Another process already holds the mode lock for a different mode.
    #[error("Already running in {mode} mode (pid={pid}); stop it before switching modes")]
    ModeConflict {
        /// Mode recorded by the other process
        mode: OperatingMode,
        /// Owning process id recorded in the lock file
        pid: u32,
    },

    /// A hardware collaborator (GPIO, camera device) is not present.
    #[error("Hardware unavailable: {0}")]
    HardwareUnavailable(String),

    /// Video capture started but did not complete successfully.
    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Nestwatch operations
pub type Result<T> = std::result::Result<T, NestwatchError>;

impl From<std::io::Error> for NestwatchError {
    fn from(err: std::io::Error) -> Self {
        NestwatchError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for NestwatchError {
    fn from(err: serde_json::Error) -> Self {
        NestwatchError::Storage(err.to_string())
    }
}
