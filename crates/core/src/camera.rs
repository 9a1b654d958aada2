//! Exclusive access coordination for the camera
//!
//! Diagnostics callers (snapshot, stream) and the autonomous recording path
//! all funnel through one coordinator so that exactly one purpose holds the
//! camera at a time. Snapshot/stream callers fail fast when busy; the
//! recording path waits its turn.

use std::sync::{Arc, Mutex};

use nestwatch_domain::{NestwatchError, Result};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

/// Serialize access to camera hardware across diagnostics and run mode
#[derive(Debug)]
pub struct CameraUsageCoordinator {
    semaphore: Arc<Semaphore>,
    purpose: Mutex<Option<String>>,
}

impl Default for CameraUsageCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraUsageCoordinator {
    pub fn new() -> Self {
        Self { semaphore: Arc::new(Semaphore::new(1)), purpose: Mutex::new(None) }
    }

    /// Obtain exclusive camera access, waiting until the camera is free.
    pub async fn acquire(self: &Arc<Self>, purpose: &str) -> Result<CameraLease> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|e| NestwatchError::Internal(format!("camera semaphore closed: {e}")))?;
        Ok(self.lease(purpose, permit))
    }

    /// Obtain exclusive camera access without waiting.
    ///
    /// # Errors
    /// Returns [`NestwatchError::CameraBusy`] naming the current holder when
    /// another purpose already owns the lease.
    pub fn try_acquire(self: &Arc<Self>, purpose: &str) -> Result<CameraLease> {
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => Ok(self.lease(purpose, permit)),
            Err(_) => {
                let holder = self.in_use().unwrap_or_else(|| "unknown".to_string());
                Err(NestwatchError::CameraBusy { holder })
            }
        }
    }

    /// Purpose tag of the current lease holder, if any. Non-blocking read
    /// for status reporting.
    pub fn in_use(&self) -> Option<String> {
        self.purpose.lock().ok().and_then(|guard| guard.clone())
    }

    fn lease(self: &Arc<Self>, purpose: &str, permit: OwnedSemaphorePermit) -> CameraLease {
        if let Ok(mut guard) = self.purpose.lock() {
            *guard = Some(purpose.to_string());
        }
        debug!(purpose, "camera.lease_acquired");
        CameraLease { coordinator: Arc::clone(self), purpose: purpose.to_string(), _permit: permit }
    }

    fn clear(&self, purpose: &str) {
        if let Ok(mut guard) = self.purpose.lock() {
            match guard.as_deref() {
                Some(current) if current != purpose => {
                    warn!(expected = current, actual = purpose, "camera.release_mismatch");
                }
                _ => {}
            }
            *guard = None;
        }
        debug!(purpose, "camera.lease_released");
    }
}

/// Exclusive right to use the camera for one operation.
///
/// Releasing is tied to `Drop`, so an early return or panic inside the
/// protected region cannot leave the lease held.
#[derive(Debug)]
pub struct CameraLease {
    coordinator: Arc<CameraUsageCoordinator>,
    purpose: String,
    _permit: OwnedSemaphorePermit,
}

impl CameraLease {
    /// Purpose tag this lease was acquired for
    pub fn purpose(&self) -> &str {
        &self.purpose
    }
}

impl Drop for CameraLease {
    fn drop(&mut self) {
        self.coordinator.clear(&self.purpose);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn exactly_one_try_acquire_wins() {
        let coordinator = Arc::new(CameraUsageCoordinator::new());
        let first = coordinator.try_acquire("snapshot");
        assert!(first.is_ok());

        let second = coordinator.try_acquire("stream");
        match second {
            Err(NestwatchError::CameraBusy { holder }) => assert_eq!(holder, "snapshot"),
            other => panic!("expected CameraBusy, got {other:?}"),
        }

        drop(first);
        assert!(coordinator.try_acquire("stream").is_ok());
    }

    #[tokio::test]
    async fn in_use_reports_holder() {
        let coordinator = Arc::new(CameraUsageCoordinator::new());
        assert_eq!(coordinator.in_use(), None);

        let lease = coordinator.try_acquire("record").unwrap();
        assert_eq!(coordinator.in_use().as_deref(), Some("record"));
        assert_eq!(lease.purpose(), "record");

        drop(lease);
        assert_eq!(coordinator.in_use(), None);
    }

    #[tokio::test]
    async fn blocking_acquire_waits_for_release() {
        let coordinator = Arc::new(CameraUsageCoordinator::new());
        let lease = coordinator.try_acquire("snapshot").unwrap();

        let waiter = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                let lease = coordinator.acquire("record").await.unwrap();
                lease.purpose().to_string()
            })
        };

        // The waiter cannot finish while the snapshot lease is held.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(lease);
        let purpose = waiter.await.unwrap();
        assert_eq!(purpose, "record");
    }
}
