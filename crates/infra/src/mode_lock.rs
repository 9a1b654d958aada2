//! Cross-process mode lock using a PID-stamped record file
//!
//! Exactly one operating mode (diagnostics or autonomous) may be active
//! system-wide. The lock is advisory: cooperating processes record
//! `{mode, pid, timestamp}` at a well-known path, and a starting process
//! refuses to proceed while a live conflicting record exists. Records
//! owned by dead processes, and unreadable records, are reclaimed.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use nestwatch_domain::{ModeLockRecord, NestwatchError, OperatingMode, Result};

/// Process-liveness probe, injectable so tests can simulate dead owners
pub trait LivenessProbe: Send + Sync {
    /// Whether the process with `pid` is still running.
    ///
    /// "Cannot confirm death" (permission denied) counts as alive.
    fn is_alive(&self, pid: u32) -> bool;
}

/// Real probe using zero-effect signal semantics
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLiveness;

impl LivenessProbe for SystemLiveness {
    #[cfg(target_os = "linux")]
    fn is_alive(&self, pid: u32) -> bool {
        Path::new("/proc").join(pid.to_string()).exists()
    }

    #[cfg(not(target_os = "linux"))]
    fn is_alive(&self, pid: u32) -> bool {
        use std::process::Command;

        // `kill -0` checks existence without delivering a signal. A
        // failure to run the probe itself cannot confirm death.
        match Command::new("kill").arg("-0").arg(pid.to_string()).output() {
            Ok(output) => kill_probe_says_alive(output.status.success(), &output.stderr),
            Err(_) => true,
        }
    }
}

/// Interpret a `kill -0` outcome. Nonzero exit covers both "no such
/// process" and "operation not permitted"; only the former means the
/// owner is gone, so a permission error still counts as alive.
#[cfg_attr(target_os = "linux", allow(dead_code))]
fn kill_probe_says_alive(success: bool, stderr: &[u8]) -> bool {
    if success {
        return true;
    }
    String::from_utf8_lossy(stderr).to_lowercase().contains("not permitted")
}

/// Holder of the mode lock; the record is deleted on drop
pub struct ModeLock {
    path: PathBuf,
    pid: u32,
    acquired: AtomicBool,
}

impl ModeLock {
    /// Record the requested mode, failing if a conflicting active mode
    /// exists.
    ///
    /// # Errors
    /// [`NestwatchError::ModeConflict`] when another live process holds the
    /// slot; `Storage` when the record cannot be written.
    pub fn acquire(
        path: impl AsRef<Path>,
        mode: OperatingMode,
        probe: Arc<dyn LivenessProbe>,
    ) -> Result<Self> {
        Self::acquire_as(path, mode, probe, std::process::id())
    }

    // Pid parameterised so tests can simulate a second process.
    fn acquire_as(
        path: impl AsRef<Path>,
        mode: OperatingMode,
        probe: Arc<dyn LivenessProbe>,
        pid: u32,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(existing) = read_record(&path) {
            if !probe.is_alive(existing.pid) {
                tracing::warn!(stale_pid = existing.pid, "mode_lock.stale_record_removed");
                remove_quiet(&path);
            } else if existing.pid == pid && existing.mode == mode {
                tracing::debug!(mode = %mode, "mode_lock.reentrant_acquire");
                return Ok(Self { path, pid, acquired: AtomicBool::new(true) });
            } else {
                tracing::warn!(
                    existing_mode = %existing.mode,
                    existing_pid = existing.pid,
                    "mode_lock.conflict"
                );
                return Err(NestwatchError::ModeConflict {
                    mode: existing.mode,
                    pid: existing.pid,
                });
            }
        }

        let record = ModeLockRecord { mode, pid, timestamp: Utc::now() };
        write_record(&path, &record)?;
        tracing::info!(mode = %mode, pid, path = %path.display(), "mode_lock.acquired");
        Ok(Self { path, pid, acquired: AtomicBool::new(true) })
    }

    /// Clear the mode lock if held by this process.
    ///
    /// A no-op when another process has since taken over the slot.
    pub fn release(&self) {
        if !self.acquired.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(record) = read_record(&self.path) {
            if record.pid != self.pid {
                tracing::debug!(
                    owner_pid = record.pid,
                    "mode_lock.release_skipped_other_owner"
                );
                return;
            }
        }
        remove_quiet(&self.path);
        tracing::info!(path = %self.path.display(), "mode_lock.released");
    }
}

impl Drop for ModeLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// Read the current record; corrupt content is removed and reported absent
fn read_record(path: &Path) -> Option<ModeLockRecord> {
    let content = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(record) => Some(record),
        Err(err) => {
            tracing::warn!(error = %err, path = %path.display(), "mode_lock.corrupt_record_removed");
            remove_quiet(path);
            None
        }
    }
}

/// Write-to-temp-then-rename so a crash mid-write leaves old or new
/// content, never a truncated hybrid
fn write_record(path: &Path, record: &ModeLockRecord) -> Result<()> {
    let payload = serde_json::to_string_pretty(record)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, payload)
        .and_then(|()| fs::rename(&tmp, path))
        .map_err(|e| NestwatchError::Storage(format!("cannot write mode lock: {e}")))
}

fn remove_quiet(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(error = %err, path = %path.display(), "mode_lock.remove_failed");
        }
    }
}
