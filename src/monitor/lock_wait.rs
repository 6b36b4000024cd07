//! Waiting for a freshly created file to be released by its writer.
//!
//! A file is ready once it can be opened for exclusive access and its size
//! has not changed since the previous poll. Polling is fixed-interval,
//! bounded by an attempt count and cancellable.

use crate::error::TransferError;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::trace;

pub const DEFAULT_LOCK_POLL_INTERVAL: Duration = Duration::from_millis(200);
pub const DEFAULT_LOCK_MAX_ATTEMPTS: u32 = 150;

/// Longest uninterrupted sleep between cancellation checks
const CANCEL_CHECK_SLICE: Duration = Duration::from_millis(50);

/// Poll policy for files that are still being written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockWaitPolicy {
    /// Delay between two probes
    pub poll_interval: Duration,
    /// Probes before giving up with `LockTimeout` (at least 1)
    pub max_attempts: u32,
}

impl Default for LockWaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_LOCK_POLL_INTERVAL,
            max_attempts: DEFAULT_LOCK_MAX_ATTEMPTS,
        }
    }
}

impl LockWaitPolicy {
    pub fn new(poll_interval: Duration, max_attempts: u32) -> Self {
        Self {
            poll_interval,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Upper bound on time spent waiting for one file
    pub fn max_wait(&self) -> Duration {
        self.poll_interval.saturating_mul(self.attempts().saturating_sub(1))
    }

    // Struct literals can bypass the clamp in `new`
    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Block until `path` is ready; returns the number of probes it took
    pub fn wait_until_ready(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<u32, TransferError> {
        let max_attempts = self.attempts();
        let mut last_size: Option<u64> = None;

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Err(TransferError::Cancelled);
            }

            match probe_exclusive(path) {
                Ok(size) if last_size == Some(size) => return Ok(attempt),
                Ok(size) => {
                    trace!(path = %path.display(), attempt, size, "Waiting for size to settle");
                    last_size = Some(size);
                }
                Err(e) => {
                    trace!(path = %path.display(), attempt, "File still locked: {}", e);
                    last_size = None;
                }
            }

            if attempt < max_attempts && !sleep_unless_cancelled(self.poll_interval, cancel) {
                return Err(TransferError::Cancelled);
            }
        }

        Err(TransferError::LockTimeout {
            path: path.to_path_buf(),
            attempts: max_attempts,
        })
    }
}

/// Sleep for `duration` in short slices; false if `cancel` fired meanwhile
fn sleep_unless_cancelled(duration: Duration, cancel: &CancellationToken) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep((deadline - now).min(CANCEL_CHECK_SLICE));
    }
}

/// Open `path` exclusively and return its current size; the handle is
/// released before returning
pub fn probe_exclusive(path: &Path) -> io::Result<u64> {
    let file = open_exclusive(path)?;
    fs2::FileExt::try_lock_exclusive(&file)?;
    let size = file.metadata()?.len();
    fs2::FileExt::unlock(&file)?;
    Ok(size)
}

#[cfg(windows)]
fn open_exclusive(path: &Path) -> io::Result<File> {
    use std::os::windows::fs::OpenOptionsExt;
    // No sharing: fails while any other handle is open
    OpenOptions::new().read(true).share_mode(0).open(path)
}

#[cfg(not(windows))]
fn open_exclusive(path: &Path) -> io::Result<File> {
    OpenOptions::new().read(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fs2::FileExt;
    use tempfile::tempdir;

    #[test]
    fn test_default_policy() {
        let policy = LockWaitPolicy::default();
        assert_eq!(policy.poll_interval, Duration::from_millis(200));
        assert_eq!(policy.max_attempts, 150);
        assert_eq!(policy.max_wait(), Duration::from_millis(200 * 149));
    }

    #[test]
    fn test_max_attempts_at_least_one() {
        let policy = LockWaitPolicy::new(Duration::from_millis(10), 0);
        assert_eq!(policy.max_attempts, 1);
    }

    #[test]
    fn test_zero_attempts_in_literal_still_probes_once() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("gone.jpg");

        let policy = LockWaitPolicy {
            poll_interval: Duration::from_millis(5),
            max_attempts: 0,
        };
        assert_eq!(policy.max_wait(), Duration::ZERO);
        match policy.wait_until_ready(&path, &CancellationToken::new()) {
            Err(TransferError::LockTimeout { attempts, .. }) => assert_eq!(attempts, 1),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_unlocked_stable_file_ready_on_second_probe() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("a.jpg");
        std::fs::write(&path, b"done").unwrap();

        let policy = LockWaitPolicy::new(Duration::from_millis(10), 5);
        let attempts = policy
            .wait_until_ready(&path, &CancellationToken::new())
            .unwrap();
        assert_eq!(attempts, 2);
    }

    #[test]
    fn test_missing_file_times_out() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("gone.jpg");

        let policy = LockWaitPolicy::new(Duration::from_millis(5), 3);
        let err = policy
            .wait_until_ready(&path, &CancellationToken::new())
            .unwrap_err();
        match err {
            TransferError::LockTimeout { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_waits_for_lock_release() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("busy.jpg");
        std::fs::write(&path, vec![1u8; 1000]).unwrap();

        let holder = File::open(&path).unwrap();
        holder.lock_exclusive().unwrap();
        let started = Instant::now();
        let release = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(500));
            FileExt::unlock(&holder).unwrap();
            drop(holder);
        });

        let policy = LockWaitPolicy::new(Duration::from_millis(50), 100);
        let attempts = policy
            .wait_until_ready(&path, &CancellationToken::new())
            .unwrap();
        release.join().unwrap();

        assert!(started.elapsed() >= Duration::from_millis(500));
        assert!(attempts > 2, "expected several probes, got {}", attempts);
    }

    #[test]
    fn test_cancelled_wait() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("a.jpg");
        std::fs::write(&path, b"x").unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let policy = LockWaitPolicy::default();
        assert!(matches!(
            policy.wait_until_ready(&path, &cancel),
            Err(TransferError::Cancelled)
        ));
    }

    #[test]
    fn test_cancel_interrupts_long_poll_interval() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("gone.jpg");

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            trigger.cancel();
        });

        let started = Instant::now();
        let policy = LockWaitPolicy::new(Duration::from_secs(30), 10);
        let result = policy.wait_until_ready(&path, &cancel);
        canceller.join().unwrap();

        assert!(matches!(result, Err(TransferError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
