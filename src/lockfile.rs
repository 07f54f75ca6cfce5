use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::LockRetryPolicy;
use crate::errors::ApiError;

/// Cross-process advisory lock on a target file, held via a sibling
/// `<target>.lock` file created with `create_new`. Two server processes
/// sharing the same custom config directory serialize their writes through
/// this; within one process the store mutex already serializes callers.
///
/// The lock is released on drop. A release failure is logged, never raised.
#[derive(Debug)]
pub struct FileLock {
    lock_path: PathBuf,
}

impl FileLock {
    /// Acquire the lock for `target`, retrying on contention with
    /// increasing backoff per `policy`. Fails with `LockAcquisition` once
    /// the retries are exhausted.
    pub fn acquire(target: &Path, policy: &LockRetryPolicy) -> Result<Self, ApiError> {
        let lock_path = lock_path_for(target);
        let mut backoff = policy.min_backoff;

        for attempt in 1..=policy.attempts.max(1) {
            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
            {
                Ok(mut file) => {
                    // Owner pid, useful when inspecting a stale lock by hand.
                    let _ = write!(file, "{}", std::process::id());
                    return Ok(Self { lock_path });
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    if attempt == policy.attempts.max(1) {
                        break;
                    }
                    log::debug!(
                        "lock busy: {} (attempt {attempt}/{})",
                        lock_path.display(),
                        policy.attempts
                    );
                    std::thread::sleep(backoff);
                    backoff = (backoff * 2).min(policy.max_backoff);
                }
                Err(err) => {
                    return Err(ApiError::LockAcquisition {
                        path: target.display().to_string(),
                        message: err.to_string(),
                    })
                }
            }
        }

        Err(ApiError::LockAcquisition {
            path: target.display().to_string(),
            message: format!("retries exhausted after {} attempts", policy.attempts.max(1)),
        })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.lock_path) {
            log::error!("failed to release lock {}: {err}", self.lock_path.display());
        }
    }
}

pub fn lock_path_for(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}
