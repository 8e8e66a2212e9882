//! Lock files guarding read-modify-write cycles on file-backed storage.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::error::Error;

/// A lock older than this is considered abandoned.
const STALE_AFTER: Duration = Duration::from_secs(5);

/// Acquire an exclusive lock on `<path>.lock`.
pub fn acquire_lock(path: &Path) -> Result<LockHandle, Error> {
    let lock_path = PathBuf::from(format!("{}.lock", path.display()));

    if is_stale(&lock_path)? {
        tracing::warn!("Removing stale lock: {}", lock_path.display());
        std::fs::remove_file(&lock_path).ok();
    }

    // create_new fails if another holder won the race.
    let mut lock_file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&lock_path)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => {
                Error::Lock(format!("Lock file is held: {}", lock_path.display()))
            }
            _ => Error::Io(e),
        })?;
    lock_file.write_all(format!("{}\n", std::process::id()).as_bytes())?;

    tracing::trace!("Acquired lock: {}", lock_path.display());

    Ok(LockHandle { lock_path })
}

/// A missing lock is not stale; the holder may have just released it.
fn is_stale(lock_path: &Path) -> Result<bool, Error> {
    let modified = match lock_path.metadata().and_then(|m| m.modified()) {
        Ok(modified) => modified,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    let age = SystemTime::now()
        .duration_since(modified)
        .unwrap_or_default();
    Ok(age >= STALE_AFTER)
}

/// Lock handle - releases lock when dropped.
pub struct LockHandle {
    lock_path: PathBuf,
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.lock_path) {
            tracing::warn!("Failed to release lock {}: {}", self.lock_path.display(), e);
        } else {
            tracing::trace!("Released lock: {}", self.lock_path.display());
        }
    }
}

/// Acquire lock, execute function, release lock.
pub fn with_lock<T, F>(path: &Path, f: F) -> Result<T, Error>
where
    F: FnOnce() -> Result<T, Error>,
{
    let _lock = acquire_lock(path)?;
    f()
}
