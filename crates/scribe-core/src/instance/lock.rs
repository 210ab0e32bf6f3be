//! Machine-wide named lock backed by an exclusive file lock.

use crate::config::IpcConfig;
use crate::error::{Result, ScribeError};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Exclusive ownership of the instance name.
///
/// The OS releases the lock when the file handle closes: on drop, on process
/// exit, and on abnormal termination.
#[derive(Debug)]
pub struct NamedLock {
    path: PathBuf,
    file: File,
}

impl NamedLock {
    /// Try to take the lock `<dir>/<name>.lock` without blocking.
    ///
    /// Returns `Ok(None)` when another holder owns it and an error when the
    /// lock file cannot be created or locked at all.
    pub fn try_acquire(dir: &Path, name: &str) -> Result<Option<Self>> {
        std::fs::create_dir_all(dir).map_err(|e| ScribeError::io_with_path(e, dir))?;

        let path = dir.join(format!("{}.{}", name, IpcConfig::LOCK_FILE_EXTENSION));
        // The file is never truncated on open or deleted: removing a lock file
        // another process is about to lock would split the lock in two.
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| ScribeError::io_with_path(e, &path))?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                let lock = Self { path, file };
                lock.record_owner();
                Ok(Some(lock))
            }
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => Ok(None),
            Err(e) => Err(ScribeError::LockUnavailable {
                path,
                message: e.to_string(),
            }),
        }
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock before the process exits.
    pub fn release(self) {
        match self.file.unlock() {
            Ok(()) => debug!("Released instance lock {}", self.path.display()),
            Err(e) => warn!("Failed to release instance lock {}: {}", self.path.display(), e),
        }
    }

    /// Write the owner PID into the lock file for diagnostics. Best-effort.
    fn record_owner(&self) {
        let result = self
            .file
            .set_len(0)
            .and_then(|_| (&self.file).write_all(std::process::id().to_string().as_bytes()));
        if let Err(e) = result {
            debug!("Could not record owner in {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // Windows locks are mandatory, so a second handle cannot read the file.
    #[cfg(unix)]
    #[test]
    fn test_acquire_records_pid() {
        let dir = TempDir::new().unwrap();
        let lock = NamedLock::try_acquire(dir.path(), "scribe-pid").unwrap().unwrap();

        let content = std::fs::read_to_string(lock.path()).unwrap();
        assert_eq!(content, std::process::id().to_string());
    }

    #[test]
    fn test_second_acquire_is_contended() {
        let dir = TempDir::new().unwrap();
        let _held = NamedLock::try_acquire(dir.path(), "scribe-held").unwrap().unwrap();

        assert!(NamedLock::try_acquire(dir.path(), "scribe-held")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_creates_missing_runtime_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("run").join("scribe");

        let lock = NamedLock::try_acquire(&nested, "scribe-nested").unwrap();
        assert!(lock.is_some());
        assert!(nested.join("scribe-nested.lock").exists());
    }
}
