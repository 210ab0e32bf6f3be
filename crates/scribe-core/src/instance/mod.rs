//! Single-instance coordination.
//!
//! The first process to take the named lock becomes the **primary** instance
//! and keeps the lock for its lifetime. Every later process sees the lock
//! held, becomes **secondary**, hands its arguments to the primary and exits.
//!
//! The lock is an advisory exclusive lock (`flock` / `LockFileEx`) on a file
//! in the per-user runtime folder. The OS makes acquisition atomic and
//! releases the lock when the holder exits, including on a crash, so no
//! extra synchronization is needed here.

mod lock;

pub use lock::NamedLock;

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Role of the current process. Decided once, never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessRole {
    Primary,
    Secondary,
}

/// Outcome of the singleton check.
///
/// A primary decision holds the lock; keep the decision (or the lock taken
/// from it) alive for the rest of the process.
#[derive(Debug)]
#[must_use = "dropping a primary decision releases the instance lock"]
pub struct RoleDecision {
    role: ProcessRole,
    lock: Option<NamedLock>,
}

impl RoleDecision {
    pub fn role(&self) -> ProcessRole {
        self.role
    }

    pub fn is_primary(&self) -> bool {
        self.role == ProcessRole::Primary
    }

    /// True when this process became primary because the lock could not be
    /// set up at all rather than because it won the lock.
    pub fn is_fail_open(&self) -> bool {
        self.role == ProcessRole::Primary && self.lock.is_none()
    }

    /// Take ownership of the lock so it can be kept for the process lifetime.
    pub fn into_lock(self) -> Option<NamedLock> {
        self.lock
    }
}

/// Decides whether this process is the primary instance.
#[derive(Debug, Clone)]
pub struct InstanceCoordinator {
    runtime_dir: PathBuf,
    name: String,
}

impl InstanceCoordinator {
    /// Create a coordinator for the instance `name` with its lock under `runtime_dir`.
    pub fn new(runtime_dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            runtime_dir: runtime_dir.into(),
            name: name.into(),
        }
    }

    pub fn runtime_dir(&self) -> &Path {
        &self.runtime_dir
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Try to become the primary instance.
    ///
    /// Fails open: if the lock cannot be created or locked for any reason other
    /// than another process holding it, this process is treated as primary so
    /// that the application still starts.
    pub fn determine_role(&self) -> RoleDecision {
        match NamedLock::try_acquire(&self.runtime_dir, &self.name) {
            Ok(Some(lock)) => {
                info!("Acquired instance lock {}", lock.path().display());
                RoleDecision {
                    role: ProcessRole::Primary,
                    lock: Some(lock),
                }
            }
            Ok(None) => {
                debug!("Instance lock '{}' is held by another process", self.name);
                RoleDecision {
                    role: ProcessRole::Secondary,
                    lock: None,
                }
            }
            Err(e) => {
                warn!("Instance lock unavailable, continuing as primary: {}", e);
                RoleDecision {
                    role: ProcessRole::Primary,
                    lock: None,
                }
            }
        }
    }
}
