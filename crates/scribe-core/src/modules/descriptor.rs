//! Per-module load bookkeeping.

use crate::error::ScribeError;
use std::path::{Path, PathBuf};

/// Where a module is in the load pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Found on disk, load not attempted (yet, or ever if the pass was cancelled).
    Discovered,
    Loaded,
    Failed,
}

/// A module file found by the locator and its load outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor {
    path: PathBuf,
    state: LoadState,
    error: Option<String>,
}

impl ModuleDescriptor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: LoadState::Discovered,
            error: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name of the module, used as its identity.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    /// Why the load failed, for `Failed` descriptors.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub(crate) fn mark_loaded(&mut self) {
        self.state = LoadState::Loaded;
        self.error = None;
    }

    pub(crate) fn mark_failed(&mut self, error: &ScribeError) {
        self.state = LoadState::Failed;
        self.error = Some(error.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_descriptor_is_discovered() {
        let descriptor = ModuleDescriptor::new("/opt/scribe/Addins/spell/libspell.so");
        assert_eq!(descriptor.state(), LoadState::Discovered);
        assert_eq!(descriptor.file_name(), "libspell.so");
        assert!(descriptor.error().is_none());
    }

    #[test]
    fn test_mark_failed_records_error() {
        let mut descriptor = ModuleDescriptor::new("/x/broken.so");
        descriptor.mark_failed(&ScribeError::module_load("/x/broken.so", "invalid ELF header"));
        assert_eq!(descriptor.state(), LoadState::Failed);
        assert!(descriptor.error().unwrap().contains("invalid ELF header"));
    }
}
