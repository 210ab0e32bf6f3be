//! Discovery of module files under the add-in roots.

use super::descriptor::ModuleDescriptor;
use crate::platform::is_module_file;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Searches an ordered list of roots for module files.
#[derive(Debug, Clone, Default)]
pub struct ModuleLocator {
    roots: Vec<PathBuf>,
}

impl ModuleLocator {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Lazily yield a descriptor for every module file under the roots.
    ///
    /// Roots are searched in order, each depth-first in directory-listing
    /// order. That order differs between platforms and must not be relied
    /// upon. Missing roots and unreadable subtrees are skipped.
    pub fn locate(&self) -> impl Iterator<Item = ModuleDescriptor> + '_ {
        self.roots.iter().flat_map(|root| walk_root(root))
    }
}

fn walk_root(root: &Path) -> impl Iterator<Item = ModuleDescriptor> {
    let walker = if root.is_dir() {
        debug!("Searching for modules in {}", root.display());
        Some(WalkDir::new(root).follow_links(true))
    } else {
        debug!("Module root {} does not exist, skipping", root.display());
        None
    };

    walker
        .into_iter()
        .flat_map(WalkDir::into_iter)
        .filter_map(|entry| match entry {
            Ok(entry) => module_descriptor(entry),
            Err(e) => {
                warn!(
                    "Skipping unreadable path {}: {}",
                    e.path().map(|p| p.display().to_string()).unwrap_or_default(),
                    e
                );
                None
            }
        })
}

fn module_descriptor(entry: DirEntry) -> Option<ModuleDescriptor> {
    if entry.file_type().is_file() && is_module_file(entry.path()) {
        Some(ModuleDescriptor::new(entry.into_path()))
    } else {
        None
    }
}
