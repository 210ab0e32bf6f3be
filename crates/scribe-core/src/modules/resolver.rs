//! Fallback resolution of dependencies a module could not find on its own.
//!
//! When a module fails to load because a library it links against is not on
//! the loader's default search path, the load pass asks the resolver for that
//! library by identity. The resolver looks in the installation directory and
//! then anywhere under the add-in roots. Once found, the library is mapped
//! into the process and the module load is retried.

use super::host::{ModuleHandle, ModuleHost};
use crate::config::ModuleConfig;
use crate::platform::library_file_name;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use walkdir::WalkDir;

/// A directory the resolver may find libraries in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchPath {
    /// Only files directly inside the directory.
    Direct(PathBuf),
    /// The directory and everything below it, matched case-insensitively.
    Recursive(PathBuf),
}

/// Finds and maps libraries that modules depend on.
///
/// Resolution is serialized: concurrent requests for the same identity map
/// the library at most once and all receive the same handle.
pub struct ModuleResolver {
    search_paths: Vec<SearchPath>,
    host: Arc<dyn ModuleHost>,
    loaded: Mutex<HashMap<String, ModuleHandle>>,
}

impl std::fmt::Debug for ModuleResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleResolver")
            .field("search_paths", &self.search_paths)
            .finish()
    }
}

impl ModuleResolver {
    pub fn new(search_paths: Vec<SearchPath>, host: Arc<dyn ModuleHost>) -> Self {
        Self {
            search_paths,
            host,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    pub fn search_paths(&self) -> &[SearchPath] {
        &self.search_paths
    }

    /// Record a module loaded elsewhere so it is never mapped twice.
    pub fn register(&self, module: ModuleHandle) {
        let mut loaded = self.loaded.lock().unwrap_or_else(|e| e.into_inner());
        loaded
            .entry(module.identity().to_string())
            .or_insert(module);
    }

    /// The handle already mapped under `identity`, without searching.
    pub fn cached(&self, identity: &str) -> Option<ModuleHandle> {
        let loaded = self.loaded.lock().unwrap_or_else(|e| e.into_inner());
        loaded.get(identity).cloned()
    }

    /// Resolve a library by identity.
    ///
    /// The identity is a file name, or a bare library name optionally followed
    /// by `,`-separated qualifiers that are ignored. Returns `None` when the
    /// identity names a resource bundle or nothing matching can be loaded.
    pub fn resolve(&self, identity: &str) -> Option<ModuleHandle> {
        if identity
            .to_ascii_lowercase()
            .contains(ModuleConfig::RESOURCE_BUNDLE_MARKER)
        {
            debug!("Not resolving resource bundle {}", identity);
            return None;
        }

        let mut loaded = self.loaded.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(module) = loaded.get(identity) {
            return Some(Arc::clone(module));
        }

        let name = identity.split(',').next().unwrap_or_default().trim();
        if name.is_empty() {
            return None;
        }
        let candidate = library_file_name(name);

        if let Some(module) = loaded.get(&candidate).cloned() {
            loaded.insert(identity.to_string(), Arc::clone(&module));
            return Some(module);
        }

        for search_path in &self.search_paths {
            let found = match search_path {
                SearchPath::Direct(dir) => Some(dir.join(&candidate)).filter(|p| p.is_file()),
                SearchPath::Recursive(root) => find_in_tree(root, &candidate),
            };
            let Some(path) = found else { continue };

            match self.host.load(&path) {
                Ok(module) => {
                    info!("Resolved {} to {}", identity, path.display());
                    loaded.insert(candidate.clone(), Arc::clone(&module));
                    loaded.insert(identity.to_string(), Arc::clone(&module));
                    return Some(module);
                }
                Err(e) => debug!("Candidate {} for {} failed: {}", path.display(), identity, e),
            }
        }

        debug!("Could not resolve {}", identity);
        None
    }
}

/// Find `file_name` anywhere under `root`, ignoring ASCII case.
///
/// Files in a directory are checked before its subdirectories and entries are
/// visited in name order, so the result is stable for a given tree.
fn find_in_tree(root: &Path, file_name: &str) -> Option<PathBuf> {
    if !root.is_dir() {
        return None;
    }
    WalkDir::new(root)
        .follow_links(true)
        .sort_by(|a, b| {
            a.file_type()
                .is_dir()
                .cmp(&b.file_type().is_dir())
                .then_with(|| a.file_name().cmp(b.file_name()))
        })
        .into_iter()
        .filter_map(|entry| entry.ok())
        .find(|entry| {
            entry.file_type().is_file()
                && entry
                    .file_name()
                    .to_string_lossy()
                    .eq_ignore_ascii_case(file_name)
        })
        .map(|entry| entry.into_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::testing::FakeHost;
    use tempfile::TempDir;

    fn resolver_for(dir: &TempDir, host: &Arc<FakeHost>) -> ModuleResolver {
        let host: Arc<dyn ModuleHost> = host.clone();
        ModuleResolver::new(
            vec![
                SearchPath::Direct(dir.path().join("install")),
                SearchPath::Recursive(dir.path().join("addins")),
            ],
            host,
        )
    }

    #[test]
    fn test_resolves_from_install_dir() {
        let dir = TempDir::new().unwrap();
        let install = dir.path().join("install");
        std::fs::create_dir_all(&install).unwrap();
        std::fs::write(install.join(library_file_name("core")), "MODULE").unwrap();

        let host = Arc::new(FakeHost::default());
        let resolver = resolver_for(&dir, &host);

        let module = resolver.resolve("core").unwrap();
        assert_eq!(module.identity(), library_file_name("core"));
    }

    #[test]
    fn test_resolves_recursively_ignoring_case() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("addins").join("spell").join("lib");
        std::fs::create_dir_all(&nested).unwrap();
        let on_disk = library_file_name("hunspell").to_ascii_uppercase();
        std::fs::write(nested.join(&on_disk), "MODULE").unwrap();

        let host = Arc::new(FakeHost::default());
        let resolver = resolver_for(&dir, &host);

        let module = resolver.resolve("hunspell, version=1.7").unwrap();
        assert_eq!(module.path(), nested.join(&on_disk));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let install = dir.path().join("install");
        std::fs::create_dir_all(&install).unwrap();
        let file_name = library_file_name("core");
        std::fs::write(install.join(&file_name), "MODULE").unwrap();

        let host = Arc::new(FakeHost::default());
        let resolver = resolver_for(&dir, &host);

        let first = resolver.resolve("core").unwrap();
        let second = resolver.resolve("core").unwrap();
        let by_file_name = resolver.resolve(&file_name).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &by_file_name));
        assert_eq!(host.load_count(&install.join(&file_name)), 1);
    }

    #[test]
    fn test_registered_module_is_not_reloaded() {
        let dir = TempDir::new().unwrap();
        let addins = dir.path().join("addins");
        std::fs::create_dir_all(&addins).unwrap();
        let path = addins.join(library_file_name("preview"));
        std::fs::write(&path, "MODULE").unwrap();

        let host = Arc::new(FakeHost::default());
        let module = host.load(&path).unwrap();
        let resolver = resolver_for(&dir, &host);
        resolver.register(Arc::clone(&module));

        let resolved = resolver.resolve("preview").unwrap();
        assert!(Arc::ptr_eq(&module, &resolved));
        assert_eq!(host.load_count(&path), 1);
    }

    #[test]
    fn test_resource_bundles_are_never_resolved() {
        let dir = TempDir::new().unwrap();
        let install = dir.path().join("install");
        std::fs::create_dir_all(&install).unwrap();
        std::fs::write(install.join(library_file_name("editor.resources")), "MODULE").unwrap();

        let host = Arc::new(FakeHost::default());
        let resolver = resolver_for(&dir, &host);

        assert!(resolver.resolve("editor.resources, culture=fr").is_none());
        assert_eq!(host.total_loads(), 0);
    }

    #[test]
    fn test_unknown_identity_is_not_found() {
        let dir = TempDir::new().unwrap();
        let host = Arc::new(FakeHost::default());
        let resolver = resolver_for(&dir, &host);

        assert!(resolver.resolve("nowhere").is_none());
        assert!(resolver.resolve("").is_none());
    }

    #[test]
    fn test_unloadable_candidate_is_skipped() {
        let dir = TempDir::new().unwrap();
        let install = dir.path().join("install");
        let nested = dir.path().join("addins").join("vendor");
        std::fs::create_dir_all(&install).unwrap();
        std::fs::create_dir_all(&nested).unwrap();
        let file_name = library_file_name("core");
        std::fs::write(install.join(&file_name), "garbage").unwrap();
        std::fs::write(nested.join(&file_name), "MODULE").unwrap();

        let host = Arc::new(FakeHost::default());
        let resolver = resolver_for(&dir, &host);

        let module = resolver.resolve("core").unwrap();
        assert_eq!(module.path(), nested.join(&file_name));
    }
}
