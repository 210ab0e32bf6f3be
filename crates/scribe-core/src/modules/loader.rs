//! The add-in load pass.
//!
//! Modules are loaded one at a time in discovery order. A module that fails
//! is marked `Failed` and the pass moves on; nothing a module does can abort
//! startup.

use super::descriptor::ModuleDescriptor;
use super::host::{missing_dependency, ModuleHandle, ModuleHost};
use super::registry::ModuleRegistry;
use super::resolver::ModuleResolver;
use crate::cancel::CancellationToken;
use crate::config::ModuleConfig;
use crate::{Result, ScribeError};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Loads discovered modules through a [`ModuleHost`].
pub struct ModuleLoader {
    host: Arc<dyn ModuleHost>,
    resolver: Option<Arc<ModuleResolver>>,
}

impl ModuleLoader {
    pub fn new(host: Arc<dyn ModuleHost>) -> Self {
        Self {
            host,
            resolver: None,
        }
    }

    /// Resolve missing dependencies through `resolver` and retry the load.
    pub fn with_resolver(mut self, resolver: Arc<ModuleResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Load every descriptor, stopping early if `cancel` fires.
    ///
    /// Cancellation is checked before each module. Once it fires, every
    /// descriptor not yet attempted is recorded as `Discovered`. A module the
    /// resolver already mapped as a dependency is reused, not loaded again.
    pub fn load_all<I>(&self, descriptors: I, cancel: &CancellationToken) -> ModuleRegistry
    where
        I: IntoIterator<Item = ModuleDescriptor>,
    {
        let mut registry = ModuleRegistry::default();
        let mut pending = descriptors.into_iter();

        for mut descriptor in pending.by_ref() {
            if cancel.is_cancelled() {
                info!("Module loading cancelled");
                registry.record(descriptor, None);
                break;
            }

            let result = match self.already_mapped(&descriptor) {
                Some(module) => Ok(module),
                None => self.load_one(descriptor.path()),
            };

            match result {
                Ok(module) => {
                    debug!("Loaded module {}", descriptor.path().display());
                    if let Some(resolver) = &self.resolver {
                        resolver.register(Arc::clone(&module));
                    }
                    descriptor.mark_loaded();
                    registry.record(descriptor, Some(module));
                }
                Err(e) => {
                    warn!("Failed to load module {}: {}", descriptor.path().display(), e);
                    descriptor.mark_failed(&e);
                    registry.record(descriptor, None);
                }
            }
        }

        for descriptor in pending {
            registry.record(descriptor, None);
        }

        info!(
            "Module load pass finished: {} loaded, {} failed",
            registry.modules().len(),
            registry.failed().count()
        );
        registry
    }

    fn already_mapped(&self, descriptor: &ModuleDescriptor) -> Option<ModuleHandle> {
        let module = self.resolver.as_ref()?.cached(&descriptor.file_name())?;
        debug!(
            "Module {} was already mapped as a dependency",
            descriptor.path().display()
        );
        Some(module)
    }

    fn load_one(&self, path: &Path) -> Result<ModuleHandle> {
        let mut resolved: Vec<String> = Vec::new();

        loop {
            let err = match self.try_load(path) {
                Ok(module) => return Ok(module),
                Err(e) => e,
            };

            let Some(resolver) = &self.resolver else {
                return Err(err);
            };
            let ScribeError::ModuleLoad { message, .. } = &err else {
                return Err(err);
            };
            let Some(dependency) = missing_dependency(message, path) else {
                return Err(err);
            };
            if resolved.contains(&dependency) || resolved.len() >= ModuleConfig::MAX_DEPENDENCY_RETRIES {
                return Err(err);
            }

            if resolver.resolve(&dependency).is_none() {
                return Err(err);
            }
            debug!(
                "Resolved dependency {} of {}, retrying",
                dependency,
                path.display()
            );
            resolved.push(dependency);
        }
    }

    fn try_load(&self, path: &Path) -> Result<ModuleHandle> {
        panic::catch_unwind(AssertUnwindSafe(|| self.host.load(path))).unwrap_or_else(|payload| {
            Err(ScribeError::module_load(
                path,
                format!("module host panicked: {}", panic_message(payload.as_ref())),
            ))
        })
    }
}

/// Run the application-start hook of every loaded module that has one.
///
/// Hook failures and panics are logged. Returns the number of hooks that
/// completed successfully.
pub fn run_startup_hooks(registry: &ModuleRegistry) -> usize {
    let mut succeeded = 0;
    for module in registry.modules().iter().filter(|m| m.has_startup_hook()) {
        match panic::catch_unwind(AssertUnwindSafe(|| module.on_application_start())) {
            Ok(Ok(())) => {
                debug!("Startup hook of {} finished", module.identity());
                succeeded += 1;
            }
            Ok(Err(e)) => error!("Startup hook of {} failed: {}", module.identity(), e),
            Err(payload) => error!(
                "Startup hook of {} panicked: {}",
                module.identity(),
                panic_message(payload.as_ref())
            ),
        }
    }
    succeeded
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::testing::{module_file, FakeHost};
    use crate::modules::{LoadState, SearchPath};
    use tempfile::TempDir;

    fn loader(host: &Arc<FakeHost>) -> ModuleLoader {
        let host: Arc<dyn ModuleHost> = host.clone();
        ModuleLoader::new(host)
    }

    #[test]
    fn test_failures_do_not_stop_the_pass() {
        let dir = TempDir::new().unwrap();
        let descriptors = vec![
            ModuleDescriptor::new(module_file(dir.path(), "good", "MODULE")),
            ModuleDescriptor::new(module_file(dir.path(), "bad", "not a module")),
            ModuleDescriptor::new(module_file(dir.path(), "boom", "MODULE panic")),
            ModuleDescriptor::new(module_file(dir.path(), "also_good", "MODULE")),
        ];

        let host = Arc::new(FakeHost::default());
        let registry = loader(&host).load_all(descriptors, &CancellationToken::new());

        let states: Vec<LoadState> = registry.descriptors().iter().map(|d| d.state()).collect();
        assert_eq!(
            states,
            vec![LoadState::Loaded, LoadState::Failed, LoadState::Failed, LoadState::Loaded]
        );
        assert_eq!(registry.modules().len(), 2);
        assert!(registry.descriptors()[2].error().unwrap().contains("panicked"));
    }

    #[test]
    fn test_cancellation_leaves_remaining_discovered() {
        let dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        let host = Arc::new(FakeHost::cancelling_after(1, cancel.clone()));
        let descriptors = vec![
            ModuleDescriptor::new(module_file(dir.path(), "first", "MODULE")),
            ModuleDescriptor::new(module_file(dir.path(), "second", "MODULE")),
            ModuleDescriptor::new(module_file(dir.path(), "third", "MODULE")),
        ];

        let registry = loader(&host).load_all(descriptors, &cancel);

        assert_eq!(registry.descriptors().len(), 3);
        assert_eq!(registry.descriptors()[0].state(), LoadState::Loaded);
        assert!(registry.descriptors()[1..]
            .iter()
            .all(|d| d.state() == LoadState::Discovered));
        assert_eq!(host.total_loads(), 1);
    }

    #[test]
    fn test_missing_dependency_is_resolved_and_retried() {
        let dir = TempDir::new().unwrap();
        let vendor = dir.path().join("vendor");
        std::fs::create_dir_all(&vendor).unwrap();
        let dependency = module_file(&vendor, "core", "MODULE");
        let dependency_name = dependency.file_name().unwrap().to_string_lossy().into_owned();
        let preview = module_file(dir.path(), "preview", &format!("MODULE needs={}", dependency_name));

        let host = Arc::new(FakeHost::default());
        let dyn_host: Arc<dyn ModuleHost> = host.clone();
        let resolver = Arc::new(ModuleResolver::new(
            vec![SearchPath::Recursive(dir.path().to_path_buf())],
            Arc::clone(&dyn_host),
        ));
        let loader = ModuleLoader::new(dyn_host).with_resolver(resolver);

        let registry = loader.load_all(vec![ModuleDescriptor::new(&preview)], &CancellationToken::new());

        assert_eq!(registry.descriptors()[0].state(), LoadState::Loaded);
        assert_eq!(host.load_count(&dependency), 1);
    }

    #[test]
    fn test_dependency_listed_after_dependent_is_not_reloaded() {
        let dir = TempDir::new().unwrap();
        let core = module_file(dir.path(), "zcore", "MODULE");
        let core_name = core.file_name().unwrap().to_string_lossy().into_owned();
        let preview = module_file(dir.path(), "apreview", &format!("MODULE needs={}", core_name));

        let host = Arc::new(FakeHost::default());
        let dyn_host: Arc<dyn ModuleHost> = host.clone();
        let resolver = Arc::new(ModuleResolver::new(
            vec![SearchPath::Recursive(dir.path().to_path_buf())],
            Arc::clone(&dyn_host),
        ));
        let loader = ModuleLoader::new(dyn_host).with_resolver(Arc::clone(&resolver));

        let registry = loader.load_all(
            vec![ModuleDescriptor::new(&preview), ModuleDescriptor::new(&core)],
            &CancellationToken::new(),
        );

        assert_eq!(registry.with_state(LoadState::Loaded).count(), 2);
        assert_eq!(host.load_count(&core), 1);
        let listed = registry.get(&core_name).unwrap();
        assert!(Arc::ptr_eq(listed, &resolver.cached(&core_name).unwrap()));
    }

    #[test]
    fn test_unresolvable_dependency_fails_module() {
        let dir = TempDir::new().unwrap();
        let preview = module_file(dir.path(), "preview", "MODULE needs=libmissing.so");

        let host = Arc::new(FakeHost::default());
        let dyn_host: Arc<dyn ModuleHost> = host.clone();
        let resolver = Arc::new(ModuleResolver::new(
            vec![SearchPath::Recursive(dir.path().to_path_buf())],
            Arc::clone(&dyn_host),
        ));
        let loader = ModuleLoader::new(dyn_host).with_resolver(resolver);

        let registry = loader.load_all(vec![ModuleDescriptor::new(&preview)], &CancellationToken::new());

        let descriptor = &registry.descriptors()[0];
        assert_eq!(descriptor.state(), LoadState::Failed);
        assert!(descriptor.error().unwrap().contains("libmissing.so"));
    }

    #[test]
    fn test_startup_hooks_run_and_contain_failures() {
        let dir = TempDir::new().unwrap();
        let descriptors = vec![
            ModuleDescriptor::new(module_file(dir.path(), "plain", "MODULE")),
            ModuleDescriptor::new(module_file(dir.path(), "hooked", "MODULE hook")),
            ModuleDescriptor::new(module_file(dir.path(), "failing", "MODULE hook=fail")),
            ModuleDescriptor::new(module_file(dir.path(), "panicking", "MODULE hook=panic")),
        ];

        let host = Arc::new(FakeHost::default());
        let registry = loader(&host).load_all(descriptors, &CancellationToken::new());

        assert_eq!(registry.modules().len(), 4);
        assert_eq!(run_startup_hooks(&registry), 1);
    }
}
