//! Outcome of the add-in load pass and its publication.

use super::descriptor::{LoadState, ModuleDescriptor};
use super::host::ModuleHandle;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

/// Every module the load pass saw, and the ones it loaded.
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    descriptors: Vec<ModuleDescriptor>,
    modules: Vec<ModuleHandle>,
}

impl ModuleRegistry {
    pub(crate) fn record(&mut self, descriptor: ModuleDescriptor, module: Option<ModuleHandle>) {
        if let Some(module) = module {
            self.modules.push(module);
        }
        self.descriptors.push(descriptor);
    }

    /// Descriptors in discovery order.
    pub fn descriptors(&self) -> &[ModuleDescriptor] {
        &self.descriptors
    }

    /// Loaded modules in load order.
    pub fn modules(&self) -> &[ModuleHandle] {
        &self.modules
    }

    pub fn get(&self, identity: &str) -> Option<&ModuleHandle> {
        self.modules.iter().find(|m| m.identity() == identity)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ModuleDescriptor> {
        self.with_state(LoadState::Failed)
    }

    pub fn with_state(&self, state: LoadState) -> impl Iterator<Item = &ModuleDescriptor> {
        self.descriptors.iter().filter(move |d| d.state() == state)
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Shared view of the registry that becomes available when loading finishes.
///
/// Until then, [`get`](Self::get) returns `None`; callers that need the
/// modules can [`wait`](Self::wait) for them.
#[derive(Debug, Clone)]
pub struct ModuleRegistryHandle {
    tx: Arc<watch::Sender<Option<Arc<ModuleRegistry>>>>,
}

impl Default for ModuleRegistryHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleRegistryHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// The registry, if loading has finished.
    pub fn get(&self) -> Option<Arc<ModuleRegistry>> {
        self.tx.borrow().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Wait until the registry is published.
    pub async fn wait(&self) -> Arc<ModuleRegistry> {
        let mut rx = self.tx.subscribe();
        loop {
            let current = rx.borrow_and_update().clone();
            if let Some(registry) = current {
                return registry;
            }
            // The sender lives in `self`, so the channel cannot close here
            if rx.changed().await.is_err() {
                return Arc::new(ModuleRegistry::default());
            }
        }
    }

    /// Publish the load outcome. Only the first publication counts.
    pub fn publish(&self, registry: ModuleRegistry) -> Arc<ModuleRegistry> {
        let registry = Arc::new(registry);
        let published = self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(Arc::clone(&registry));
            true
        });
        if !published {
            warn!("Module registry already published, ignoring second publication");
        }
        registry
    }
}
