//! Collaborators the launcher plugs into the startup core.
//!
//! The editor UI is not part of this binary, so handed-off launches and add-in
//! events are reported through the log.

use scribe_core::{
    LaunchFlags, LaunchHandler, LaunchRequest, ModuleDescriptor, ModuleEvents, ModuleRegistry,
};
use tracing::{info, warn};

/// Reports launches handed off by secondary instances.
pub struct LoggingHandler;

#[async_trait::async_trait]
impl LaunchHandler for LoggingHandler {
    async fn on_handoff_received(&self, request: LaunchRequest) {
        let flags = LaunchFlags::from_request(&request);
        info!(
            "Handoff received: {} file(s), new window: {}",
            request.files().count(),
            flags.force_new_window
        );
        for file in request.files() {
            info!("Open {}", file);
        }
    }
}

/// Reports the outcome of the add-in load pass.
pub struct LoggingEvents;

impl ModuleEvents for LoggingEvents {
    fn on_modules_loaded(&self, registry: &ModuleRegistry) {
        info!(
            "Add-in loading complete: {} loaded, {} failed",
            registry.modules().len(),
            registry.failed().count()
        );
    }

    fn on_module_load_failed(&self, descriptor: &ModuleDescriptor) {
        warn!(
            "Add-in {} could not be loaded: {}",
            descriptor.path().display(),
            descriptor.error().unwrap_or("unknown error")
        );
    }
}
