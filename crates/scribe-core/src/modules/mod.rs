//! Add-in discovery, loading and dependency resolution.
//!
//! # Architecture
//!
//! - **Locator**: Walks the bundled and external add-in roots for module files
//! - **Loader**: Loads each module through a [`ModuleHost`], isolating failures
//! - **Resolver**: Finds libraries a module depends on but could not locate
//! - **Registry**: Records the outcome and publishes it when loading finishes

pub mod descriptor;
pub mod host;
pub mod loader;
pub mod locator;
pub mod registry;
pub mod resolver;

pub use descriptor::{LoadState, ModuleDescriptor};
pub use host::{AddinModule, ModuleHandle, ModuleHost, NativeHost};
pub use loader::{run_startup_hooks, ModuleLoader};
pub use locator::ModuleLocator;
pub use registry::{ModuleRegistry, ModuleRegistryHandle};
pub use resolver::{ModuleResolver, SearchPath};
