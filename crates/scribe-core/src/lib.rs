//! Scribe Core - Startup layer of the Scribe editor.
//!
//! This crate decides whether a launch becomes the primary instance or hands
//! its arguments to the one already running, and loads add-in modules in the
//! background once the primary is up. It has no UI; windows, splash screens
//! and document handling are supplied by the caller through small traits.
//!
//! # Example
//!
//! ```rust,ignore
//! use scribe_core::{AppContext, LaunchHandler, LaunchRequest, StartupConfig};
//! use scribe_core::{StartupOrchestrator, StartupOutcome};
//! use std::sync::Arc;
//!
//! struct OpenDocuments;
//!
//! #[async_trait::async_trait]
//! impl LaunchHandler for OpenDocuments {
//!     async fn on_handoff_received(&self, request: LaunchRequest) {
//!         for path in request.files() {
//!             println!("open {}", path);
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> scribe_core::Result<()> {
//!     let context = AppContext::from_env(StartupConfig::default())?;
//!     let orchestrator = StartupOrchestrator::new(context, Arc::new(OpenDocuments));
//!
//!     match orchestrator.run(std::env::args().skip(1), None).await {
//!         StartupOutcome::Handoff { .. } => std::process::exit(0),
//!         StartupOutcome::Primary(session) => {
//!             let modules = session.modules().wait().await;
//!             println!("{} add-ins loaded", modules.modules().len());
//!             session.shutdown().await;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod args;
pub mod cancel;
pub mod config;
pub mod error;
pub mod instance;
pub mod ipc;
pub mod modules;
pub mod platform;
pub mod startup;

// Re-export commonly used types
pub use args::{normalize_args, LaunchFlags, LaunchRequest};
pub use cancel::{CancellationToken, CancelledError};
pub use config::{AppConfig, IpcConfig, ModuleConfig, StartupConfig};
pub use error::{Result, ScribeError};
pub use instance::{InstanceCoordinator, NamedLock, ProcessRole, RoleDecision};
pub use ipc::{LaunchClient, LaunchHandler, LaunchServer, LaunchServerHandle};
pub use modules::{
    AddinModule, LoadState, ModuleDescriptor, ModuleHandle, ModuleHost, ModuleLoader,
    ModuleLocator, ModuleRegistry, ModuleRegistryHandle, ModuleResolver, NativeHost, SearchPath,
};
pub use startup::{
    AppContext, AppPaths, ModuleEvents, NoModuleEvents, PrimarySession, SplashScreen,
    StartupOrchestrator, StartupOutcome,
};
