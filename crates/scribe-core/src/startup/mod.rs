//! Startup orchestration.
//!
//! Runs once on process entry, before any window appears:
//!
//! 1. Normalize the launch arguments.
//! 2. Decide the process role through the instance lock (unless
//!    single-instance mode is off or a new window was forced).
//! 3. **Secondary**: hand the arguments to the primary, close the splash and
//!    return [`StartupOutcome::Handoff`]. The caller exits.
//! 4. **Primary**: start the handoff server, dispatch module loading and
//!    environment setup to the background, and return a [`PrimarySession`].

mod context;
mod session;

pub use context::{AppContext, AppPaths};
pub use session::PrimarySession;

use crate::args::{LaunchFlags, LaunchRequest};
use crate::config::{AppConfig, IpcConfig};
use crate::instance::{InstanceCoordinator, ProcessRole};
use crate::ipc::{endpoint_path, LaunchClient, LaunchHandler, LaunchServer, LaunchServerHandle};
use crate::modules::{
    run_startup_hooks, ModuleDescriptor, ModuleHost, ModuleLoader, ModuleLocator, ModuleRegistry,
    ModuleRegistryHandle, ModuleResolver, NativeHost, SearchPath,
};
use crate::platform::{self, paths::is_on_search_path};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Notifications about the add-in load pass.
///
/// Called from the background loading worker, after the registry has been
/// published.
pub trait ModuleEvents: Send + Sync {
    /// Every module has been processed (or loading was skipped or cancelled).
    fn on_modules_loaded(&self, _registry: &ModuleRegistry) {}

    /// Called once per module that failed to load.
    fn on_module_load_failed(&self, _descriptor: &ModuleDescriptor) {}
}

/// [`ModuleEvents`] that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoModuleEvents;

impl ModuleEvents for NoModuleEvents {}

/// A splash window shown while the application starts.
pub trait SplashScreen: Send {
    fn close(&mut self);
}

/// How startup ended.
#[derive(Debug)]
pub enum StartupOutcome {
    /// Another instance owns the application. The process should exit with
    /// status 0 whether or not the arguments were delivered.
    Handoff { delivered: bool },
    /// This process is the primary instance.
    Primary(PrimarySession),
}

/// Sequences the startup of one process.
pub struct StartupOrchestrator {
    context: AppContext,
    handler: Arc<dyn LaunchHandler>,
    host: Arc<dyn ModuleHost>,
    events: Arc<dyn ModuleEvents>,
    handoff_timeout: Duration,
}

impl StartupOrchestrator {
    /// Create an orchestrator that passes secondary launches to `handler`.
    pub fn new(context: AppContext, handler: Arc<dyn LaunchHandler>) -> Self {
        Self {
            context,
            handler,
            host: Arc::new(NativeHost),
            events: Arc::new(NoModuleEvents),
            handoff_timeout: IpcConfig::CLIENT_TIMEOUT,
        }
    }

    /// Load add-ins through `host`.
    ///
    /// Default: [`NativeHost`]
    pub fn with_module_host(mut self, host: Arc<dyn ModuleHost>) -> Self {
        self.host = host;
        self
    }

    /// Receive add-in load notifications.
    ///
    /// Default: [`NoModuleEvents`]
    pub fn with_module_events(mut self, events: Arc<dyn ModuleEvents>) -> Self {
        self.events = events;
        self
    }

    /// Bound the secondary's delivery attempt.
    ///
    /// Default: [`IpcConfig::CLIENT_TIMEOUT`]
    pub fn with_handoff_timeout(mut self, timeout: Duration) -> Self {
        self.handoff_timeout = timeout;
        self
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    /// Run startup for the raw launch arguments (argv without the program name).
    pub async fn run<I, S>(
        &self,
        raw_args: I,
        splash: Option<&mut dyn SplashScreen>,
    ) -> StartupOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let request = self.context.normalize(raw_args);
        let flags = LaunchFlags::from_request(&request);
        let single_instance = self.context.config.use_single_instance
            && !self.context.force_new_window
            && !flags.force_new_window;

        let mut lock = None;
        let mut server = None;

        if single_instance {
            let coordinator =
                InstanceCoordinator::new(&self.context.paths.runtime_dir, AppConfig::INSTANCE_NAME);
            let decision = coordinator.determine_role();

            if decision.role() == ProcessRole::Secondary {
                let delivered = self.hand_off(&request).await;
                if let Some(splash) = splash {
                    splash.close();
                }
                return StartupOutcome::Handoff { delivered };
            }

            lock = decision.into_lock();
            server = self.start_server().await;
        } else {
            info!("Single-instance check skipped");
        }

        let modules = ModuleRegistryHandle::new();
        let background = vec![
            self.spawn_module_load(modules.clone()),
            self.spawn_environment_setup(),
        ];

        info!(
            "{} primary instance started on {}",
            AppConfig::APP_NAME,
            platform::current_platform()
        );

        StartupOutcome::Primary(PrimarySession {
            lock,
            server,
            modules,
            background,
            request,
            shutdown: self.context.shutdown.clone(),
        })
    }

    /// One bounded delivery attempt. Failure is not an error for a secondary.
    async fn hand_off(&self, request: &LaunchRequest) -> bool {
        let endpoint = endpoint_path(&self.context.paths.runtime_dir, AppConfig::INSTANCE_NAME);
        let client = LaunchClient::new(endpoint).with_timeout(self.handoff_timeout);

        match client.send(request, &self.context.shutdown).await {
            Ok(()) => {
                info!("Handed {} argument(s) to the primary instance", request.len());
                true
            }
            Err(e) => {
                debug!("Handoff abandoned: {}", e);
                false
            }
        }
    }

    async fn start_server(&self) -> Option<LaunchServerHandle> {
        let endpoint = endpoint_path(&self.context.paths.runtime_dir, AppConfig::INSTANCE_NAME);
        match LaunchServer::start(endpoint, Arc::clone(&self.handler)).await {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!("Failed to start launch server, continuing without it: {}", e);
                None
            }
        }
    }

    fn spawn_module_load(&self, handle: ModuleRegistryHandle) -> JoinHandle<()> {
        let disabled = self.context.config.addins_disabled;
        let paths = self.context.paths.clone();
        let host = Arc::clone(&self.host);
        let events = Arc::clone(&self.events);
        let cancel = self.context.shutdown.clone();

        tokio::task::spawn_blocking(move || {
            if disabled {
                info!("Add-ins are disabled");
                let registry = handle.publish(ModuleRegistry::default());
                events.on_modules_loaded(&registry);
                return;
            }

            let resolver = Arc::new(ModuleResolver::new(
                vec![
                    SearchPath::Direct(paths.install_dir.clone()),
                    SearchPath::Recursive(paths.bundled_addins_dir.clone()),
                    SearchPath::Recursive(paths.addins_folder.clone()),
                ],
                Arc::clone(&host),
            ));
            let loader = ModuleLoader::new(host).with_resolver(resolver);
            let locator = ModuleLocator::new(vec![paths.bundled_addins_dir, paths.addins_folder]);

            let registry = handle.publish(loader.load_all(locator.locate(), &cancel));

            events.on_modules_loaded(&registry);
            for descriptor in registry.failed() {
                events.on_module_load_failed(descriptor);
            }

            if !cancel.is_cancelled() {
                run_startup_hooks(&registry);
            }
        })
    }

    fn spawn_environment_setup(&self) -> JoinHandle<()> {
        let common_folder = self.context.paths.common_folder.clone();
        let install_dir = self.context.paths.install_dir.clone();

        tokio::spawn(async move {
            match tokio::fs::create_dir_all(&common_folder).await {
                Ok(()) => debug!("Common folder ready at {}", common_folder.display()),
                Err(e) => warn!(
                    "Failed to create common folder {}: {}",
                    common_folder.display(),
                    e
                ),
            }

            if !is_on_search_path(&install_dir) {
                debug!("{} is not on PATH", install_dir.display());
            }
        })
    }
}
