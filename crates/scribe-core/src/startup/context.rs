//! Process-wide startup state passed explicitly to the orchestrator.

use crate::args::{normalize_args, LaunchRequest};
use crate::cancel::CancellationToken;
use crate::config::{ModuleConfig, StartupConfig};
use crate::error::{Result, ScribeError};
use crate::platform;
use std::path::PathBuf;
use tracing::warn;

/// Directories startup works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    /// Directory of the running executable.
    pub install_dir: PathBuf,
    /// Per-user directory holding the instance lock and handoff endpoint.
    pub runtime_dir: PathBuf,
    /// Add-ins shipped with the application, searched first.
    pub bundled_addins_dir: PathBuf,
    /// User-installed add-ins, searched after the bundled ones.
    pub addins_folder: PathBuf,
    pub common_folder: PathBuf,
}

impl AppPaths {
    /// Derive the paths from configuration and the two process-specific roots.
    pub fn from_config(
        config: &StartupConfig,
        install_dir: impl Into<PathBuf>,
        runtime_dir: impl Into<PathBuf>,
    ) -> Self {
        let install_dir = install_dir.into();
        Self {
            bundled_addins_dir: install_dir.join(ModuleConfig::BUNDLED_ADDINS_DIR_NAME),
            install_dir,
            runtime_dir: runtime_dir.into(),
            addins_folder: config.addins_folder(),
            common_folder: config.common_folder(),
        }
    }
}

/// Everything startup needs to know about the process.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub config: StartupConfig,
    pub paths: AppPaths,
    /// Relative launch arguments are resolved against this directory.
    pub working_dir: PathBuf,
    /// Fired when the application shuts down. Cancels handoff and module loading.
    pub shutdown: CancellationToken,
    /// Skip the single-instance check regardless of the launch arguments.
    pub force_new_window: bool,
}

impl AppContext {
    pub fn new(config: StartupConfig, paths: AppPaths, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            paths,
            working_dir: working_dir.into(),
            shutdown: CancellationToken::new(),
            force_new_window: false,
        }
    }

    /// Build the context for the current process.
    ///
    /// Failing to read the working directory is the one fatal startup error:
    /// without it, relative launch paths cannot be resolved.
    pub fn from_env(config: StartupConfig) -> Result<Self> {
        let working_dir = std::env::current_dir().map_err(|e| ScribeError::Io {
            message: format!("Failed to determine working directory: {}", e),
            path: None,
            source: Some(e),
        })?;

        let install_dir = platform::install_dir().unwrap_or_else(|e| {
            warn!("{}; using the working directory as install directory", e);
            working_dir.clone()
        });
        let paths = AppPaths::from_config(&config, install_dir, platform::runtime_dir());

        Ok(Self::new(config, paths, working_dir))
    }

    /// Force multi-instance mode.
    ///
    /// Default: `false`
    pub fn with_force_new_window(mut self, force: bool) -> Self {
        self.force_new_window = force;
        self
    }

    /// Normalize raw launch arguments against the working directory.
    pub fn normalize<I, S>(&self, raw: I) -> LaunchRequest
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        normalize_args(raw, &self.working_dir)
    }
}
