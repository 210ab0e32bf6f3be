//! Centralized configuration for the Scribe startup core.
//!
//! Compile-time constants live in the `*Config` tables. User-editable settings
//! are read once at startup into [`StartupConfig`].

use crate::platform::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "Scribe";
    /// Fixed identity shared by the instance lock and the handoff channel.
    pub const INSTANCE_NAME: &'static str = "scribe-editor";
    pub const CONFIG_FILE_NAME: &'static str = "scribe.json";
    pub const DATA_DIR_NAME: &'static str = "scribe";
    pub const COMMON_DIR_NAME: &'static str = "Common";
}

/// Handoff channel limits and timeouts.
pub struct IpcConfig;

impl IpcConfig {
    /// Upper bound for the whole client attempt (endpoint lookup, connect, write).
    pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(2);
    /// Delay between endpoint lookups while the primary is still starting.
    pub const CLIENT_RETRY_INTERVAL: Duration = Duration::from_millis(50);
    /// Time a connected peer gets to deliver its payload.
    pub const SERVER_READ_TIMEOUT: Duration = Duration::from_secs(5);
    pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024; // 1MB
    pub const LOCK_FILE_EXTENSION: &'static str = "lock";
    pub const ENDPOINT_FILE_EXTENSION: &'static str = "endpoint";
}

/// Add-in discovery and loading settings.
pub struct ModuleConfig;

impl ModuleConfig {
    pub const BUNDLED_ADDINS_DIR_NAME: &'static str = "Addins";
    /// Exported symbol a module may provide to run code at application start.
    pub const STARTUP_HOOK_SYMBOL: &'static [u8] = b"scribe_addin_on_start\0";
    /// Identities containing this marker are resource bundles and never resolved.
    pub const RESOURCE_BUNDLE_MARKER: &'static str = ".resources";
    /// Distinct missing dependencies resolved for a single module before giving up.
    pub const MAX_DEPENDENCY_RETRIES: usize = 8;
}

/// Settings read from the user's configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StartupConfig {
    /// Hand launches off to an already running instance.
    pub use_single_instance: bool,
    /// Skip add-in discovery entirely.
    pub addins_disabled: bool,
    /// External add-ins folder searched after the bundled one.
    pub addins_folder: Option<PathBuf>,
    pub disable_splash_screen: bool,
    /// Shared data folder created by the environment setup task.
    pub common_folder: Option<PathBuf>,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            use_single_instance: true,
            addins_disabled: false,
            addins_folder: None,
            disable_splash_screen: false,
            common_folder: None,
        }
    }
}

impl StartupConfig {
    /// Read the configuration file.
    ///
    /// A missing file yields defaults. An unreadable or malformed file is
    /// logged and also yields defaults: configuration problems never block
    /// startup.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No configuration at {}, using defaults", path.display());
                return Self::default();
            }
            Err(e) => {
                warn!("Failed to read configuration {}: {}", path.display(), e);
                return Self::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!("Invalid configuration {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// External add-ins folder, falling back to the per-user data directory.
    pub fn addins_folder(&self) -> PathBuf {
        self.addins_folder
            .clone()
            .unwrap_or_else(|| paths::user_data_dir().join(ModuleConfig::BUNDLED_ADDINS_DIR_NAME))
    }

    /// Common data folder, falling back to the per-user data directory.
    pub fn common_folder(&self) -> PathBuf {
        self.common_folder
            .clone()
            .unwrap_or_else(|| paths::user_data_dir().join(AppConfig::COMMON_DIR_NAME))
    }
}
