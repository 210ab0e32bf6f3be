//! Loading module files into the process.
//!
//! [`ModuleHost`] is the seam between the load pass and the dynamic loader.
//! [`NativeHost`] maps native libraries; tests and embedders can supply their
//! own host.

use crate::config::ModuleConfig;
use crate::platform::NativeLibrary;
use crate::{Result, ScribeError};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// A module loaded into the process.
pub trait AddinModule: Send + Sync + fmt::Debug {
    /// Identity used for resolution lookups (the module's file name).
    fn identity(&self) -> &str;

    fn path(&self) -> &Path;

    /// Whether the module wants to run code once the application has started.
    fn has_startup_hook(&self) -> bool {
        false
    }

    /// Run the module's application-start hook.
    fn on_application_start(&self) -> Result<()> {
        Ok(())
    }
}

/// Shared handle to a loaded module. Modules stay loaded while any handle lives.
pub type ModuleHandle = Arc<dyn AddinModule>;

/// Loads a module file into the process.
pub trait ModuleHost: Send + Sync {
    fn load(&self, path: &Path) -> Result<ModuleHandle>;
}

/// Host that maps native dynamic libraries.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeHost;

impl ModuleHost for NativeHost {
    fn load(&self, path: &Path) -> Result<ModuleHandle> {
        let library = NativeLibrary::open(path)
            .map_err(|e| ScribeError::module_load(path, e.to_string()))?;
        let has_startup_hook = library.has_symbol(ModuleConfig::STARTUP_HOOK_SYMBOL);
        let identity = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        debug!(
            "Mapped {} (startup hook: {})",
            path.display(),
            has_startup_hook
        );

        Ok(Arc::new(NativeModule {
            identity,
            library,
            has_startup_hook,
        }))
    }
}

/// A native library loaded as an add-in.
#[derive(Debug)]
pub struct NativeModule {
    identity: String,
    library: NativeLibrary,
    has_startup_hook: bool,
}

impl AddinModule for NativeModule {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn path(&self) -> &Path {
        self.library.path()
    }

    fn has_startup_hook(&self) -> bool {
        self.has_startup_hook
    }

    fn on_application_start(&self) -> Result<()> {
        match self.library.call_status_fn(ModuleConfig::STARTUP_HOOK_SYMBOL) {
            None | Some(0) => Ok(()),
            Some(status) => Err(ScribeError::ModuleHook {
                module: self.identity.clone(),
                message: format!("hook returned status {}", status),
            }),
        }
    }
}

/// Extract the dependency a native loader error says is missing.
///
/// Understands the glibc (`libfoo.so.1: cannot open shared object file`) and
/// dyld (`Library not loaded: @rpath/libfoo.dylib`) messages. Returns `None`
/// when the message is about `module_path` itself or names no dependency.
///
/// # Platform Behavior
/// - **Windows**: `LoadLibraryExW` reports only "The specified module could
///   not be found. (os error 126)" without naming the dependency, so this
///   always returns `None` and the resolution fallback does not run there.
///   Dependencies must sit next to the module or on the DLL search path.
pub fn missing_dependency(message: &str, module_path: &Path) -> Option<String> {
    const GLIBC_MARKER: &str = ": cannot open shared object file";
    const DYLD_MARKER: &str = "Library not loaded: ";

    let named = if let Some(idx) = message.find(GLIBC_MARKER) {
        message[..idx].rsplit(": ").next()?.trim()
    } else if let Some(idx) = message.find(DYLD_MARKER) {
        message[idx + DYLD_MARKER.len()..]
            .split(char::is_whitespace)
            .next()?
    } else {
        return None;
    };

    let file_name = Path::new(named).file_name()?;
    if module_path.file_name() == Some(file_name) {
        return None;
    }
    Some(file_name.to_string_lossy().into_owned())
}
