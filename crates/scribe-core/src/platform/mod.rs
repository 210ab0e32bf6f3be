//! Platform abstraction layer for cross-platform compatibility.
//!
//! This module centralizes all platform-specific code to make it easy to find,
//! maintain, and extend. All `#[cfg]` blocks for OS-specific behavior should
//! live in this module rather than scattered throughout the codebase.
//!
//! # Architecture
//!
//! - `paths` - Platform-specific directory and file paths
//! - `dylib` - Native dynamic library loading (the crate's only FFI boundary)
//!
//! # Supported Platforms
//!
//! - **Linux**: Full support
//! - **Windows**: Full support
//! - **macOS**: Full support

pub mod dylib;
pub mod paths;

pub use dylib::NativeLibrary;
pub use paths::{config_file, install_dir, is_module_file, library_file_name, runtime_dir};

/// Returns the current platform name.
pub fn current_platform() -> &'static str {
    #[cfg(target_os = "linux")]
    {
        "linux"
    }
    #[cfg(target_os = "windows")]
    {
        "windows"
    }
    #[cfg(target_os = "macos")]
    {
        "macos"
    }
    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        "unknown"
    }
}
