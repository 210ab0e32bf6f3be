//! Platform-specific path utilities.
//!
//! This module provides functions to get platform-specific paths for:
//! - Per-user configuration and data folders
//! - The runtime folder holding the instance lock and handoff endpoint
//! - The installation directory and native library file names

use crate::config::AppConfig;
use crate::error::{Result, ScribeError};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Get the per-user data folder.
///
/// # Platform Behavior
/// - **Linux**: `~/.local/share/scribe`
/// - **Windows**: `%APPDATA%\scribe`
/// - **macOS**: `~/Library/Application Support/scribe`
///
/// Falls back to the temp directory when no data directory is known.
pub fn user_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(AppConfig::DATA_DIR_NAME)
}

/// Get the path of the user's configuration file.
pub fn config_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(AppConfig::DATA_DIR_NAME)
        .join(AppConfig::CONFIG_FILE_NAME)
}

/// Get the folder shared by every instance of the current user.
///
/// # Platform Behavior
/// - **Linux**: `$XDG_RUNTIME_DIR/scribe`, else `$TMPDIR/scribe`
/// - **Windows/macOS**: `%TEMP%\scribe` / `$TMPDIR/scribe`
pub fn runtime_dir() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(AppConfig::DATA_DIR_NAME)
}

/// Get the directory containing the running executable.
pub fn install_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().map_err(|e| ScribeError::Io {
        message: format!("Failed to locate executable: {}", e),
        path: None,
        source: Some(e),
    })?;
    exe.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| ScribeError::Config {
            message: format!("Executable has no parent directory: {}", exe.display()),
        })
}

/// Whether `path` has the platform's loadable-module extension.
///
/// # Platform Behavior
/// - **Linux**: `.so`
/// - **Windows**: `.dll`
/// - **macOS**: `.dylib`
pub fn is_module_file(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| ext.eq_ignore_ascii_case(std::env::consts::DLL_EXTENSION))
        .unwrap_or(false)
}

/// Turn a library name into the file name the platform would use for it.
///
/// Names that already carry the platform suffix (including versioned Unix
/// sonames such as `libfoo.so.1`) are returned unchanged.
pub fn library_file_name(name: &str) -> String {
    let suffix = std::env::consts::DLL_SUFFIX;
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(suffix) || lower.contains(&format!("{}.", suffix)) {
        return name.to_string();
    }
    libloading::library_filename(name)
        .to_string_lossy()
        .into_owned()
}

/// Whether `dir` is listed on the `PATH` environment variable.
pub fn is_on_search_path(dir: &Path) -> bool {
    std::env::var_os("PATH")
        .map(|path| std::env::split_paths(&path).any(|entry| entry == dir))
        .unwrap_or(false)
}
