//! Error types for the Scribe startup core.
//!
//! Almost every failure in this crate is recovered locally (fail-open lock,
//! abandoned handoff, skipped module). The variants here exist so those
//! failures can be logged and recorded with enough context to diagnose them.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the startup core.
#[derive(Debug, Error)]
pub enum ScribeError {
    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Validation errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // Instance coordination errors
    #[error("Instance lock {path} could not be acquired: {message}")]
    LockUnavailable { path: PathBuf, message: String },

    #[error("Primary instance is not reachable: {message}")]
    InstanceUnreachable { message: String },

    // Module errors
    #[error("Failed to load module {path}: {message}")]
    ModuleLoad { path: PathBuf, message: String },

    #[error("Startup hook of module {module} failed: {message}")]
    ModuleHook { module: String, message: String },

    #[error("Operation was cancelled")]
    Cancelled,

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for startup core operations.
pub type Result<T> = std::result::Result<T, ScribeError>;

impl From<std::io::Error> for ScribeError {
    fn from(err: std::io::Error) -> Self {
        ScribeError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for ScribeError {
    fn from(err: serde_json::Error) -> Self {
        ScribeError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl ScribeError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        ScribeError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a module load error.
    pub fn module_load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ScribeError::ModuleLoad {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether this error means the operation stopped because shutdown was requested.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ScribeError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ScribeError::module_load("/opt/scribe/Addins/broken.so", "invalid ELF header");
        assert_eq!(
            err.to_string(),
            "Failed to load module /opt/scribe/Addins/broken.so: invalid ELF header"
        );
    }

    #[test]
    fn test_io_with_path_keeps_path() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        match ScribeError::io_with_path(io, "/tmp/scribe.lock") {
            ScribeError::Io { path, source, .. } => {
                assert_eq!(path, Some(PathBuf::from("/tmp/scribe.lock")));
                assert!(source.is_some());
            }
            other => panic!("Expected Io, got: {:?}", other),
        }
    }

    #[test]
    fn test_is_cancelled() {
        assert!(ScribeError::Cancelled.is_cancelled());
        assert!(!ScribeError::Other("x".into()).is_cancelled());
    }
}
