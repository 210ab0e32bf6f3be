//! Discovery of the primary's handoff listener.
//!
//! The primary listens on a loopback port chosen by the OS and publishes it
//! in `<runtime_dir>/<instance_name>.endpoint`. The file is replaced
//! atomically so a secondary never reads a half-written endpoint. It also
//! carries a random token that every handoff must present, so other local
//! users who can reach the port but not the file cannot inject launches.

use crate::config::IpcConfig;
use crate::{Result, ScribeError};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where a primary instance accepts handoffs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub pid: u32,
    pub port: u16,
    /// Secret a client sends as the first payload line.
    pub token: String,
}

impl Endpoint {
    /// Endpoint for this process on `port`, with a fresh token.
    pub fn for_current_process(port: u16) -> Self {
        Self {
            pid: std::process::id(),
            port,
            token: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, self.port))
    }
}

/// Path of the endpoint file for instance `name`.
pub fn endpoint_path(runtime_dir: &Path, name: &str) -> PathBuf {
    runtime_dir.join(format!("{}.{}", name, IpcConfig::ENDPOINT_FILE_EXTENSION))
}

/// Publish `endpoint` at `path`, replacing any previous file.
pub fn write_endpoint(path: &Path, endpoint: &Endpoint) -> Result<()> {
    let dir = path.parent().ok_or_else(|| ScribeError::Config {
        message: format!("Endpoint path has no parent: {}", path.display()),
    })?;
    std::fs::create_dir_all(dir).map_err(|e| ScribeError::io_with_path(e, dir))?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| ScribeError::io_with_path(e, dir))?;
    serde_json::to_writer(&mut temp, endpoint)?;
    temp.flush()?;
    temp.persist(path)
        .map_err(|e| ScribeError::io_with_path(e.error, path))?;

    debug!(
        "Published endpoint (PID {}, port {}) at {}",
        endpoint.pid,
        endpoint.port,
        path.display()
    );
    Ok(())
}

/// Read the endpoint at `path`; `Ok(None)` when no primary has published one.
pub fn read_endpoint(path: &Path) -> Result<Option<Endpoint>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ScribeError::io_with_path(e, path)),
    };
    let endpoint = serde_json::from_str(&content).map_err(|e| ScribeError::Json {
        message: format!("Failed to parse endpoint {}: {}", path.display(), e),
        source: Some(e),
    })?;
    Ok(Some(endpoint))
}

/// Remove the endpoint file if it still belongs to process `pid`.
pub fn remove_endpoint(path: &Path, pid: u32) {
    match read_endpoint(path) {
        Ok(Some(endpoint)) if endpoint.pid == pid => {
            if let Err(e) = std::fs::remove_file(path) {
                debug!("Failed to remove endpoint {}: {}", path.display(), e);
            }
        }
        Ok(_) => {}
        Err(e) => debug!("Leaving unreadable endpoint {} in place: {}", path.display(), e),
    }
}
