//! The running primary instance.

use crate::args::LaunchRequest;
use crate::cancel::CancellationToken;
use crate::instance::NamedLock;
use crate::ipc::LaunchServerHandle;
use crate::modules::ModuleRegistryHandle;
use std::net::SocketAddr;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Resources owned by the primary instance for the rest of its life.
///
/// Holding the session keeps the instance lock and the handoff server alive.
#[derive(Debug)]
pub struct PrimarySession {
    pub(crate) lock: Option<NamedLock>,
    pub(crate) server: Option<LaunchServerHandle>,
    pub(crate) modules: ModuleRegistryHandle,
    pub(crate) background: Vec<JoinHandle<()>>,
    pub(crate) request: LaunchRequest,
    pub(crate) shutdown: CancellationToken,
}

impl PrimarySession {
    /// Arguments this process was launched with.
    pub fn initial_request(&self) -> &LaunchRequest {
        &self.request
    }

    /// Add-ins, available once the background load pass finishes.
    pub fn modules(&self) -> &ModuleRegistryHandle {
        &self.modules
    }

    /// Whether this process holds the instance lock.
    pub fn holds_lock(&self) -> bool {
        self.lock.is_some()
    }

    /// Address of the handoff server, if one is running.
    pub fn server_addr(&self) -> Option<SocketAddr> {
        self.server.as_ref().map(LaunchServerHandle::addr)
    }

    /// Wait for module loading and environment setup to finish.
    pub async fn join_background(&mut self) {
        for handle in self.background.drain(..) {
            if let Err(e) = handle.await {
                warn!("Background startup task failed: {}", e);
            }
        }
    }

    /// Orderly shutdown: wait for background work, stop the server, release the lock.
    pub async fn shutdown(mut self) {
        self.join_background().await;
        self.stop_and_release().await;
        info!("Primary instance shut down");
    }

    /// Leave before reaching steady state.
    ///
    /// Cancels background work without waiting for it, then stops the server
    /// and releases the lock so another instance can take over.
    pub async fn abort(mut self) {
        self.shutdown.cancel();
        self.background.clear();
        self.stop_and_release().await;
        info!("Primary instance aborted");
    }

    async fn stop_and_release(&mut self) {
        if let Some(server) = self.server.take() {
            server.stop().await;
        }
        if let Some(lock) = self.lock.take() {
            lock.release();
        }
    }
}
