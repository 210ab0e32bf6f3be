//! Handoff client run by a secondary instance.
//!
//! Makes one best-effort delivery: wait for the primary's endpoint, connect,
//! write the endpoint token and the payload, close. The whole attempt is
//! bounded by a timeout and by the shutdown token. A secondary exits whether
//! or not delivery succeeded: losing one launch's file list is better than a
//! process that never exits.

use super::endpoint::{read_endpoint, Endpoint};
use super::protocol::write_payload;
use crate::args::LaunchRequest;
use crate::cancel::CancellationToken;
use crate::config::IpcConfig;
use crate::{Result, ScribeError};
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Client that delivers a [`LaunchRequest`] to the primary instance.
#[derive(Debug, Clone)]
pub struct LaunchClient {
    endpoint_path: PathBuf,
    timeout: Duration,
}

impl LaunchClient {
    /// Create a client for the endpoint published at `endpoint_path`.
    ///
    /// Uses [`IpcConfig::CLIENT_TIMEOUT`] unless overridden.
    pub fn new(endpoint_path: impl Into<PathBuf>) -> Self {
        Self {
            endpoint_path: endpoint_path.into(),
            timeout: IpcConfig::CLIENT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Deliver `request` to the primary.
    ///
    /// Returns `InstanceUnreachable` when no primary accepted the payload in
    /// time and `Cancelled` when `cancel` fired first.
    pub async fn send(&self, request: &LaunchRequest, cancel: &CancellationToken) -> Result<()> {
        tokio::select! {
            _ = cancel.cancelled() => Err(ScribeError::Cancelled),
            result = tokio::time::timeout(self.timeout, self.deliver(request)) => {
                result.map_err(|_| ScribeError::InstanceUnreachable {
                    message: format!(
                        "no primary accepted the launch within {:?}",
                        self.timeout
                    ),
                })?
            }
        }
    }

    async fn deliver(&self, request: &LaunchRequest) -> Result<()> {
        let (mut stream, endpoint) = self.connect().await;
        write_payload(&mut stream, &endpoint.token, request)
            .await
            .map_err(|e| ScribeError::InstanceUnreachable {
                message: format!("failed to write launch payload: {}", e),
            })?;
        debug!("Delivered launch with {} argument(s)", request.len());
        Ok(())
    }

    /// Connect to the published endpoint, retrying while the primary is
    /// still starting its server. Bounded by the caller's timeout.
    async fn connect(&self) -> (TcpStream, Endpoint) {
        loop {
            match read_endpoint(&self.endpoint_path) {
                Ok(Some(endpoint)) => match TcpStream::connect(endpoint.addr()).await {
                    Ok(stream) => {
                        debug!("Connected to primary (PID {}) at {}", endpoint.pid, endpoint.addr());
                        return (stream, endpoint);
                    }
                    Err(e) => debug!("Primary at {} not accepting yet: {}", endpoint.addr(), e),
                },
                Ok(None) => debug!("No endpoint published at {} yet", self.endpoint_path.display()),
                Err(e) => debug!("Unreadable endpoint: {}", e),
            }
            tokio::time::sleep(IpcConfig::CLIENT_RETRY_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::endpoint::endpoint_path;
    use crate::ipc::server::{LaunchHandler, LaunchServer};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    struct ChannelHandler(mpsc::UnboundedSender<LaunchRequest>);

    #[async_trait::async_trait]
    impl LaunchHandler for ChannelHandler {
        async fn on_handoff_received(&self, request: LaunchRequest) {
            let _ = self.0.send(request);
        }
    }

    #[tokio::test]
    async fn test_client_delivers_request() {
        let dir = TempDir::new().unwrap();
        let path = endpoint_path(dir.path(), "scribe-test");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = LaunchServer::start(path.clone(), Arc::new(ChannelHandler(tx)))
            .await
            .unwrap();

        let request = LaunchRequest::new(vec![
            "/home/writer/notes.md".to_string(),
            "-nosplash".to_string(),
        ]);
        LaunchClient::new(&path)
            .send(&request, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap(), request);
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_client_without_primary_times_out() {
        let dir = TempDir::new().unwrap();
        let client = LaunchClient::new(endpoint_path(dir.path(), "scribe-none"))
            .with_timeout(Duration::from_millis(200));

        let result = client
            .send(&LaunchRequest::default(), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ScribeError::InstanceUnreachable { .. })));
    }

    #[tokio::test]
    async fn test_client_stops_on_cancel() {
        let dir = TempDir::new().unwrap();
        let client = LaunchClient::new(endpoint_path(dir.path(), "scribe-none"))
            .with_timeout(Duration::from_secs(30));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = client.send(&LaunchRequest::default(), &cancel).await;
        assert!(matches!(result, Err(ScribeError::Cancelled)));
    }

    #[tokio::test]
    async fn test_client_waits_for_late_server() {
        let dir = TempDir::new().unwrap();
        let path = endpoint_path(dir.path(), "scribe-late");
        let (tx, mut rx) = mpsc::unbounded_channel();

        let server_path = path.clone();
        let server = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            LaunchServer::start(server_path, Arc::new(ChannelHandler(tx)))
                .await
                .unwrap()
        });

        let request = LaunchRequest::new(vec!["/late.md".to_string()]);
        LaunchClient::new(&path)
            .send(&request, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap(), request);
        server.await.unwrap().stop().await;
    }
}
