//! Handoff server run by the primary instance.
//!
//! Listens on `127.0.0.1:0` (OS-assigned port), publishes the port and a
//! fresh token in the endpoint file, and hands every received
//! [`LaunchRequest`] that presents the token to the [`LaunchHandler`]. The server keeps accepting for the whole life of the
//! primary: users may launch the editor many times while it stays open.
//!
//! Launches are rare, human-triggered events, so connections are handled one
//! at a time; a read timeout keeps a stuck peer from blocking later launches.

use super::endpoint::{remove_endpoint, write_endpoint, Endpoint};
use super::protocol::read_payload;
use crate::args::LaunchRequest;
use crate::config::IpcConfig;
use crate::{Result, ScribeError};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Receives the arguments of secondary launches.
///
/// What happens with the paths (opening documents, focusing the window)
/// belongs to the editor.
#[async_trait::async_trait]
pub trait LaunchHandler: Send + Sync + 'static {
    async fn on_handoff_received(&self, request: LaunchRequest);
}

/// Handle to a running handoff server. Dropping shuts down the server.
pub struct LaunchServerHandle {
    addr: SocketAddr,
    endpoint_path: PathBuf,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl std::fmt::Debug for LaunchServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaunchServerHandle")
            .field("addr", &self.addr)
            .field("endpoint_path", &self.endpoint_path)
            .finish()
    }
}

impl LaunchServerHandle {
    /// Get the address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the endpoint file secondaries read.
    pub fn endpoint_path(&self) -> &Path {
        &self.endpoint_path
    }

    /// Stop accepting connections and withdraw the endpoint.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            remove_endpoint(&self.endpoint_path, std::process::id());
        }
    }

    /// Shut down and wait for the accept loop to finish.
    pub async fn stop(mut self) {
        self.shutdown();
        if let Some(handle) = self.task_handle.take() {
            if let Err(e) = handle.await {
                debug!("Launch server task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for LaunchServerHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

/// Handoff server that listens for secondary launches.
pub struct LaunchServer;

impl LaunchServer {
    /// Start the server and publish its endpoint at `endpoint_path`.
    ///
    /// The server runs in a background tokio task until the returned handle
    /// is shut down or dropped.
    pub async fn start(
        endpoint_path: PathBuf,
        handler: Arc<dyn LaunchHandler>,
    ) -> Result<LaunchServerHandle> {
        let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
        let addr = listener.local_addr()?;

        let endpoint = Endpoint::for_current_process(addr.port());
        write_endpoint(&endpoint_path, &endpoint)?;

        info!("Launch server listening on {}", addr);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task_handle = tokio::spawn(Self::accept_loop(
            listener,
            endpoint.token,
            handler,
            shutdown_rx,
        ));

        Ok(LaunchServerHandle {
            addr,
            endpoint_path,
            shutdown_tx: Some(shutdown_tx),
            task_handle: Some(task_handle),
        })
    }

    async fn accept_loop(
        listener: TcpListener,
        token: String,
        handler: Arc<dyn LaunchHandler>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("Launch server shutting down");
                    break;
                }
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            debug!("Launch connection from {}", peer_addr);
                            if let Err(e) = Self::handle_connection(stream, &token, handler.as_ref()).await {
                                warn!("Dropped launch connection from {}: {}", peer_addr, e);
                            }
                        }
                        Err(e) => {
                            error!("Launch server accept error: {}", e);
                        }
                    }
                }
            }
        }
    }

    async fn handle_connection(
        mut stream: TcpStream,
        token: &str,
        handler: &dyn LaunchHandler,
    ) -> Result<()> {
        let request = tokio::time::timeout(
            IpcConfig::SERVER_READ_TIMEOUT,
            read_payload(&mut stream, token),
        )
            .await
            .map_err(|_| ScribeError::Validation {
                field: "launch_payload".to_string(),
                message: format!(
                    "Peer did not finish sending within {:?}",
                    IpcConfig::SERVER_READ_TIMEOUT
                ),
            })??;

        info!("Received launch handoff with {} argument(s)", request.len());
        handler.on_handoff_received(request).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::endpoint::{endpoint_path, read_endpoint};
    use crate::ipc::protocol::write_payload;
    use tempfile::TempDir;
    use tokio::io::AsyncWriteExt;
    use tokio::sync::mpsc;

    struct ChannelHandler(mpsc::UnboundedSender<LaunchRequest>);

    #[async_trait::async_trait]
    impl LaunchHandler for ChannelHandler {
        async fn on_handoff_received(&self, request: LaunchRequest) {
            let _ = self.0.send(request);
        }
    }

    fn start_args(dir: &TempDir) -> (PathBuf, Arc<dyn LaunchHandler>, mpsc::UnboundedReceiver<LaunchRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler: Arc<dyn LaunchHandler> = Arc::new(ChannelHandler(tx));
        (endpoint_path(dir.path(), "scribe-test"), handler, rx)
    }

    #[tokio::test]
    async fn test_server_publishes_and_withdraws_endpoint() {
        let dir = TempDir::new().unwrap();
        let (path, handler, _rx) = start_args(&dir);
        let mut handle = LaunchServer::start(path.clone(), handler).await.unwrap();

        let endpoint = read_endpoint(&path).unwrap().unwrap();
        assert_eq!(endpoint.port, handle.addr().port());
        assert_eq!(endpoint.pid, std::process::id());

        handle.shutdown();
        assert!(!path.exists());
    }

    fn published_token(handle: &LaunchServerHandle) -> String {
        read_endpoint(handle.endpoint_path()).unwrap().unwrap().token
    }

    #[tokio::test]
    async fn test_server_accepts_repeated_launches() {
        let dir = TempDir::new().unwrap();
        let (path, handler, mut rx) = start_args(&dir);
        let handle = LaunchServer::start(path, handler).await.unwrap();
        let token = published_token(&handle);

        for name in ["/a.md", "/b.md", "/c.md"] {
            let mut stream = TcpStream::connect(handle.addr()).await.unwrap();
            let request = LaunchRequest::new(vec![name.to_string()]);
            write_payload(&mut stream, &token, &request).await.unwrap();
            assert_eq!(rx.recv().await.unwrap(), request);
        }

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_bad_connection_does_not_stop_server() {
        let dir = TempDir::new().unwrap();
        let (path, handler, mut rx) = start_args(&dir);
        let handle = LaunchServer::start(path, handler).await.unwrap();
        let token = published_token(&handle);

        // Invalid UTF-8 is dropped
        let mut bad = TcpStream::connect(handle.addr()).await.unwrap();
        bad.write_all(&[0xff, 0xfe]).await.unwrap();
        bad.shutdown().await.unwrap();
        drop(bad);

        let mut good = TcpStream::connect(handle.addr()).await.unwrap();
        let request = LaunchRequest::new(vec!["/ok.md".to_string()]);
        write_payload(&mut good, &token, &request).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), request);
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_launch_without_endpoint_token_is_dropped() {
        let dir = TempDir::new().unwrap();
        let (path, handler, mut rx) = start_args(&dir);
        let handle = LaunchServer::start(path, handler).await.unwrap();
        let token = published_token(&handle);

        let mut forged = TcpStream::connect(handle.addr()).await.unwrap();
        let injected = LaunchRequest::new(vec!["/tmp/injected.md".to_string()]);
        write_payload(&mut forged, "guessed-token", &injected).await.unwrap();
        drop(forged);

        let mut genuine = TcpStream::connect(handle.addr()).await.unwrap();
        let request = LaunchRequest::new(vec!["/home/writer/notes.md".to_string()]);
        write_payload(&mut genuine, &token, &request).await.unwrap();

        // Connections are served in order, so the forged one was seen first
        assert_eq!(rx.recv().await.unwrap(), request);
        assert!(rx.try_recv().is_err());
        handle.stop().await;
    }
}
