/// Responder server lifecycle
use super::routes::{create_router, AppState};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// HTTP server for media and the selection API
pub struct MediaServer {
    addr: SocketAddr,
    state: AppState,
    server_handle: Option<JoinHandle<()>>,
}

impl MediaServer {
    /// Create a new media server
    ///
    /// # Arguments
    /// * `addr` - Address to bind to (port 0 picks a free port)
    /// * `state` - Controller and library shared with the handlers
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        Self {
            addr,
            state,
            server_handle: None,
        }
    }

    /// Bind and start serving in a background task
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting media server on {}", self.addr);

        let app = create_router(self.state.clone());

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("Failed to bind media server to {}", self.addr))?;
        self.addr = listener.local_addr()?;
        info!("Media server listening on {}", self.addr);

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Media server error: {}", e);
            }
        });

        self.server_handle = Some(handle);

        Ok(())
    }

    /// Stop the server
    pub async fn stop(&mut self) {
        if let Some(handle) = self.server_handle.take() {
            info!("Stopping media server");
            handle.abort();
        }
    }

    /// Bound address, resolved after [`start`](Self::start)
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn is_running(&self) -> bool {
        self.server_handle.is_some()
    }
}

impl Drop for MediaServer {
    fn drop(&mut self) {
        if let Some(handle) = self.server_handle.take() {
            handle.abort();
        }
    }
}
