//! HTTP/WebSocket server surface
//!
//! Routes:
//! - GET / - liveness probe
//! - GET /status - engine state snapshot
//! - GET /start - start the engine
//! - GET /shutdown - stop the engine
//! - GET /ws - transcript channel (WebSocket, server→client)
//! - GET /status-ws - status channel (WebSocket, server→client)

mod handlers;
mod manager;
mod routes;
mod state;
mod subscribers;

pub use manager::SessionManager;
pub use routes::create_router;
pub use state::AppState;
pub use subscribers::{ChannelKind, SubscriberRegistry};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Server bind and runtime settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Period of the status sampler fan-out
    pub status_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8000,
            status_interval: Duration::from_secs(1),
        }
    }
}

/// Handle returned by `start()`. Keeps the accept loop and the status
/// sampler alive.
pub struct ServerHandle {
    addr: SocketAddr,
    server: JoinHandle<()>,
    sampler: JoinHandle<()>,
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Run until the accept loop exits.
    pub async fn wait(self) {
        let _ = self.server.await;
    }

    /// Stop accepting connections and stop the status sampler.
    pub fn shutdown(&self) {
        self.server.abort();
        self.sampler.abort();
    }
}

/// Bind the listener, spawn the status sampler, and start serving.
///
/// Port 0 binds an ephemeral port; read it back from the handle.
pub async fn start(config: ServerConfig, manager: Arc<SessionManager>) -> Result<ServerHandle> {
    let sampler = manager.spawn_status_sampler(config.status_interval);
    let router = create_router(AppState::new(manager));

    let listener = TcpListener::bind((config.bind.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.bind, config.port))?;
    let addr = listener
        .local_addr()
        .context("Failed to read local address")?;

    info!(%addr, "HTTP server listening");

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!("HTTP server exited with error: {}", e);
        }
    });

    Ok(ServerHandle {
        addr,
        server,
        sampler,
    })
}
