//! Gateway - WebSocket listener that accepts incoming connections.
//!
//! The Gateway binds the listen socket, performs the WebSocket upgrade
//! (with an optional Origin allow-list and the configured frame size limit)
//! and spawns a Connection task for each client. A failing connection never
//! affects the others.

use crate::config::ListenConfig;
use crate::metrics;
use crate::network::Connection;
use crate::state::Hub;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use pulse_proto::websocket_config;
use tokio_tungstenite::accept_hdr_async_with_config;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

/// How long shutdown waits for connection tasks to send their close frames.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// The Gateway accepts incoming WebSocket connections and spawns handlers.
pub struct Gateway {
    listener: TcpListener,
    config: Arc<ListenConfig>,
    hub: Arc<Hub>,
    tasks: TaskTracker,
}

impl Gateway {
    /// Bind the gateway to the configured address.
    pub async fn bind(config: ListenConfig, hub: Arc<Hub>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(config.address).await?;
        info!(address = %listener.local_addr()?, "WebSocket listener bound");
        Ok(Self {
            listener,
            config: Arc::new(config),
            hub,
            tasks: TaskTracker::new(),
        })
    }

    /// The address actually bound (useful with port 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` is cancelled, then close every
    /// session and wait for the connection tasks to finish.
    #[instrument(skip_all, name = "gateway")]
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => self.spawn_connection(stream, addr),
                    Err(e) => error!(error = %e, "Failed to accept connection"),
                },
            }
        }

        let closing = self.hub.shutdown();
        info!(sessions = closing, "Gateway shutting down");
        self.tasks.close();
        if tokio::time::timeout(DRAIN_TIMEOUT, self.tasks.wait())
            .await
            .is_err()
        {
            warn!(remaining = self.tasks.len(), "Connections still open after drain timeout");
        }
        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        debug!(%addr, "TCP connection accepted");
        let hub = Arc::clone(&self.hub);
        let config = Arc::clone(&self.config);

        self.tasks.spawn(async move {
            let upgrade_timeout = hub.settings.handshake_timeout;
            let ws_config = websocket_config(hub.settings.max_frame_len);
            let cors_callback = |req: &Request, response: Response| {
                let origin = req
                    .headers()
                    .get(http::header::ORIGIN)
                    .and_then(|o| o.to_str().ok());
                if config.origin_allowed(origin) {
                    return Ok(response);
                }
                warn!(%addr, origin = ?origin, "WebSocket origin rejected");
                Err(forbidden("origin not allowed"))
            };

            let upgrade = accept_hdr_async_with_config(stream, cors_callback, Some(ws_config));
            let ws_stream = match tokio::time::timeout(upgrade_timeout, upgrade).await {
                Ok(Ok(ws_stream)) => ws_stream,
                Ok(Err(e)) => {
                    warn!(%addr, error = %e, "WebSocket handshake failed");
                    return;
                }
                Err(_) => {
                    warn!(%addr, "WebSocket handshake timed out");
                    return;
                }
            };

            debug!(%addr, "WebSocket handshake successful");
            if let Err(e) = Connection::new(ws_stream, addr, hub).run().await {
                metrics::record_handler_error(e.error_code());
                debug!(%addr, error = %e, "Connection ended with error");
            }
        });
    }
}

/// Build a 403 response for a rejected upgrade.
fn forbidden(reason: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.to_string()));
    *response.status_mut() = http::StatusCode::FORBIDDEN;
    response
}
