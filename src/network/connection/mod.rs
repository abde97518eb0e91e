//! Connection - Handles an individual client connection.
//!
//! Each Connection runs in its own Tokio task through three phases:
//!
//! ```text
//! Phase 1: Handshake (first text frame = user id, bounded by a timeout)
//!    ↓
//! Phase 2: Registration (hub.connect, snapshot of linked peers, online fan-out)
//!    ↓
//! Phase 3: Event loop (tokio::select!)
//!    ┌──────────────────────────────────────────────┐
//!    │  close token ──▶ exit (replaced / timeout)   │
//!    │  outbound queue ──▶ socket                   │
//!    │  socket ──▶ dispatch ──▶ heartbeat / pulse   │
//!    └──────────────────────────────────────────────┘
//!    ↓
//! Teardown: hub.disconnect (offline fan-out at most once), close frame
//! ```

mod dispatch;
mod error_handling;
mod event_loop;
mod handshake;

use error_handling::{close_frame_for_error, close_frame_for_reason};
use event_loop::{LoopExit, run_event_loop};

use crate::error::{HandlerError, HandlerResult};
use crate::state::{Hub, SessionHandle, presence};
use crate::telemetry::spans;
use pulse_proto::{ServerMessage, UserId, WsTransport};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{Instrument, debug, info};

/// Upper bound on sending the close frame to a peer that may not be reading.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// A client connection handler.
pub struct Connection<S> {
    transport: WsTransport<S>,
    addr: SocketAddr,
    hub: Arc<Hub>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an upgraded WebSocket stream.
    pub fn new(stream: WebSocketStream<S>, addr: SocketAddr, hub: Arc<Hub>) -> Self {
        let mut transport = WsTransport::new(stream);
        transport.set_max_frame_len(hub.settings.max_frame_len);
        Self {
            transport,
            addr,
            hub,
        }
    }

    /// Serve the connection until it closes.
    pub async fn run(mut self) -> HandlerResult {
        let (handle, outgoing) = self.hub.open_session();
        let session = handle.session;

        let identity = handshake::read_identity(
            &mut self.transport,
            self.hub.settings.handshake_timeout,
        )
        .instrument(spans::handshake(session, &self.addr))
        .await;

        let id = match identity {
            Ok(id) => id,
            Err(e) => {
                debug!(session, addr = %self.addr, error = %e, "Handshake failed");
                self.close_after_error(&e).await;
                return Err(e);
            }
        };

        let span = spans::connection(&id, session, &self.addr);
        self.serve(id, handle, outgoing).instrument(span).await
    }

    async fn serve(
        &mut self,
        id: UserId,
        handle: SessionHandle,
        mut outgoing: mpsc::Receiver<Arc<ServerMessage>>,
    ) -> HandlerResult {
        self.hub.connect(id.clone(), handle.clone(), Instant::now());
        info!("Client identified");

        let exit = match self.send_snapshot(&id).await {
            Ok(()) => {
                self.hub.announce(&id);
                run_event_loop(&mut self.transport, &self.hub, &id, &handle, &mut outgoing).await
            }
            Err(e) => LoopExit::Failed(e),
        };

        let went_offline = self.hub.disconnect(&id, handle.session);
        let connected_ms = handle.connected_at.elapsed().as_millis() as u64;
        debug!(went_offline, connected_ms, "Session unregistered");

        match exit {
            LoopExit::PeerClosed => {
                info!("Client closed connection");
                Ok(())
            }
            LoopExit::Closed(reason) => {
                info!(%reason, "Session closed by hub");
                let (code, text) = close_frame_for_reason(reason);
                self.send_close(code, text).await;
                Ok(())
            }
            LoopExit::Failed(e) => {
                info!(error = %e, "Connection failed");
                self.close_after_error(&e).await;
                Err(e)
            }
        }
    }

    /// Tell the new client the current status of each linked peer.
    async fn send_snapshot(&mut self, id: &UserId) -> Result<(), HandlerError> {
        for message in presence::snapshot(&self.hub, id) {
            self.transport.write_message(&message).await?;
        }
        Ok(())
    }

    async fn close_after_error(&mut self, error: &HandlerError) {
        if let Some((code, text)) = close_frame_for_error(error) {
            self.send_close(code, text).await;
        }
    }

    async fn send_close(&mut self, code: CloseCode, text: &str) {
        match tokio::time::timeout(CLOSE_TIMEOUT, self.transport.close(code, text)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "Failed to send close frame"),
            Err(_) => debug!("Peer not reading, dropping socket without close frame"),
        }
    }
}
