//! Test WebSocket client.
//!
//! Speaks the hub's wire protocol and lets tests assert on the frames it
//! receives.

use futures_util::{SinkExt, StreamExt};
use pulse_proto::{ClientMessage, ServerMessage, UserId};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// A test client connected to the hub.
pub struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    user: String,
}

impl TestClient {
    /// Connect and send `user` as the handshake frame.
    pub async fn connect(addr: &str, user: &str) -> anyhow::Result<Self> {
        let (ws, _) = connect_async(format!("ws://{addr}/")).await?;
        let mut client = Self {
            ws,
            user: user.to_string(),
        };
        client.send_raw(user).await?;
        Ok(client)
    }

    /// The identity this client announced.
    #[allow(dead_code)]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Send a raw text frame.
    pub async fn send_raw(&mut self, text: &str) -> anyhow::Result<()> {
        self.ws.send(WsMessage::Text(text.to_string())).await?;
        Ok(())
    }

    /// Send a protocol message.
    pub async fn send(&mut self, message: ClientMessage) -> anyhow::Result<()> {
        let json = message.to_json()?;
        self.send_raw(&json).await
    }

    /// Send a heartbeat.
    #[allow(dead_code)]
    pub async fn heartbeat(&mut self) -> anyhow::Result<()> {
        self.send(ClientMessage::Heartbeat).await
    }

    /// Pulse a peer.
    #[allow(dead_code)]
    pub async fn pulse(&mut self, target: &str) -> anyhow::Result<()> {
        self.send(ClientMessage::PulseClick {
            target: UserId::from(target),
        })
        .await
    }

    /// Receive the next hub message (5 second timeout).
    pub async fn recv(&mut self) -> anyhow::Result<ServerMessage> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    /// Receive the next hub message with a timeout, skipping control frames.
    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<ServerMessage> {
        loop {
            match timeout(dur, self.ws.next()).await? {
                Some(Ok(WsMessage::Text(text))) => return Ok(ServerMessage::decode(&text)?),
                Some(Ok(WsMessage::Close(frame))) => {
                    anyhow::bail!("connection closed: {frame:?}")
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => anyhow::bail!("connection ended"),
            }
        }
    }

    /// Assert that nothing arrives within `dur`.
    #[allow(dead_code)]
    pub async fn expect_silence(&mut self, dur: Duration) -> anyhow::Result<()> {
        match self.recv_timeout(dur).await {
            Ok(message) => anyhow::bail!("unexpected message: {message:?}"),
            Err(e) if e.is::<tokio::time::error::Elapsed>() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Wait for the hub to close the connection and return the close code.
    #[allow(dead_code)]
    pub async fn recv_close(&mut self) -> anyhow::Result<Option<CloseCode>> {
        loop {
            match timeout(Duration::from_secs(5), self.ws.next()).await? {
                Some(Ok(WsMessage::Close(frame))) => return Ok(frame.map(|f| f.code)),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            }
        }
    }

    /// Close the connection gracefully.
    pub async fn close(mut self) -> anyhow::Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }
}
