//! WebSocket transport implementation.

use std::borrow::Cow;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::error::CapacityError;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, WebSocketConfig};
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::WebSocketStream;

use crate::error::ProtocolError;
use crate::message::ServerMessage;

use super::error::TransportReadError;
use super::MAX_FRAME_LEN;

/// WebSocket settings that make tungstenite reject frames and messages
/// longer than `max_frame_len` before buffering them.
///
/// Pass to `accept_async_with_config` (or the `hdr` variant) together with
/// [`WsTransport::set_max_frame_len`].
pub fn websocket_config(max_frame_len: usize) -> WebSocketConfig {
    WebSocketConfig {
        max_message_size: Some(max_frame_len),
        max_frame_size: Some(max_frame_len),
        ..WebSocketConfig::default()
    }
}

/// Frame-oriented transport over a WebSocket stream.
///
/// Each text frame is one protocol unit: the handshake id or one JSON
/// message. Ping/pong and raw frames are consumed internally; binary frames
/// are skipped.
pub struct WsTransport<S> {
    stream: WebSocketStream<S>,
    max_frame_len: usize,
}

impl<S> WsTransport<S> {
    /// Wrap an upgraded WebSocket stream.
    pub fn new(stream: WebSocketStream<S>) -> Self {
        Self {
            stream,
            max_frame_len: MAX_FRAME_LEN,
        }
    }

    /// Set the maximum accepted text frame length.
    pub fn set_max_frame_len(&mut self, len: usize) {
        self.max_frame_len = len;
    }
}

impl<S> WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Read the next text frame.
    ///
    /// Returns `None` once the peer has closed the connection. Oversized
    /// frames yield [`ProtocolError::FrameTooLong`], whether tungstenite
    /// caught them while reading or the length check here did. Nothing more
    /// should be read after that, but a close frame can still be written.
    pub async fn next(&mut self) -> Option<Result<String, TransportReadError>> {
        loop {
            match self.stream.next().await {
                Some(Ok(WsMessage::Text(text))) => {
                    if text.len() > self.max_frame_len {
                        return Some(Err(TransportReadError::Protocol(
                            ProtocolError::FrameTooLong {
                                actual: text.len(),
                                limit: self.max_frame_len,
                            },
                        )));
                    }
                    return Some(Ok(text));
                }
                Some(Ok(WsMessage::Close(_))) | None => return None,
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => {
                    // Control frames are answered by tungstenite on the next flush
                    continue;
                }
                Some(Ok(WsMessage::Binary(data))) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(len = data.len(), "Ignoring binary frame");
                    #[cfg(not(feature = "tracing"))]
                    let _ = data;
                    continue;
                }
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => return None,
                Some(Err(WsError::Capacity(CapacityError::MessageTooLong { size, max_size }))) => {
                    return Some(Err(TransportReadError::Protocol(
                        ProtocolError::FrameTooLong {
                            actual: size,
                            limit: max_size,
                        },
                    )));
                }
                Some(Err(e)) => {
                    return Some(Err(TransportReadError::Io(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        format!("WebSocket error: {}", e),
                    ))));
                }
            }
        }
    }

    /// Write a raw text frame.
    pub async fn write_text(&mut self, text: &str) -> std::io::Result<()> {
        self.stream
            .send(WsMessage::Text(text.to_string()))
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }

    /// Encode and write a server message as a text frame.
    pub async fn write_message(&mut self, message: &ServerMessage) -> std::io::Result<()> {
        let text = message
            .to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        self.write_text(&text).await
    }

    /// Send a close frame with the given reason.
    ///
    /// Errors are ignored when the peer is already gone.
    pub async fn close(&mut self, code: CloseCode, reason: &str) -> std::io::Result<()> {
        let frame = CloseFrame {
            code,
            reason: Cow::Owned(reason.to_string()),
        };
        match self.stream.close(Some(frame)).await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(std::io::Error::new(std::io::ErrorKind::Other, e)),
        }
    }
}
