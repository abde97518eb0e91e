//! Transport layer for async I/O.
//!
//! The hub speaks over WebSocket only. [`WsTransport`] wraps a
//! `tokio-tungstenite` stream and yields validated text frames, skipping
//! control and binary frames; writing encodes [`ServerMessage`]s as text
//! frames.
//!
//! ```ignore
//! use pulse_proto::{parse_handshake, ClientMessage, WsTransport};
//!
//! let mut transport = WsTransport::new(ws_stream);
//! let id = match transport.next().await {
//!     Some(Ok(frame)) => parse_handshake(&frame)?,
//!     _ => return Ok(()),
//! };
//! while let Some(frame) = transport.next().await {
//!     let msg = ClientMessage::decode(&frame?)?;
//!     // dispatch
//! }
//! ```
//!
//! [`ServerMessage`]: crate::ServerMessage

mod error;
mod websocket;

pub use error::TransportReadError;
pub use websocket::{websocket_config, WsTransport};

/// Default maximum size of an inbound text frame in bytes.
///
/// Every valid client message is far below this; a larger frame ends the
/// connection.
pub const MAX_FRAME_LEN: usize = 4096;
