//! # pulse-proto
//!
//! Wire protocol for the pulsehub presence hub.
//!
//! A client opens a WebSocket, sends its raw user identifier as the first
//! text frame, then exchanges JSON records carrying a `type` discriminator:
//!
//! | type | direction | fields |
//! |---|---|---|
//! | `heartbeat` | client→server | (none) |
//! | `pulse_click` | client→server | `target` |
//! | `status_update` | server→client | `user`, `status` |
//! | `pulse_click` | server→client | `from` |
//! | `double_pulse` | server→client | `from` |
//!
//! ## Quick Start
//!
//! ```rust
//! use pulse_proto::{ClientMessage, ServerMessage, Status, UserId};
//!
//! let msg = ClientMessage::decode(r#"{"type":"pulse_click","target":"user2"}"#).unwrap();
//! assert_eq!(msg, ClientMessage::PulseClick { target: UserId::from("user2") });
//!
//! let out = ServerMessage::status("user1", Status::Online);
//! assert_eq!(
//!     out.to_json().unwrap(),
//!     r#"{"type":"status_update","user":"user1","status":"online"}"#
//! );
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod handshake;
pub mod message;
#[cfg(feature = "tokio")]
pub mod transport;
pub mod user_id;

pub use self::error::ProtocolError;
pub use self::handshake::parse_handshake;
pub use self::message::{ClientMessage, ServerMessage, Status};
#[cfg(feature = "tokio")]
pub use self::transport::{websocket_config, TransportReadError, WsTransport, MAX_FRAME_LEN};
pub use self::user_id::{UserId, MAX_USER_ID_LEN};
