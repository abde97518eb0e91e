//! Network module.
//!
//! Contains the Gateway (WebSocket listener) and the per-client Connection
//! handler.

mod connection;
mod gateway;

pub use connection::Connection;
pub use gateway::Gateway;
