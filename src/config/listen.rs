//! WebSocket listener configuration.

use serde::Deserialize;
use std::net::SocketAddr;

use super::defaults::default_listen_address;

/// WebSocket listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// Address to bind to (e.g., "0.0.0.0:8765").
    #[serde(default = "default_listen_address")]
    pub address: SocketAddr,
    /// Allowed Origin header values for the upgrade request.
    /// Empty allows every origin, including requests without one.
    #[serde(default)]
    pub allow_origins: Vec<String>,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            address: default_listen_address(),
            allow_origins: Vec::new(),
        }
    }
}

impl ListenConfig {
    /// Whether an upgrade request carrying `origin` may proceed.
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        if self.allow_origins.is_empty() {
            return true;
        }
        origin.is_some_and(|o| self.allow_origins.iter().any(|allowed| allowed == o))
    }
}
