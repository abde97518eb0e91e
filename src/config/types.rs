//! Core configuration types and loading.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

use super::defaults::{
    default_click_retention_ms, default_handshake_timeout_ms, default_heartbeat_timeout_ms,
    default_pulse_window_ms, default_server_name, default_sweep_interval_ms, default_true,
};
use super::limits::LimitsConfig;
use super::listen::ListenConfig;

/// Environment variable holding a full listen address.
pub const ENV_LISTEN: &str = "PULSEHUB_LISTEN";
/// Environment variable holding only the listen port.
pub const ENV_PORT: &str = "PORT";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid {var} value {value:?}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Hub configuration.
///
/// Every section is optional; an empty file yields the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server identity and auxiliary endpoints.
    #[serde(default)]
    pub server: ServerConfig,
    /// WebSocket listener.
    #[serde(default)]
    pub listen: ListenConfig,
    /// Liveness detection.
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    /// Double pulse detection.
    #[serde(default)]
    pub pulse: PulseConfig,
    /// Per-connection limits.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Link graph: user id to the peers it notifies and may pulse.
    #[serde(default)]
    pub links: BTreeMap<String, Vec<String>>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply `PULSEHUB_LISTEN` and `PORT` from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|var| std::env::var(var).ok())
    }

    /// Apply overrides read through `lookup`.
    ///
    /// `PORT` replaces only the port of the configured address.
    /// `PULSEHUB_LISTEN` replaces the whole address and wins over `PORT`.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_PORT) {
            let port: u16 = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_PORT,
                value: value.clone(),
            })?;
            self.listen.address.set_port(port);
        }

        if let Some(value) = lookup(ENV_LISTEN) {
            let address: SocketAddr =
                value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                    var: ENV_LISTEN,
                    value: value.clone(),
                })?;
            self.listen.address = address;
        }

        Ok(())
    }
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Name used in logs (default: "pulsehub").
    #[serde(default = "default_server_name")]
    pub name: String,
    /// Prometheus metrics HTTP port. Absent or 0 disables the endpoint.
    pub metrics_port: Option<u16>,
    /// Milliseconds a new connection has to send its user id (default: 10000).
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            metrics_port: None,
            handshake_timeout_ms: default_handshake_timeout_ms(),
        }
    }
}

/// Heartbeat configuration.
///
/// A session silent for longer than `timeout_ms` is evicted by the next
/// sweep, so the worst-case detection delay is `timeout_ms + sweep_interval_ms`.
#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatConfig {
    /// Milliseconds without a heartbeat before a session is stale (default: 60000).
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub timeout_ms: u64,
    /// Milliseconds between sweeps (default: 5000).
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_heartbeat_timeout_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

/// Pulse configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PulseConfig {
    /// Reciprocity window in milliseconds, inclusive (default: 300).
    #[serde(default = "default_pulse_window_ms")]
    pub window_ms: u64,
    /// Clear both directions of a pair once it produced a double pulse
    /// (default: true).
    #[serde(default = "default_true")]
    pub consume_on_match: bool,
    /// Milliseconds a pair is kept after its newest click (default: 60000).
    #[serde(default = "default_click_retention_ms")]
    pub click_retention_ms: u64,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            window_ms: default_pulse_window_ms(),
            consume_on_match: true,
            click_retention_ms: default_click_retention_ms(),
        }
    }
}
