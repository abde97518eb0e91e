//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

use std::net::{Ipv4Addr, SocketAddr};

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

// =============================================================================
// Server Defaults
// =============================================================================

pub fn default_server_name() -> String {
    "pulsehub".to_string()
}

pub fn default_handshake_timeout_ms() -> u64 {
    10_000
}

// =============================================================================
// Listen Defaults
// =============================================================================

pub const DEFAULT_PORT: u16 = 8765;

pub fn default_listen_address() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT))
}

// =============================================================================
// Heartbeat Defaults
// =============================================================================

pub fn default_heartbeat_timeout_ms() -> u64 {
    60_000
}

pub fn default_sweep_interval_ms() -> u64 {
    5_000
}

// =============================================================================
// Pulse Defaults
// =============================================================================

pub fn default_pulse_window_ms() -> u64 {
    300
}

pub fn default_click_retention_ms() -> u64 {
    60_000
}

// =============================================================================
// Limits Defaults
// =============================================================================

pub fn default_send_queue() -> usize {
    64
}

pub fn default_max_malformed_frames() -> u32 {
    5
}

pub fn default_max_frame_len() -> usize {
    pulse_proto::MAX_FRAME_LEN
}
