//! Per-connection limits configuration.

use serde::Deserialize;

use super::defaults::{default_max_frame_len, default_max_malformed_frames, default_send_queue};

/// Per-connection limits configuration.
///
/// These limits keep one slow or misbehaving client from consuming
/// resources that belong to everyone else.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Outbound queue capacity per connection (default: 64).
    /// Messages for a peer whose queue is full are dropped.
    #[serde(default = "default_send_queue")]
    pub send_queue: usize,
    /// Consecutive malformed frames before the connection is closed (default: 5).
    /// 0 disables closing.
    #[serde(default = "default_max_malformed_frames")]
    pub max_malformed_frames: u32,
    /// Largest accepted inbound text frame in bytes (default: 4096).
    #[serde(default = "default_max_frame_len")]
    pub max_frame_len: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            send_queue: default_send_queue(),
            max_malformed_frames: default_max_malformed_frames(),
            max_frame_len: default_max_frame_len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values_are_correct() {
        let config = LimitsConfig::default();
        assert_eq!(config.send_queue, 64);
        assert_eq!(config.max_malformed_frames, 5);
        assert_eq!(config.max_frame_len, 4096);
    }

    #[test]
    fn partial_table_keeps_other_defaults() {
        let config: LimitsConfig = toml::from_str("send_queue = 8").unwrap();
        assert_eq!(config.send_queue, 8);
        assert_eq!(config.max_malformed_frames, 5);
    }
}
