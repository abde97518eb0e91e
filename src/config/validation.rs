//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use pulse_proto::UserId;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.name is required")]
    MissingServerName,
    #[error("server.handshake_timeout_ms must be greater than 0")]
    ZeroHandshakeTimeout,
    #[error("heartbeat.timeout_ms must be greater than 0")]
    ZeroHeartbeatTimeout,
    #[error("heartbeat.sweep_interval_ms must be greater than 0")]
    ZeroSweepInterval,
    #[error("pulse.click_retention_ms ({retention}) must be at least pulse.window_ms ({window})")]
    RetentionShorterThanWindow { window: u64, retention: u64 },
    #[error("limits.send_queue must be greater than 0")]
    ZeroSendQueue,
    #[error("limits.max_frame_len must be greater than 0")]
    ZeroFrameLen,
    #[error("links: invalid user id {id:?}: {reason}")]
    InvalidLinkId { id: String, reason: String },
    #[error("links: {0:?} is linked to itself")]
    SelfLink(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.name.is_empty() {
        errors.push(ValidationError::MissingServerName);
    }
    if config.server.handshake_timeout_ms == 0 {
        errors.push(ValidationError::ZeroHandshakeTimeout);
    }

    // Timing
    if config.heartbeat.timeout_ms == 0 {
        errors.push(ValidationError::ZeroHeartbeatTimeout);
    }
    if config.heartbeat.sweep_interval_ms == 0 {
        errors.push(ValidationError::ZeroSweepInterval);
    }
    if config.pulse.click_retention_ms < config.pulse.window_ms {
        errors.push(ValidationError::RetentionShorterThanWindow {
            window: config.pulse.window_ms,
            retention: config.pulse.click_retention_ms,
        });
    }

    // Limits
    if config.limits.send_queue == 0 {
        errors.push(ValidationError::ZeroSendQueue);
    }
    if config.limits.max_frame_len == 0 {
        errors.push(ValidationError::ZeroFrameLen);
    }

    // Link graph ids must be valid handshake ids, or nobody could ever use them.
    for (user, peers) in &config.links {
        check_link_id(user, &mut errors);
        for peer in peers {
            check_link_id(peer, &mut errors);
            if peer == user {
                errors.push(ValidationError::SelfLink(user.clone()));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_link_id(id: &str, errors: &mut Vec<ValidationError>) {
    let reason = match UserId::parse(id) {
        Err(e) => e.to_string(),
        // Handshakes are trimmed, so a padded id could never match.
        Ok(_) if id.trim() != id => "surrounding whitespace".to_string(),
        Ok(_) => return,
    };
    errors.push(ValidationError::InvalidLinkId {
        id: id.to_string(),
        reason,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_valid_config() -> String {
        r#"
[listen]
address = "127.0.0.1:8765"

[links]
user1 = ["user2"]
user2 = ["user1"]
"#
        .to_string()
    }

    #[test]
    fn test_valid_config_passes() {
        let config: Config = toml::from_str(&minimal_valid_config()).unwrap();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_defaults_pass() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_timings_fail() {
        let toml = r#"
[heartbeat]
timeout_ms = 0
sweep_interval_ms = 0
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::ZeroHeartbeatTimeout)));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::ZeroSweepInterval)));
    }

    #[test]
    fn test_retention_shorter_than_window_fails() {
        let toml = r#"
[pulse]
window_ms = 500
click_retention_ms = 100
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::RetentionShorterThanWindow { window: 500, retention: 100 }
        )));
    }

    #[test]
    fn test_zero_send_queue_fails() {
        let config: Config = toml::from_str("[limits]\nsend_queue = 0").unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::ZeroSendQueue)));
    }

    #[test]
    fn test_bad_link_ids_fail() {
        let toml = r#"
[links]
user1 = ["", " padded", "user1"]
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        let invalid = errors
            .iter()
            .filter(|e| matches!(e, ValidationError::InvalidLinkId { .. }))
            .count();
        assert_eq!(invalid, 2);
        assert!(errors.iter().any(|e| matches!(e, ValidationError::SelfLink(_))));
    }
}
