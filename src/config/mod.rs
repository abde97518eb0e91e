//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config, ServerConfig, HeartbeatConfig, PulseConfig)
//! - [`listen`]: WebSocket listener configuration (ListenConfig)
//! - [`limits`]: Per-connection limits (LimitsConfig)
//! - [`validation`]: Startup validation (ValidationError)

mod defaults;
mod limits;
mod listen;
mod types;
pub mod validation;

pub use limits::LimitsConfig;
pub use listen::ListenConfig;
pub use types::{Config, ConfigError, HeartbeatConfig, PulseConfig, ServerConfig};
pub use validation::{ValidationError, validate};
