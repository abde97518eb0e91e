//! Domain managers for hub state.
//!
//! Each manager owns one table of the hub's shared state. The [`Hub`]
//! composes them and performs the transitions that span several tables.
//!
//! [`Hub`]: crate::state::Hub

pub mod heartbeat;
pub mod pulse;
pub mod registry;

pub use heartbeat::{Heartbeat, HeartbeatManager, spawn_sweep_task};
pub use pulse::{PulseDetector, PulseOutcome};
pub use registry::ConnectionRegistry;
