//! State management module.
//!
//! Contains the [`Hub`] (shared hub state), its managers, and the session
//! handles connection tasks register with it.

mod dashmap_ext;
mod hub;
pub mod links;
pub mod managers;
pub mod presence;
mod session;

pub use dashmap_ext::DashMapExt;
pub use hub::{Hub, HubSettings, PulseResult, SweepReport};
pub use links::LinkGraph;
pub use managers::{ConnectionRegistry, HeartbeatManager, PulseDetector, PulseOutcome};
pub use session::{
    CloseReason, DeliveryOutcome, SessionHandle, SessionId, SessionIdGenerator,
};

#[cfg(test)]
pub(crate) use session::test_handle;
