//! Message dispatch for the event loop.
//!
//! Decodes one inbound text frame and routes it to the heartbeat table or
//! the pulse detector.

use crate::state::{Hub, PulseResult, SessionId};
use crate::telemetry::FrameTimer;
use pulse_proto::{ClientMessage, ProtocolError, UserId};
use tokio::time::Instant;
use tracing::debug;

/// Decode and apply one frame from `id`'s `session`.
///
/// A decode failure leaves hub state untouched.
pub(super) fn handle_frame(
    hub: &Hub,
    id: &UserId,
    session: SessionId,
    text: &str,
) -> Result<(), ProtocolError> {
    let message = ClientMessage::decode(text)?;
    let _timer = FrameTimer::new(message.kind());
    let now = Instant::now();

    match message {
        ClientMessage::Heartbeat => {
            if !hub.heartbeat(id, session, now) {
                debug!("Heartbeat from a session that no longer owns its user id");
            }
        }
        ClientMessage::PulseClick { target } => {
            let result = hub.pulse(id, session, &target, now);
            match result {
                PulseResult::Unlinked => debug!(target = %target, "Pulse target is not linked"),
                PulseResult::Stale => {
                    debug!("Pulse from a session that no longer owns its user id")
                }
                PulseResult::Single | PulseResult::Double => {
                    debug!(target = %target, kind = result.as_str(), "Pulse")
                }
            }
        }
    }
    Ok(())
}
