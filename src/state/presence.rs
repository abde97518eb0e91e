//! Presence fan-out.
//!
//! Status changes of a user are pushed to every peer in its link set that
//! currently has a registered session. Delivery is best-effort: a peer whose
//! queue is full or whose connection is going away simply misses the update
//! and is reconciled by its own disconnect or the next sweep.

use crate::metrics;
use crate::state::Hub;
use crate::state::session::DeliveryOutcome;
use pulse_proto::{ServerMessage, Status, UserId};
use std::sync::Arc;
use tracing::debug;

/// Send `status_update{subject, status}` to every linked, registered peer.
///
/// Returns the number of peers the update was queued for.
pub fn notify(hub: &Hub, subject: &UserId, status: Status) -> usize {
    let message = Arc::new(ServerMessage::status(subject.clone(), status));
    let mut delivered = 0;

    for peer in hub.links.peers(subject) {
        if hub.deliver(peer, Arc::clone(&message)) == DeliveryOutcome::Delivered {
            delivered += 1;
            metrics::record_presence(status.as_str());
        }
    }

    debug!(user = %subject, %status, delivered, "Presence fan-out");
    delivered
}

/// Current status of every linked peer of `id`, as seen by the registry.
pub fn snapshot(hub: &Hub, id: &UserId) -> Vec<ServerMessage> {
    hub.links
        .peers(id)
        .map(|peer| {
            let status = if hub.registry.is_online(peer) {
                Status::Online
            } else {
                Status::Offline
            };
            ServerMessage::status(peer.clone(), status)
        })
        .collect()
}
