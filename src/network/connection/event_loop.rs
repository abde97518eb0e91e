//! Event loop for an identified connection.
//!
//! One task both reads the socket and drains the session's outbound queue,
//! so frames from one client are applied in arrival order and a slow socket
//! only ever backs up its own queue. Every await, including a write stuck on
//! a peer that stopped reading, is raced against the session's close token.

use super::dispatch::handle_frame;
use super::error_handling::{ReadErrorAction, classify_read_error};
use crate::error::HandlerError;
use crate::metrics;
use crate::state::{CloseReason, Hub, SessionHandle};
use pulse_proto::{ServerMessage, UserId, WsTransport};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::warn;

/// Why the event loop stopped.
#[derive(Debug)]
pub(super) enum LoopExit {
    /// The client closed the socket.
    PeerClosed,
    /// The hub closed the session.
    Closed(CloseReason),
    /// A read or write failed, or the client kept sending garbage.
    Failed(HandlerError),
}

pub(super) async fn run_event_loop<S>(
    transport: &mut WsTransport<S>,
    hub: &Hub,
    id: &UserId,
    handle: &SessionHandle,
    outgoing: &mut mpsc::Receiver<Arc<ServerMessage>>,
) -> LoopExit
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let closed = handle.closed_token().clone();
    let limit = hub.settings.max_malformed_frames;
    let mut malformed: u32 = 0;

    loop {
        tokio::select! {
            biased;

            _ = closed.cancelled() => return closed_by_hub(handle),

            Some(message) = outgoing.recv() => {
                tokio::select! {
                    biased;
                    _ = closed.cancelled() => return closed_by_hub(handle),
                    written = transport.write_message(&message) => {
                        if let Err(e) = written {
                            return LoopExit::Failed(e.into());
                        }
                    }
                }
            }

            frame = transport.next() => {
                let error = match frame {
                    None => return LoopExit::PeerClosed,
                    Some(Ok(text)) => match handle_frame(hub, id, handle.session, &text) {
                        Ok(()) => {
                            malformed = 0;
                            continue;
                        }
                        Err(e) => e.to_string(),
                    },
                    Some(Err(e)) => match classify_read_error(&e) {
                        ReadErrorAction::Malformed => e.to_string(),
                        ReadErrorAction::Disconnect => return LoopExit::Failed(e.into()),
                    },
                };

                malformed += 1;
                metrics::record_malformed();
                warn!(error = %error, consecutive = malformed, "Dropping malformed frame");
                if limit > 0 && malformed >= limit {
                    return LoopExit::Failed(HandlerError::TooManyMalformed(malformed));
                }
            }
        }
    }
}

fn closed_by_hub(handle: &SessionHandle) -> LoopExit {
    LoopExit::Closed(handle.close_reason().unwrap_or(CloseReason::Shutdown))
}
