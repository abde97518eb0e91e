//! Identity handshake.
//!
//! The first text frame on a new connection is the raw user id. No
//! credentials are checked; the id only has to be well formed.

use crate::error::{HandlerError, HandlerResult};
use pulse_proto::{UserId, WsTransport, parse_handshake};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

/// Wait up to `timeout` for the identity frame.
pub(super) async fn read_identity<S>(
    transport: &mut WsTransport<S>,
    timeout: Duration,
) -> HandlerResult<UserId>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match tokio::time::timeout(timeout, transport.next()).await {
        Err(_) => Err(HandlerError::HandshakeTimeout),
        Ok(None) => Err(HandlerError::ClosedBeforeHandshake),
        Ok(Some(Err(e))) => Err(e.into()),
        Ok(Some(Ok(frame))) => parse_handshake(&frame).map_err(HandlerError::InvalidHandshake),
    }
}
