//! The internal control protocol between caller threads and the worker.
//!
//! Operations are typed values moved through a many-producer/one-consumer
//! channel; ownership of the [`PendingRequest`] transfers to the worker with
//! the message. Synchronous operations carry their own oneshot reply sender.
//! Delivery is FIFO per sender, with no ordering across senders.

use crate::error::MuxError;
use crate::pending::PendingRequest;
use std::fmt;
use switchyard_wire::{Endpoint, Frame};
use tokio::sync::oneshot;

/// Identifier of one outbound connection: its insertion index in the
/// worker's connection list, so N `connect` calls yield ids `0..N`.
///
/// Valid only on the manager that issued it. Connections are never removed
/// individually, so an id stays valid until manager shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u64)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }

    /// Raw id value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One operation submitted to the manager worker.
pub(crate) enum ControlOp {
    /// Open an outbound connection and reply with its id.
    Connect {
        endpoint: Endpoint,
        reply: oneshot::Sender<Result<ConnectionId, MuxError>>,
    },
    /// Forward a request on an existing connection. Fire-and-forget:
    /// completion is observed through the request's result sink only.
    Request {
        connection: ConnectionId,
        request: PendingRequest,
        payload: Vec<Frame>,
    },
    /// Terminate the worker loop after the current event.
    Quit,
}

impl fmt::Debug for ControlOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect { endpoint, .. } => {
                f.debug_struct("Connect").field("endpoint", endpoint).finish()
            }
            Self::Request {
                connection,
                request,
                payload,
            } => f
                .debug_struct("Request")
                .field("connection", connection)
                .field("request", request)
                .field("payload_frames", &payload.len())
                .finish(),
            Self::Quit => f.write_str("Quit"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_ids_are_indices() {
        let id = ConnectionId::from_index(3);
        assert_eq!(id.index(), 3);
        assert_eq!(id.as_u64(), 3);
        assert_eq!(id.to_string(), "3");
    }
}
