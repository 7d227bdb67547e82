//! Manager error types.
//!
//! Only synchronous operations (`new`, `connect`, `shutdown`) return errors
//! to the caller. Request completion is never an `Err`: it is reported
//! through the [`crate::ResultSink`] terminal status, because `send_request`
//! is fire-and-forget.

use switchyard_wire::{Endpoint, WireError};
use thiserror::Error;

/// Errors surfaced by the connection manager's synchronous operations.
#[derive(Debug, Error)]
pub enum MuxError {
    /// Transport-level failure.
    #[error("transport error: {0}")]
    Wire(#[from] WireError),

    /// Worker thread or runtime could not be started.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Opening an outbound connection failed.
    #[error("failed to connect to {endpoint}: {source}")]
    ConnectFailed {
        endpoint: Endpoint,
        source: WireError,
    },

    /// The manager worker is no longer accepting operations.
    #[error("manager has shut down")]
    ManagerShutDown,

    /// The worker thread panicked; state is unrecoverable.
    #[error("manager worker thread panicked")]
    WorkerPanicked,

    /// The stock completion executor could not build its thread pool.
    #[error("failed to build completion executor: {0}")]
    ExecutorBuild(#[from] rayon::ThreadPoolBuildError),
}
