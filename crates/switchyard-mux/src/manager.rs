//! Public handles: the thread-safe entry point callers hold, and the
//! lightweight per-connection value it hands out.
//!
//! Both are thin: every operation is forwarded over the control channel to
//! the worker. Callers block only in [`ManagerHandle::connect`] (waiting for
//! the assigned connection id) and [`ManagerHandle::shutdown`] (joining the
//! worker thread); [`ConnectionHandle::send_request`] never blocks on
//! completion.

use crate::config::ManagerConfig;
use crate::control::{ConnectionId, ControlOp};
use crate::correlation::CorrelationIdGenerator;
use crate::error::MuxError;
use crate::pending::{CompletionCallback, PendingRequest, ResultSink};
use crate::worker::ManagerWorker;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use switchyard_wire::{Endpoint, Frame};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Thread-safe entry point to one connection manager instance.
///
/// Construction spawns the dedicated worker thread; [`ManagerHandle::shutdown`]
/// stops it and joins. The handle itself is cheap to share by reference
/// across threads; connection handles it returns are `Clone` and internally
/// forward to the same worker.
///
/// The synchronous methods park the calling thread and must not be called
/// from async context; bridge with `spawn_blocking` there.
pub struct ManagerHandle {
    control_tx: mpsc::UnboundedSender<ControlOp>,
    worker: thread::JoinHandle<()>,
}

impl ManagerHandle {
    /// Start a manager with its dedicated worker thread.
    pub fn new(config: ManagerConfig) -> Result<Self, MuxError> {
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        let generator = match config.id_seed {
            Some(seed) => CorrelationIdGenerator::new(seed),
            None => CorrelationIdGenerator::from_entropy(),
        };
        let worker = ManagerWorker::new(control_rx, generator, config.executor);

        // The runtime is built here so construction errors surface to the
        // caller instead of dying inside the spawned thread.
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let thread = thread::Builder::new()
            .name(config.worker_thread_name.clone())
            .spawn(move || {
                let local = tokio::task::LocalSet::new();
                local.block_on(&runtime, worker.run());
            })?;

        debug!(thread = %config.worker_thread_name, "manager started");
        Ok(Self {
            control_tx,
            worker: thread,
        })
    }

    /// Open an outbound connection, blocking until the worker assigns its id.
    ///
    /// Connection ids are assigned in call order starting at 0. Connecting
    /// twice to the same endpoint yields two independent connections.
    pub fn connect(&self, endpoint: impl Into<Endpoint>) -> Result<ConnectionHandle, MuxError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.control_tx
            .send(ControlOp::Connect {
                endpoint: endpoint.into(),
                reply: reply_tx,
            })
            .map_err(|_| MuxError::ManagerShutDown)?;

        let id = reply_rx
            .blocking_recv()
            .map_err(|_| MuxError::ManagerShutDown)??;

        Ok(ConnectionHandle {
            id,
            control_tx: self.control_tx.clone(),
        })
    }

    /// Stop the worker and join its thread.
    ///
    /// Requests still pending are force-resolved as deadline-exceeded.
    /// Operations on surviving connection handles fail with
    /// [`MuxError::ManagerShutDown`] afterwards.
    pub fn shutdown(self) -> Result<(), MuxError> {
        // A send error means the worker already stopped; still join it.
        let _ = self.control_tx.send(ControlOp::Quit);
        self.worker.join().map_err(|_| MuxError::WorkerPanicked)
    }
}

/// One outbound connection: a manager reference plus the connection id.
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    control_tx: mpsc::UnboundedSender<ControlOp>,
}

impl ConnectionHandle {
    /// The worker-assigned connection id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Submit a request. Returns as soon as the operation is queued;
    /// completion is observed only through `sink` (and `callback`, when a
    /// completion executor is configured).
    ///
    /// With `deadline = Some(d)`, the sink resolves as deadline-exceeded if
    /// no reply arrives within `d` of this call. With `None` the request can
    /// stay pending until a reply arrives or the manager shuts down.
    pub fn send_request(
        &self,
        payload: Vec<Frame>,
        deadline: Option<Duration>,
        sink: Arc<ResultSink>,
        callback: Option<CompletionCallback>,
    ) -> Result<(), MuxError> {
        let request = PendingRequest::new(sink, deadline, callback);
        self.control_tx
            .send(ControlOp::Request {
                connection: self.id,
                request,
                payload,
            })
            .map_err(|_| MuxError::ManagerShutDown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_to_dead_endpoint_fails() {
        let manager = ManagerHandle::new(ManagerConfig::default()).unwrap();

        let err = manager.connect("127.0.0.1:1").unwrap_err();
        assert!(matches!(err, MuxError::ConnectFailed { .. }));

        manager.shutdown().unwrap();
    }

    #[test]
    fn test_operations_after_shutdown_fail() {
        let manager = ManagerHandle::new(ManagerConfig::default()).unwrap();
        let control_tx = manager.control_tx.clone();
        manager.shutdown().unwrap();

        let handle = ConnectionHandle {
            id: ConnectionId::from_index(0),
            control_tx,
        };
        let err = handle
            .send_request(vec![Frame::from_static(b"x")], None, Arc::new(ResultSink::new()), None)
            .unwrap_err();
        assert!(matches!(err, MuxError::ManagerShutDown));
    }

    #[test]
    fn test_shutdown_joins_cleanly_without_connections() {
        let manager = ManagerHandle::new(ManagerConfig::default()).unwrap();
        manager.shutdown().unwrap();
    }
}
