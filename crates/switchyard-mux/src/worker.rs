//! The manager worker: the one thread that owns every connection socket,
//! the pending-request table, and the correlation-id generator.
//!
//! The worker runs a single-threaded event loop inside a current-thread
//! tokio runtime on its own OS thread. Connect attempts and per-connection
//! reader tasks are spawned on the same `LocalSet`, so every table access
//! and every socket write happens on that one thread and handlers run to
//! completion without interleaving. The reply path and the timeout path for
//! one request are therefore serialized by construction: both go through
//! `PendingTable::claim`, and whichever runs second finds nothing.
//!
//! The loop itself never awaits socket i/o. A slow TCP connect parks its
//! local task, not the loop, so deadlines keep firing and replies keep
//! correlating while the connect is in flight.
//!
//! Peer wire shape (both directions): `[empty delimiter, 8-byte correlation
//! id, payload frames...]`. The transport is internal and trusted, so a
//! malformed message is a fatal contract violation, not a recoverable
//! protocol error.

use crate::control::{ConnectionId, ControlOp};
use crate::correlation::{CorrelationId, CorrelationIdGenerator};
use crate::error::MuxError;
use crate::executor::CompletionExecutor;
use crate::pending::{PendingRequest, PendingTable};
use std::sync::Arc;
use std::time::Instant;
use switchyard_wire::{
    self as wire, empty_frame, Endpoint, Frame, FrameSink, FrameStream, WireError,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// An event delivered to the loop from one of its local tasks.
enum WorkerEvent {
    /// A reply read off one connection socket.
    Reply {
        connection: ConnectionId,
        frames: Vec<Frame>,
    },
    /// A connect attempt finished, successfully or not.
    Connected {
        connection: ConnectionId,
        endpoint: Endpoint,
        reply: oneshot::Sender<Result<ConnectionId, MuxError>>,
        outcome: Result<(FrameSink, FrameStream), WireError>,
    },
}

/// How a claimed request resolved.
enum Resolution {
    Completed(Vec<Frame>),
    DeadlineExceeded,
}

pub(crate) struct ManagerWorker {
    control_rx: mpsc::UnboundedReceiver<ControlOp>,
    event_tx: mpsc::UnboundedSender<WorkerEvent>,
    event_rx: mpsc::UnboundedReceiver<WorkerEvent>,
    // Indexed by connection id; `None` while the connect is still in flight
    // or after it failed.
    connections: Vec<Option<FrameSink>>,
    table: PendingTable,
    generator: CorrelationIdGenerator,
    executor: Option<Arc<dyn CompletionExecutor>>,
}

impl ManagerWorker {
    pub(crate) fn new(
        control_rx: mpsc::UnboundedReceiver<ControlOp>,
        generator: CorrelationIdGenerator,
        executor: Option<Arc<dyn CompletionExecutor>>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            control_rx,
            event_tx,
            event_rx,
            connections: Vec::new(),
            table: PendingTable::new(),
            generator,
            executor,
        }
    }

    /// The event loop. Runs until `Quit` (or until every control sender is
    /// gone, which only happens if the manager handle was dropped without
    /// `shutdown`).
    pub(crate) async fn run(mut self) {
        debug!("manager worker started");
        loop {
            let next_deadline = self.table.next_deadline();
            let expiry = async move {
                match next_deadline {
                    Some(at) => tokio::time::sleep_until(at.into()).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                op = self.control_rx.recv() => match op {
                    Some(ControlOp::Connect { endpoint, reply }) => {
                        self.handle_connect(endpoint, reply);
                    }
                    Some(ControlOp::Request { connection, request, payload }) => {
                        self.handle_request(connection, request, payload).await;
                    }
                    Some(ControlOp::Quit) | None => break,
                },
                Some(event) = self.event_rx.recv() => match event {
                    WorkerEvent::Reply { connection, frames } => {
                        self.handle_reply(connection, frames);
                    }
                    WorkerEvent::Connected { connection, endpoint, reply, outcome } => {
                        self.register_connection(connection, endpoint, reply, outcome);
                    }
                },
                _ = expiry => {
                    self.handle_expirations();
                }
            }
        }
        self.resolve_remaining();
        debug!("manager worker stopped");
    }

    /// `CONNECT`: reserve the id, run the connect as a local task.
    ///
    /// The slot is reserved here so ids follow submission order even when
    /// connects finish out of order. No de-duplication: connecting twice to
    /// one endpoint yields two independent connections.
    fn handle_connect(
        &mut self,
        endpoint: Endpoint,
        reply: oneshot::Sender<Result<ConnectionId, MuxError>>,
    ) {
        let connection = ConnectionId::from_index(self.connections.len());
        self.connections.push(None);

        let event_tx = self.event_tx.clone();
        tokio::task::spawn_local(async move {
            let outcome = wire::connect(&endpoint).await;
            // A send error means the loop already stopped; the caller learns
            // of shutdown through the dropped reply sender.
            let _ = event_tx.send(WorkerEvent::Connected {
                connection,
                endpoint,
                reply,
                outcome,
            });
        });
    }

    /// A connect attempt finished: register the socket and answer the caller.
    fn register_connection(
        &mut self,
        connection: ConnectionId,
        endpoint: Endpoint,
        reply: oneshot::Sender<Result<ConnectionId, MuxError>>,
        outcome: Result<(FrameSink, FrameStream), WireError>,
    ) {
        let result = match outcome {
            Ok((sink, stream)) => {
                self.connections[connection.index()] = Some(sink);
                tokio::task::spawn_local(read_loop(connection, stream, self.event_tx.clone()));
                info!(connection = %connection, endpoint = %endpoint, "connection established");
                Ok(connection)
            }
            Err(source) => {
                warn!(endpoint = %endpoint, error = %source, "connect failed");
                Err(MuxError::ConnectFailed { endpoint, source })
            }
        };

        if reply.send(result).is_err() {
            warn!("connect caller went away before receiving the connection id");
        }
    }

    /// `REQUEST`: correlate, arm the deadline, forward to the peer.
    async fn handle_request(
        &mut self,
        connection: ConnectionId,
        request: PendingRequest,
        payload: Vec<Frame>,
    ) {
        // Caller contract: connection ids come from this manager's `connect`,
        // which hands them out only once the socket is registered. Fail fast
        // rather than silently misroute.
        let Some(sink) = self
            .connections
            .get_mut(connection.index())
            .and_then(Option::as_mut)
        else {
            panic!("request on unknown connection {connection}: ids are only valid on the manager that issued them");
        };

        let id = self.generator.next_id();
        self.table.insert(id, request);

        let mut message = Vec::with_capacity(2 + payload.len());
        message.push(empty_frame());
        message.push(id.to_frame());
        message.extend(payload);

        debug!(connection = %connection, correlation = %id, "forwarding request");
        if let Err(e) = sink.send(&message).await {
            // The peer will never answer a request it never got; the entry
            // stays pending so a supplied deadline remains the safety net.
            warn!(connection = %connection, correlation = %id, error = %e,
                  "request send failed");
        }
    }

    /// A reply arrived on a connection socket.
    fn handle_reply(&mut self, connection: ConnectionId, frames: Vec<Frame>) {
        // Shape check: internal transport, so violations are fatal.
        assert!(
            frames.len() >= 2 && frames[0].is_empty(),
            "malformed reply on connection {connection}: expected [delimiter, correlation id, payload...]"
        );
        let id = match CorrelationId::from_frame(&frames[1]) {
            Ok(id) => id,
            Err(e) => panic!("malformed correlation id frame on connection {connection}: {e}"),
        };

        let Some(request) = self.table.claim(id) else {
            // Designed race outcome: the deadline fired first and already
            // resolved this request.
            debug!(connection = %connection, correlation = %id,
                   "discarding reply for unknown correlation id");
            return;
        };

        let payload = frames[2..].to_vec();
        self.resolve(id, request, Resolution::Completed(payload));
    }

    /// Scheduled deadlines at or before now.
    fn handle_expirations(&mut self) {
        let now = Instant::now();
        for id in self.table.due(now) {
            // Already resolved by a reply: no-op, the other designed race
            // outcome.
            if let Some(request) = self.table.claim(id) {
                debug!(correlation = %id, "request deadline expired");
                self.resolve(id, request, Resolution::DeadlineExceeded);
            }
        }
    }

    /// Write the sink, then hand the callback off. Runs at most once per
    /// request; `claim` guarantees it.
    fn resolve(&self, id: CorrelationId, request: PendingRequest, resolution: Resolution) {
        let (sink, callback) = request.into_parts();
        match resolution {
            Resolution::Completed(payload) => sink.complete(payload),
            Resolution::DeadlineExceeded => sink.expire(),
        }

        if let Some(callback) = callback {
            match &self.executor {
                Some(executor) => executor.execute(callback),
                None => {
                    warn!(correlation = %id,
                          "no completion executor configured, dropping callback");
                }
            }
        }
    }

    /// Shutdown policy: force-resolve everything still pending as
    /// deadline-exceeded instead of leaving sinks pending forever.
    fn resolve_remaining(&mut self) {
        if self.table.is_empty() {
            return;
        }
        info!(
            count = self.table.len(),
            "resolving requests still pending at shutdown as deadline-exceeded"
        );
        for (id, request) in self.table.drain() {
            self.resolve(id, request, Resolution::DeadlineExceeded);
        }
    }
}

/// Per-connection reader task. Lives on the worker's `LocalSet`, so reads
/// happen on the worker thread too; it only forwards whole messages into the
/// worker's event channel.
async fn read_loop(
    connection: ConnectionId,
    mut stream: FrameStream,
    event_tx: mpsc::UnboundedSender<WorkerEvent>,
) {
    loop {
        match stream.recv().await {
            Ok(Some(frames)) => {
                let event = WorkerEvent::Reply { connection, frames };
                if event_tx.send(event).is_err() {
                    // Worker gone; nothing left to correlate into.
                    break;
                }
            }
            Ok(None) => {
                debug!(connection = %connection, "peer closed connection");
                break;
            }
            Err(e) => {
                warn!(connection = %connection, error = %e, "connection read failed");
                break;
            }
        }
    }
}
