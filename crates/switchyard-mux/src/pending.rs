//! Pending-request bookkeeping: result sinks, request records, and the
//! worker-owned table that correlates replies and deadlines.
//!
//! Ownership rules:
//! - the caller owns the [`ResultSink`] (shared with the worker via `Arc`);
//! - the worker exclusively owns the [`PendingRequest`] from the moment it
//!   crosses the control channel until resolution;
//! - exactly one of {reply received, deadline expired} resolves a request,
//!   enforced by [`PendingTable::claim`] being a remove.

use crate::correlation::CorrelationId;
use parking_lot::{Condvar, Mutex};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use switchyard_wire::Frame;

/// Callback handed to the completion executor once a request resolves.
pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

/// Observable state of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    /// No terminal event yet.
    Pending,
    /// Reply arrived; the payload is available.
    Completed,
    /// The deadline expired before any reply.
    DeadlineExceeded,
}

impl ResponseStatus {
    /// Whether this status will never change again.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

struct SinkState {
    status: ResponseStatus,
    reply: Vec<Frame>,
}

/// Caller-owned output slot for one request.
///
/// The worker writes it exactly once, strictly before handing the completion
/// callback to the executor. Callers must not read the payload until a
/// terminal status is observed, via [`ResultSink::wait_terminal`], polling
/// [`ResultSink::status`], or from inside the completion callback.
pub struct ResultSink {
    state: Mutex<SinkState>,
    signal: Condvar,
}

impl ResultSink {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SinkState {
                status: ResponseStatus::Pending,
                reply: Vec::new(),
            }),
            signal: Condvar::new(),
        }
    }

    /// Current status.
    pub fn status(&self) -> ResponseStatus {
        self.state.lock().status
    }

    /// Reply payload frames. Empty until the status is `Completed`.
    pub fn reply(&self) -> Vec<Frame> {
        self.state.lock().reply.clone()
    }

    /// Block until the status is terminal or `timeout` elapses, returning
    /// whatever the status is at that point.
    pub fn wait_terminal(&self, timeout: Duration) -> ResponseStatus {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !state.status.is_terminal() {
            if self.signal.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        state.status
    }

    /// Reply path resolution. Worker-only.
    pub(crate) fn complete(&self, reply: Vec<Frame>) {
        let mut state = self.state.lock();
        debug_assert_eq!(state.status, ResponseStatus::Pending);
        state.reply = reply;
        state.status = ResponseStatus::Completed;
        drop(state);
        self.signal.notify_all();
    }

    /// Timeout path resolution. Worker-only.
    pub(crate) fn expire(&self) {
        let mut state = self.state.lock();
        debug_assert_eq!(state.status, ResponseStatus::Pending);
        state.status = ResponseStatus::DeadlineExceeded;
        drop(state);
        self.signal.notify_all();
    }
}

impl Default for ResultSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Worker-owned record of one in-flight request.
///
/// Built on the caller thread (so `submitted_at` measures from submission,
/// not from worker pickup) and moved whole through the control channel.
pub struct PendingRequest {
    sink: Arc<ResultSink>,
    submitted_at: Instant,
    deadline: Option<Duration>,
    callback: Option<CompletionCallback>,
}

impl PendingRequest {
    pub fn new(
        sink: Arc<ResultSink>,
        deadline: Option<Duration>,
        callback: Option<CompletionCallback>,
    ) -> Self {
        Self {
            sink,
            submitted_at: Instant::now(),
            deadline,
            callback,
        }
    }

    /// Absolute deadline, if one was supplied.
    pub(crate) fn expires_at(&self) -> Option<Instant> {
        self.deadline.map(|d| self.submitted_at + d)
    }

    pub(crate) fn into_parts(self) -> (Arc<ResultSink>, Option<CompletionCallback>) {
        (self.sink, self.callback)
    }
}

impl fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRequest")
            .field("submitted_at", &self.submitted_at)
            .field("deadline", &self.deadline)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

/// The worker's correlation table plus deadline ordering.
///
/// Accessed by exactly one thread; resolution races are settled by `claim`
/// removing the entry, so the second path finds nothing.
pub(crate) struct PendingTable {
    entries: HashMap<CorrelationId, PendingRequest>,
    // Min-heap of scheduled expirations. Entries whose id has already been
    // claimed are stale and skipped lazily.
    deadlines: BinaryHeap<Reverse<(Instant, CorrelationId)>>,
}

impl PendingTable {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
            deadlines: BinaryHeap::new(),
        }
    }

    /// Insert a request under a fresh id, scheduling its deadline if any.
    pub(crate) fn insert(&mut self, id: CorrelationId, request: PendingRequest) {
        if let Some(at) = request.expires_at() {
            self.deadlines.push(Reverse((at, id)));
        }
        let previous = self.entries.insert(id, request);
        debug_assert!(previous.is_none(), "correlation id reused while pending");
    }

    /// Atomically look up and remove: the single resolution point both the
    /// reply path and the timeout path go through.
    pub(crate) fn claim(&mut self, id: CorrelationId) -> Option<PendingRequest> {
        self.entries.remove(&id)
    }

    /// Earliest scheduled expiration among still-pending requests.
    pub(crate) fn next_deadline(&mut self) -> Option<Instant> {
        while let Some(Reverse((at, id))) = self.deadlines.peek().copied() {
            if self.entries.contains_key(&id) {
                return Some(at);
            }
            self.deadlines.pop();
        }
        None
    }

    /// Pop every expiration scheduled at or before `now`.
    ///
    /// Returned ids may already be resolved; callers re-check with `claim`.
    pub(crate) fn due(&mut self, now: Instant) -> Vec<CorrelationId> {
        let mut expired = Vec::new();
        while let Some(Reverse((at, id))) = self.deadlines.peek().copied() {
            if at > now {
                break;
            }
            self.deadlines.pop();
            expired.push(id);
        }
        expired
    }

    /// Remove everything, for shutdown resolution.
    pub(crate) fn drain(&mut self) -> Vec<(CorrelationId, PendingRequest)> {
        self.deadlines.clear();
        self.entries.drain().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
