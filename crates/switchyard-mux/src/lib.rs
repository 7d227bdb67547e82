//! # Switchyard Mux - Connection Manager & Request Correlation
//!
//! The client-side core of an RPC runtime: one background worker thread owns
//! every outbound peer connection and arbitrates requests submitted by any
//! number of caller threads, with no locks over connection state.
//!
//! ## Architecture
//!
//! ```text
//! caller threads                        worker thread (owns everything)
//! ┌────────────┐  ControlOp over mpsc  ┌─────────────────────────────┐
//! │ Manager /  │ ────────────────────► │ ManagerWorker               │
//! │ Connection │                       │  ├─ connection list         │
//! │ handles    │ ◄──────────────────── │  ├─ pending-request table   │
//! └────────────┘   oneshot replies,    │  └─ correlation generator   │
//!                  result sinks        └──────────┬──────────────────┘
//!                                                 │ multipart frames
//!                                                 ▼
//!                                            peer sockets
//! ```
//!
//! Callers obtain a [`ManagerHandle`], open connections with
//! [`ManagerHandle::connect`] (synchronous) and submit requests with
//! [`ConnectionHandle::send_request`] (fire-and-forget). The worker matches
//! each asynchronous reply to its request through a per-request
//! [`CorrelationId`] and resolves the caller's [`ResultSink`] exactly once:
//! either with the reply payload or, if the request carried a deadline that
//! expires first, as deadline-exceeded. Completion callbacks run on a
//! pluggable [`CompletionExecutor`], never on the worker thread.
//!
//! ## Concurrency model
//!
//! Exactly one thread touches the connection list and the pending table, so
//! the reply path and the timeout path for a given request are serialized by
//! construction; whichever looks the correlation id up first claims the
//! entry, and the loser finds nothing and backs off. Callers block only in
//! `connect` and `shutdown`.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod config;
pub mod control;
pub mod correlation;
pub mod error;
pub mod executor;
pub mod manager;
pub mod pending;

mod worker;

// Re-export main types
pub use config::ManagerConfig;
pub use control::ConnectionId;
pub use correlation::{CorrelationId, CorrelationIdGenerator};
pub use error::MuxError;
pub use executor::{CompletionExecutor, RayonExecutor};
pub use manager::{ConnectionHandle, ManagerHandle};
pub use pending::{CompletionCallback, PendingRequest, ResponseStatus, ResultSink};

// The wire vocabulary leaks into the public API (payloads are frame vectors),
// so re-export it rather than making callers name both crates.
pub use switchyard_wire::{Endpoint, Frame};
