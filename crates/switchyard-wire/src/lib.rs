//! # Switchyard Wire - Multipart Frame Transport
//!
//! Low-level message framing for the Switchyard RPC core: connect/bind of
//! TCP peers and send/receive of *multipart messages*, where a message is an
//! ordered sequence of opaque byte frames and every frame but the last
//! carries a more-frames flag.
//!
//! ## Wire format
//!
//! ```text
//! frame   := flags (1 byte) | length (u32, big-endian) | payload
//! message := frame* last-frame          (MORE bit set on all but the last)
//! ```
//!
//! Frame payloads are never interpreted here; correlation ids, delimiters and
//! request bodies are all just frames. The layer above
//! (`switchyard-mux`) assigns meaning to frame positions.
//!
//! ## Guarantees
//!
//! - Frame boundaries survive the round trip exactly, including empty frames.
//! - A message is serialized into one buffer and written in a single call, so
//!   messages from one sender never interleave on the socket.
//! - Endianness is fixed big-endian for all length and integer frames.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod connection;
pub mod endpoint;
pub mod error;
pub mod frame;

// Re-export main types
pub use connection::{connect, FrameListener, FrameSink, FrameStream};
pub use endpoint::Endpoint;
pub use error::WireError;
pub use frame::{empty_frame, frame_as_u64, u64_frame, Frame};

/// Upper bound on a single frame's payload, in bytes.
///
/// Anything larger is treated as a corrupt stream rather than a legitimate
/// message: the transport is internal and no Switchyard message approaches
/// this size.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;
