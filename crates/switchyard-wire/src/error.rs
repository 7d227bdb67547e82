//! Transport error types.

use thiserror::Error;

/// Errors surfaced by the frame transport.
#[derive(Debug, Error)]
pub enum WireError {
    /// Underlying socket failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the socket in the middle of a multipart message.
    ///
    /// A close *between* messages is not an error; `FrameStream::recv`
    /// reports it as end-of-stream instead.
    #[error("connection closed mid-message")]
    ConnectionClosed,

    /// A frame header announced a payload beyond [`crate::MAX_FRAME_LEN`].
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    /// A fixed-width integer frame had the wrong payload size.
    #[error("expected an 8 byte integer frame, got {len} bytes")]
    BadLength { len: usize },
}
