//! Frame representation and the multipart codec.
//!
//! A [`Frame`] is an opaque byte sequence; a message is a non-empty `Vec` of
//! frames. The codec is generic over `AsyncRead`/`AsyncWrite` so it can be
//! exercised without sockets; [`crate::connection`] applies it to TCP halves.

use crate::error::WireError;
use crate::MAX_FRAME_LEN;
use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// One frame of a multipart message.
pub type Frame = Bytes;

/// Flags bit marking that more frames follow in the same message.
const MORE: u8 = 0x01;

/// Bytes of header preceding each frame payload: flags + u32 length.
const HEADER_LEN: usize = 5;

/// The zero-length delimiter frame.
pub fn empty_frame() -> Frame {
    Bytes::new()
}

/// Encode a `u64` as a fixed 8-byte big-endian frame.
pub fn u64_frame(value: u64) -> Frame {
    Bytes::copy_from_slice(&value.to_be_bytes())
}

/// Decode a fixed 8-byte big-endian integer frame.
pub fn frame_as_u64(frame: &Frame) -> Result<u64, WireError> {
    let bytes: [u8; 8] = frame
        .as_ref()
        .try_into()
        .map_err(|_| WireError::BadLength { len: frame.len() })?;
    Ok(u64::from_be_bytes(bytes))
}

/// Write one multipart message.
///
/// The whole message is serialized into a single buffer and written with one
/// call, so concurrent writers on *different* sockets never interleave and a
/// partially written message is only possible on socket failure.
pub async fn write_message<W>(writer: &mut W, frames: &[Frame]) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    debug_assert!(!frames.is_empty(), "a message has at least one frame");

    // Enforce the same bound the reader does, so an oversized frame fails
    // here instead of desyncing the peer's stream.
    for frame in frames {
        if frame.len() > MAX_FRAME_LEN {
            return Err(WireError::FrameTooLarge {
                len: frame.len(),
                max: MAX_FRAME_LEN,
            });
        }
    }

    let total: usize = frames.iter().map(|f| HEADER_LEN + f.len()).sum();
    let mut buf = BytesMut::with_capacity(total);
    let last = frames.len() - 1;
    for (i, frame) in frames.iter().enumerate() {
        buf.put_u8(if i < last { MORE } else { 0 });
        buf.put_u32(frame.len() as u32);
        buf.put_slice(frame);
    }

    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one multipart message.
///
/// Returns `Ok(None)` on a clean end-of-stream, i.e. the peer closed the
/// socket on a message boundary. A close partway through a message is
/// [`WireError::ConnectionClosed`].
pub async fn read_message<R>(reader: &mut R) -> Result<Option<Vec<Frame>>, WireError>
where
    R: AsyncRead + Unpin,
{
    let mut frames = Vec::new();
    loop {
        let header = match read_header(reader).await? {
            Some(header) => header,
            None if frames.is_empty() => return Ok(None),
            None => return Err(WireError::ConnectionClosed),
        };
        let (more, len) = header;
        if len > MAX_FRAME_LEN {
            return Err(WireError::FrameTooLarge {
                len,
                max: MAX_FRAME_LEN,
            });
        }

        let mut payload = vec![0u8; len];
        reader
            .read_exact(&mut payload)
            .await
            .map_err(eof_as_closed)?;
        frames.push(Bytes::from(payload));

        if !more {
            return Ok(Some(frames));
        }
    }
}

/// Read a frame header, distinguishing end-of-stream from a short read.
async fn read_header<R>(reader: &mut R) -> Result<Option<(bool, usize)>, WireError>
where
    R: AsyncRead + Unpin,
{
    let mut flags = [0u8; 1];
    match reader.read_exact(&mut flags).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let mut len = [0u8; 4];
    reader.read_exact(&mut len).await.map_err(eof_as_closed)?;
    Ok(Some((flags[0] & MORE != 0, u32::from_be_bytes(len) as usize)))
}

/// EOF once a message has started means the peer vanished mid-message.
fn eof_as_closed(e: std::io::Error) -> WireError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        WireError::ConnectionClosed
    } else {
        WireError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_preserves_frames() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        let message = vec![
            empty_frame(),
            u64_frame(0xDEAD_BEEF),
            Bytes::from_static(b"ping"),
        ];
        write_message(&mut client, &message).await.unwrap();

        let received = read_message(&mut server).await.unwrap().unwrap();
        assert_eq!(received, message);
    }

    #[tokio::test]
    async fn test_empty_frames_survive() {
        let (mut client, mut server) = tokio::io::duplex(64);

        let message = vec![empty_frame(), empty_frame(), empty_frame()];
        write_message(&mut client, &message).await.unwrap();

        let received = read_message(&mut server).await.unwrap().unwrap();
        assert_eq!(received.len(), 3);
        assert!(received.iter().all(Bytes::is_empty));
    }

    #[tokio::test]
    async fn test_messages_do_not_bleed_into_each_other() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        write_message(&mut client, &[Bytes::from_static(b"one")])
            .await
            .unwrap();
        write_message(
            &mut client,
            &[Bytes::from_static(b"two"), Bytes::from_static(b"frames")],
        )
        .await
        .unwrap();

        let first = read_message(&mut server).await.unwrap().unwrap();
        assert_eq!(first, vec![Bytes::from_static(b"one")]);

        let second = read_message(&mut server).await.unwrap().unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(second[1], Bytes::from_static(b"frames"));
    }

    #[tokio::test]
    async fn test_clean_eof_is_end_of_stream() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);

        assert!(read_message(&mut server).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_eof_mid_message_is_an_error() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        // First frame claims more will follow, then the writer disappears.
        let mut buf = BytesMut::new();
        buf.put_u8(MORE);
        buf.put_u32(2);
        buf.put_slice(b"ab");
        client.write_all(&buf).await.unwrap();
        drop(client);

        let err = read_message(&mut server).await.unwrap_err();
        assert!(matches!(err, WireError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected_on_write() {
        let (mut client, _server) = tokio::io::duplex(64);

        let oversized = Bytes::from(vec![0u8; MAX_FRAME_LEN + 1]);
        let err = write_message(&mut client, &[oversized]).await.unwrap_err();
        assert!(matches!(err, WireError::FrameTooLarge { .. }));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected_on_read() {
        let (mut client, mut server) = tokio::io::duplex(64);

        let mut buf = BytesMut::new();
        buf.put_u8(0);
        buf.put_u32(u32::MAX);
        client.write_all(&buf).await.unwrap();

        let err = read_message(&mut server).await.unwrap_err();
        assert!(matches!(err, WireError::FrameTooLarge { .. }));
    }

    #[test]
    fn test_u64_frame_round_trip() {
        let frame = u64_frame(42);
        assert_eq!(frame.len(), 8);
        assert_eq!(frame_as_u64(&frame).unwrap(), 42);

        let frame = u64_frame(u64::MAX);
        assert_eq!(frame_as_u64(&frame).unwrap(), u64::MAX);
    }

    #[test]
    fn test_u64_frame_bad_length() {
        let err = frame_as_u64(&Bytes::from_static(b"short")).unwrap_err();
        assert!(matches!(err, WireError::BadLength { len: 5 }));
    }
}
