//! TCP connections carrying multipart messages.
//!
//! A connection splits into a [`FrameSink`] (write half) and a
//! [`FrameStream`] (read half) so one owner can send while another reads.
//! Both halves stay valid until dropped; there is no explicit close.

use crate::endpoint::Endpoint;
use crate::error::WireError;
use crate::frame::{read_message, write_message, Frame};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tracing::debug;

/// Outbound half of a frame connection.
#[derive(Debug)]
pub struct FrameSink {
    write: OwnedWriteHalf,
}

impl FrameSink {
    /// Send one multipart message.
    pub async fn send(&mut self, frames: &[Frame]) -> Result<(), WireError> {
        write_message(&mut self.write, frames).await
    }
}

/// Inbound half of a frame connection.
#[derive(Debug)]
pub struct FrameStream {
    read: OwnedReadHalf,
}

impl FrameStream {
    /// Receive the next multipart message.
    ///
    /// `Ok(None)` means the peer closed the connection on a message boundary.
    pub async fn recv(&mut self) -> Result<Option<Vec<Frame>>, WireError> {
        read_message(&mut self.read).await
    }
}

/// Open an outbound connection to `endpoint`.
pub async fn connect(endpoint: &Endpoint) -> Result<(FrameSink, FrameStream), WireError> {
    let stream = TcpStream::connect(endpoint.as_str()).await?;
    stream.set_nodelay(true)?;
    debug!(endpoint = %endpoint, "connected");
    Ok(split(stream))
}

/// Listener side of the frame transport, used by peers serving requests.
pub struct FrameListener {
    inner: TcpListener,
}

impl FrameListener {
    /// Bind a listener on `endpoint`.
    ///
    /// Binding port 0 picks a free port; see [`FrameListener::local_endpoint`].
    pub async fn bind(endpoint: &Endpoint) -> Result<Self, WireError> {
        let inner = TcpListener::bind(endpoint.as_str()).await?;
        Ok(Self { inner })
    }

    /// The endpoint this listener is actually bound to.
    pub fn local_endpoint(&self) -> Result<Endpoint, WireError> {
        Ok(Endpoint::from(self.inner.local_addr()?))
    }

    /// Accept the next inbound connection.
    pub async fn accept(&self) -> Result<(FrameSink, FrameStream), WireError> {
        let (stream, peer) = self.inner.accept().await?;
        stream.set_nodelay(true)?;
        debug!(peer = %peer, "accepted connection");
        Ok(split(stream))
    }
}

fn split(stream: TcpStream) -> (FrameSink, FrameStream) {
    let (read, write) = stream.into_split();
    (FrameSink { write }, FrameStream { read })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_connect_and_exchange() {
        let listener = FrameListener::bind(&Endpoint::from("127.0.0.1:0"))
            .await
            .unwrap();
        let endpoint = listener.local_endpoint().unwrap();

        let server = tokio::spawn(async move {
            let (mut sink, mut stream) = listener.accept().await.unwrap();
            let request = stream.recv().await.unwrap().unwrap();
            assert_eq!(request, vec![Bytes::from_static(b"hello")]);
            sink.send(&[Bytes::from_static(b"world")]).await.unwrap();
        });

        let (mut sink, mut stream) = connect(&endpoint).await.unwrap();
        sink.send(&[Bytes::from_static(b"hello")]).await.unwrap();
        let reply = stream.recv().await.unwrap().unwrap();
        assert_eq!(reply, vec![Bytes::from_static(b"world")]);

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_recv_reports_peer_close() {
        let listener = FrameListener::bind(&Endpoint::from("127.0.0.1:0"))
            .await
            .unwrap();
        let endpoint = listener.local_endpoint().unwrap();

        let (_sink, mut stream) = connect(&endpoint).await.unwrap();
        let accepted = listener.accept().await.unwrap();
        drop(accepted);

        assert!(stream.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Port 1 on localhost is essentially never listening.
        let err = connect(&Endpoint::from("127.0.0.1:1")).await.unwrap_err();
        assert!(matches!(err, WireError::Io(_)));
    }
}
