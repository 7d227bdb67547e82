//! Scripted test peer: a frame-transport server with configurable reply
//! behavior, run on its own thread with its own runtime so tests can drive
//! the manager's blocking API from plain test threads.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use switchyard_wire::{empty_frame, Endpoint, Frame, FrameListener, FrameSink, FrameStream};

/// What the peer does with each request it receives.
#[derive(Debug, Clone, Copy)]
pub enum PeerBehavior {
    /// Reply with the request payload, unmodified.
    Echo,
    /// Reply with a fixed payload, whatever was asked.
    ReplyWith(&'static [u8]),
    /// Never reply.
    Silent,
    /// Echo, but only after a delay.
    DelayedEcho(Duration),
    /// Swallow the first request on each connection, answer from the second
    /// onward. Exercises out-of-order completion.
    IgnoreFirst,
}

/// A running peer. The listener thread is detached; it lives until the test
/// process exits.
pub struct Peer {
    pub endpoint: Endpoint,
    _thread: thread::JoinHandle<()>,
}

/// Bind a peer on an ephemeral localhost port and serve `behavior`.
pub fn spawn_peer(behavior: PeerBehavior) -> Peer {
    let (endpoint_tx, endpoint_rx) = mpsc::channel();

    let thread = thread::Builder::new()
        .name("test-peer".to_string())
        .spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("peer runtime");
            let local = tokio::task::LocalSet::new();
            local.block_on(&runtime, async move {
                let listener = FrameListener::bind(&Endpoint::from("127.0.0.1:0"))
                    .await
                    .expect("peer bind");
                endpoint_tx
                    .send(listener.local_endpoint().expect("peer endpoint"))
                    .expect("peer endpoint handoff");

                loop {
                    match listener.accept().await {
                        Ok((sink, stream)) => {
                            tokio::task::spawn_local(serve(behavior, sink, stream));
                        }
                        Err(_) => break,
                    }
                }
            });
        })
        .expect("peer thread");

    let endpoint = endpoint_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("peer did not come up");
    Peer {
        endpoint,
        _thread: thread,
    }
}

async fn serve(behavior: PeerBehavior, mut sink: FrameSink, mut stream: FrameStream) {
    let mut requests_seen = 0usize;

    while let Ok(Some(frames)) = stream.recv().await {
        // Requests arrive as [delimiter, correlation id, payload...].
        assert!(
            frames.len() >= 2 && frames[0].is_empty(),
            "peer received malformed request"
        );
        let correlation = frames[1].clone();
        let payload = frames[2..].to_vec();
        requests_seen += 1;

        match behavior {
            PeerBehavior::Echo => reply(&mut sink, &correlation, &payload).await,
            PeerBehavior::ReplyWith(body) => {
                reply(&mut sink, &correlation, &[Frame::from_static(body)]).await;
            }
            PeerBehavior::Silent => {}
            PeerBehavior::DelayedEcho(delay) => {
                tokio::time::sleep(delay).await;
                reply(&mut sink, &correlation, &payload).await;
            }
            PeerBehavior::IgnoreFirst => {
                if requests_seen > 1 {
                    reply(&mut sink, &correlation, &payload).await;
                }
            }
        }
    }
}

async fn reply(sink: &mut FrameSink, correlation: &Frame, payload: &[Frame]) {
    let mut frames = Vec::with_capacity(2 + payload.len());
    frames.push(empty_frame());
    frames.push(correlation.clone());
    frames.extend_from_slice(payload);
    sink.send(&frames).await.expect("peer reply");
}
