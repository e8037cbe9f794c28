//! Per-connection reader tasks.
//!
//! Each accepted connection gets one reader task that funnels everything it
//! reads into the dispatcher's event channel. Reader tasks never touch the
//! connection table and never write; they exist so the dispatcher has a
//! single place where all reads arrive in a total order.
//!
//! Framing is intentionally primitive: one `read()` of up to `max_message`
//! bytes is one message. See `chatter-protocol` for the consequences.

use std::io::ErrorKind;

use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use chatter_core::SlotId;

/// What a reader task observed on its connection.
#[derive(Debug)]
pub enum PeerEventKind {
    /// One read's worth of payload bytes (never empty).
    Data(Vec<u8>),
    /// The remote closed cleanly or the read failed; the slot must be
    /// released.
    Closed,
}

/// Event funneled from a reader task to the dispatcher.
#[derive(Debug)]
pub struct PeerEvent {
    /// Slot of the connection this event belongs to.
    pub slot: SlotId,
    /// Connection number at accept time; stale events (slot already
    /// released and possibly reoccupied) are detected by comparing this
    /// against the table.
    pub conn: u64,
    pub kind: PeerEventKind,
}

/// Spawns the reader task for one connection.
///
/// The task ends after sending `Closed`, or silently once the dispatcher
/// goes away. An interrupted read is retried, never reported as a failure.
pub fn spawn_reader(
    slot: SlotId,
    conn: u64,
    mut reader: OwnedReadHalf,
    max_message: usize,
    events: mpsc::Sender<PeerEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let mut buf = vec![0u8; max_message];
            match reader.read(&mut buf).await {
                Ok(0) => {
                    // Remote closed cleanly.
                    let _ = events
                        .send(PeerEvent {
                            slot,
                            conn,
                            kind: PeerEventKind::Closed,
                        })
                        .await;
                    return;
                }
                Ok(n) => {
                    buf.truncate(n);
                    if events
                        .send(PeerEvent {
                            slot,
                            conn,
                            kind: PeerEventKind::Data(buf),
                        })
                        .await
                        .is_err()
                    {
                        // Dispatcher is gone; nothing left to report to.
                        return;
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(client = %slot, error = %e, "Read error, closing connection");
                    let _ = events
                        .send(PeerEvent {
                            slot,
                            conn,
                            kind: PeerEventKind::Closed,
                        })
                        .await;
                    return;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::{TcpListener, TcpStream};

    async fn reader_fixture(
        max_message: usize,
    ) -> (TcpStream, mpsc::Receiver<PeerEvent>, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let client = client.unwrap();
        let (stream, _) = accepted.unwrap();
        let (reader, _writer) = stream.into_split();

        let (tx, rx) = mpsc::channel(16);
        let task = spawn_reader(SlotId::new(0), 7, reader, max_message, tx);
        (client, rx, task)
    }

    #[tokio::test]
    async fn test_data_event_carries_payload_and_conn() {
        let (mut client, mut rx, _task) = reader_fixture(256).await;

        client.write_all(b"hello\n").await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.slot, SlotId::new(0));
        assert_eq!(event.conn, 7);
        match event.kind {
            PeerEventKind::Data(payload) => assert_eq!(payload, b"hello\n"),
            other => panic!("Expected Data, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_close_yields_closed_event_and_task_exit() {
        let (client, mut rx, task) = reader_fixture(256).await;

        drop(client);

        let event = rx.recv().await.unwrap();
        assert!(matches!(event.kind, PeerEventKind::Closed));
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_read_is_capped_at_max_message() {
        let (mut client, mut rx, _task) = reader_fixture(4).await;

        client.write_all(b"abcdefgh").await.unwrap();

        // One write larger than the cap arrives as multiple messages.
        let first = rx.recv().await.unwrap();
        match first.kind {
            PeerEventKind::Data(payload) => assert_eq!(payload, b"abcd"),
            other => panic!("Expected Data, got {other:?}"),
        }
        let second = rx.recv().await.unwrap();
        match second.kind {
            PeerEventKind::Data(payload) => assert_eq!(payload, b"efgh"),
            other => panic!("Expected Data, got {other:?}"),
        }
    }
}
