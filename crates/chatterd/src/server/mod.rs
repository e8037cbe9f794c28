//! TCP relay server.
//!
//! The server:
//! - Listens on a TCP port with address reuse and a backlog equal to the
//!   client capacity
//! - Accepts connections into the lowest free slot of a fixed-capacity
//!   connection table; while the table is full the accept arm is disabled,
//!   so pending connections wait unaccepted in the OS backlog
//! - Relays each client's messages, labeled with the sender's slot, to all
//!   other clients
//! - Acknowledges the `exit` handshake and reclaims slots on disconnect
//! - Supports graceful shutdown via CancellationToken
//!
//! All table mutation and all writes happen on the single dispatcher task
//! inside [`RelayServer::run`]; per-connection reader tasks only funnel
//! reads into its event channel. That channel serializes every read into a
//! total order, so no locking is needed anywhere.

mod peer;
mod relay;
mod table;

pub use peer::{PeerEvent, PeerEventKind};
pub use table::{ConnectionTable, Peer};

use std::net::SocketAddr;

use tokio::net::{TcpSocket, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use chatter_core::{RelayConfig, SlotId};
use chatter_protocol::{is_termination, ACK_MARKER};

/// Capacity of the dispatcher's event channel. Readers block (providing
/// natural backpressure) once the dispatcher falls this far behind.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Bounded broadcast relay server.
///
/// Owns the listener, the connection table and the dispatcher loop.
/// Multiple independent instances can run in one process; all state lives
/// in the instance.
#[derive(Debug)]
pub struct RelayServer {
    config: RelayConfig,
    listener: tokio::net::TcpListener,
    local_addr: SocketAddr,
    table: ConnectionTable,
    connections: u64,
    cancel_token: CancellationToken,
    events_tx: mpsc::Sender<PeerEvent>,
    events_rx: mpsc::Receiver<PeerEvent>,
}

impl RelayServer {
    /// Creates the listening socket and the server around it.
    ///
    /// Address reuse is enabled so a restart right after a crash does not
    /// fail to bind. The listen backlog equals `max_clients`: overflow
    /// connections queue in the kernel and are only accepted once a slot
    /// frees up.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(config: RelayConfig, cancel_token: CancellationToken) -> Result<Self, ServerError> {
        config.validate().map_err(ServerError::Config)?;

        let socket = match config.family {
            chatter_core::AddrFamily::V4 => TcpSocket::new_v4(),
            chatter_core::AddrFamily::V6 => TcpSocket::new_v6(),
        }
        .map_err(ServerError::Socket)?;

        socket.set_reuseaddr(true).map_err(ServerError::Socket)?;

        let addr = config.bind_addr();
        socket
            .bind(addr)
            .map_err(|e| ServerError::Bind { addr, source: e })?;

        let listener = socket
            .listen(config.max_clients as u32)
            .map_err(ServerError::Listen)?;

        let local_addr = listener.local_addr().map_err(ServerError::Socket)?;

        let table = ConnectionTable::new(config.max_clients);
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            config,
            listener,
            local_addr,
            table,
            connections: 0,
            cancel_token,
            events_tx,
            events_rx,
        })
    }

    /// The address the listener actually bound (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Runs the dispatcher loop until the cancellation token is triggered.
    /// This method does not return during normal operation.
    pub async fn run(mut self) -> Result<(), ServerError> {
        info!(
            addr = %self.local_addr,
            max_clients = self.config.max_clients,
            max_message = self.config.max_message,
            "Relay server listening"
        );

        loop {
            // The accept arm is gated off while the table is full: new
            // connections stay in the OS backlog until a slot frees up.
            let accepting = !self.table.is_full();

            tokio::select! {
                // Listener readiness is checked before peer traffic within
                // a tick, matching the accept-first dispatch order.
                biased;

                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = self.listener.accept(), if accepting => {
                    match result {
                        Ok((stream, addr)) => self.admit(stream, addr),
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            // Continue serving existing clients
                        }
                    }
                }

                event = self.events_rx.recv() => {
                    match event {
                        Some(event) => self.handle_peer_event(event).await,
                        // Unreachable while self holds events_tx
                        None => break,
                    }
                }
            }
        }

        self.table.clear();
        info!("Relay server stopped");
        Ok(())
    }

    /// Registers an accepted connection in the lowest free slot and spawns
    /// its reader task.
    fn admit(&mut self, stream: TcpStream, addr: SocketAddr) {
        let Some(slot) = self.table.find_free_slot() else {
            // The accept gate makes this unreachable, but stay consistent
            // rather than trust it.
            warn!(peer = %addr, "Accepted a connection with no free slot, dropping it");
            return;
        };

        self.connections += 1;
        let conn = self.connections;

        let (reader, writer) = stream.into_split();
        let reader_task = peer::spawn_reader(
            slot,
            conn,
            reader,
            self.config.max_message,
            self.events_tx.clone(),
        );

        if !self.table.occupy(slot, Peer::new(writer, reader_task, conn, addr)) {
            return;
        }

        info!(
            client = %slot,
            peer = %addr,
            clients = self.table.occupied(),
            "Client connected"
        );

        if self.table.is_full() {
            info!(
                max = self.config.max_clients,
                "Connection table full; new connections wait in the backlog"
            );
        }
    }

    /// Processes one reader-task event.
    async fn handle_peer_event(&mut self, event: PeerEvent) {
        // Drop events from a slot generation that has already been
        // released (e.g. a recipient dropped mid-relay whose reader had a
        // queued event, possibly with the slot reoccupied since).
        if self.table.conn_at(event.slot) != Some(event.conn) {
            debug!(client = %event.slot, conn = event.conn, "Dropping stale peer event");
            return;
        }

        match event.kind {
            PeerEventKind::Closed => {
                self.release(event.slot, "peer disconnected");
            }
            PeerEventKind::Data(payload) => {
                debug!(client = %event.slot, len = payload.len(), "Message received");

                // With a single client there is nobody to relay to.
                if self.table.occupied() > 1 {
                    let failed = relay::relay(&mut self.table, event.slot, &payload).await;
                    for slot in failed {
                        self.release(slot, "relay delivery failed");
                    }
                }

                if is_termination(&payload) {
                    self.acknowledge(event.slot).await;
                    self.release(event.slot, "session terminated");
                }
            }
        }
    }

    /// Sends the acknowledgement marker to a terminating client.
    /// Best-effort: a failed delivery still results in termination.
    async fn acknowledge(&mut self, slot: SlotId) {
        let Some(writer) = self.table.writer_mut(slot) else {
            return;
        };
        match relay::send_frame(writer, ACK_MARKER).await {
            Ok(()) => debug!(client = %slot, "Acknowledgement sent"),
            Err(e) => debug!(client = %slot, error = %e, "Failed to deliver acknowledgement"),
        }
    }

    /// Releases a slot: stops its reader task (the watch-set removal) and
    /// drops the write half (the close).
    fn release(&mut self, slot: SlotId, reason: &str) {
        if let Some(peer) = self.table.release(slot) {
            peer.abort_reader();
            info!(
                client = %slot,
                peer = %peer.addr(),
                clients = self.table.occupied(),
                reason,
                "Client disconnected"
            );
        }
    }
}

/// Errors that can occur setting up or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid configuration: {0}")]
    Config(#[source] chatter_core::ConfigError),

    #[error("Failed to create listening socket: {0}")]
    Socket(#[source] std::io::Error),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to listen: {0}")]
    Listen(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatter_core::AddrFamily;

    fn test_config() -> RelayConfig {
        RelayConfig {
            port: 0,
            family: AddrFamily::V4,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_bind_resolves_ephemeral_port() {
        let server = RelayServer::bind(test_config(), CancellationToken::new()).unwrap();
        assert_ne!(server.local_addr().port(), 0);
        assert!(server.local_addr().is_ipv4());
    }

    #[tokio::test]
    async fn test_bind_rejects_invalid_config() {
        let config = RelayConfig {
            max_clients: 0,
            ..test_config()
        };
        let err = RelayServer::bind(config, CancellationToken::new()).unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[tokio::test]
    async fn test_two_servers_cannot_share_a_port() {
        let first = RelayServer::bind(test_config(), CancellationToken::new()).unwrap();
        let config = RelayConfig {
            port: first.local_addr().port(),
            ..test_config()
        };
        // SO_REUSEADDR permits rebinding a lingering TIME_WAIT socket, not
        // a port with a live listener.
        let err = RelayServer::bind(config, CancellationToken::new()).unwrap_err();
        assert!(matches!(err, ServerError::Bind { .. }));
    }

    #[tokio::test]
    async fn test_shutdown_via_cancellation() {
        let cancel_token = CancellationToken::new();
        let server = RelayServer::bind(test_config(), cancel_token.clone()).unwrap();

        let handle = tokio::spawn(server.run());
        cancel_token.cancel();

        let result = tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("server did not stop")
            .expect("server task panicked");
        assert!(result.is_ok());
    }
}
