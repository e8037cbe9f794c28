//! Interactive relay session.
//!
//! `run_session` connects and runs the two forwarding tasks described in
//! the crate docs. Both directions treat one read as one message, matching
//! the relay's framing.

use std::io::ErrorKind;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info};

use chatter_core::{DEFAULT_MAX_MESSAGE, DEFAULT_PORT};
use chatter_protocol::{is_acknowledgement, is_termination};

use crate::error::{ClientError, Result};

/// Configuration for a client session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server host name or address.
    pub host: String,

    /// Server TCP port.
    pub port: u16,

    /// Maximum bytes accepted per read; matches the server's message cap.
    pub max_message: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            max_message: DEFAULT_MAX_MESSAGE,
        }
    }
}

/// Connects and runs a full interactive session over stdin/stdout.
///
/// Returns once the session ends: the server acknowledged our exit, the
/// server went away, or stdin reached end of file.
pub async fn run_session(config: &ClientConfig) -> Result<()> {
    let stream = TcpStream::connect((config.host.as_str(), config.port))
        .await
        .map_err(|e| ClientError::Connect {
            host: config.host.clone(),
            port: config.port,
            source: e,
        })?;

    info!(host = %config.host, port = config.port, "Connected to relay");

    let (reader, writer) = stream.into_split();
    let max_message = config.max_message;

    let mut incoming = tokio::spawn(forward_incoming(reader, tokio::io::stdout(), max_message));
    let mut outgoing = tokio::spawn(forward_outgoing(BufReader::new(tokio::io::stdin()), writer));

    // The tasks share nothing but the connection; they are only joined
    // here, at session end.
    tokio::select! {
        res = &mut incoming => {
            // Server acknowledged or vanished; stop reading the terminal.
            outgoing.abort();
            res??;
        }
        res = &mut outgoing => {
            res??;
            // The termination line is on the wire (or stdin closed, which
            // drops the write half); wait for the server's side to finish.
            incoming.await??;
        }
    }

    debug!("Session ended");
    Ok(())
}

/// Socket → terminal. Prints relayed chunks verbatim and stops on the
/// acknowledgement marker or when the server closes the connection.
async fn forward_incoming<R, W>(mut socket: R, mut out: W, max_message: usize) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let mut buf = vec![0u8; max_message];
        match socket.read(&mut buf).await {
            Ok(0) => {
                out.write_all(b"Server closed the connection.\n").await?;
                out.flush().await?;
                return Ok(());
            }
            Ok(n) => {
                buf.truncate(n);
                if is_acknowledgement(&buf) {
                    out.write_all(b"Session closed.\n").await?;
                    out.flush().await?;
                    return Ok(());
                }
                out.write_all(&buf).await?;
                out.flush().await?;
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Terminal → socket. Writes each typed line (newline included) as one
/// write and stops after sending the termination line or on end of file.
async fn forward_outgoing<R, W>(mut input: R, mut socket: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        let n = input.read_line(&mut line).await?;
        if n == 0 {
            // End of input; dropping the write half tells the server.
            return Ok(());
        }
        socket.write_all(line.as_bytes()).await?;
        if is_termination(line.as_bytes()) {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_incoming_prints_until_acknowledgement() {
        let (mut server_end, client_end) = duplex(1024);
        let mut printed = Vec::new();

        let session = tokio::spawn(async move {
            let mut out = Vec::new();
            forward_incoming(client_end, &mut out, 256).await.map(|_| out)
        });

        server_end.write_all(b"C2: hello\n").await.unwrap();
        // Let the reader drain the first chunk so the marker is not
        // coalesced with it.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        server_end.write_all(b"OK").await.unwrap();

        let printed_result = session.await.unwrap().unwrap();
        printed.extend(printed_result);
        assert!(printed.starts_with(b"C2: hello\n"));
        assert!(printed.ends_with(b"Session closed.\n"));
    }

    #[tokio::test]
    async fn test_incoming_handles_server_close() {
        let (server_end, client_end) = duplex(1024);
        drop(server_end);

        let mut out = Vec::new();
        forward_incoming(client_end, &mut out, 256).await.unwrap();
        assert_eq!(out, b"Server closed the connection.\n");
    }

    #[tokio::test]
    async fn test_outgoing_stops_after_termination_line() {
        let input = BufReader::new(&b"hi there\nexit\nnever sent\n"[..]);
        let (client_end, mut server_end) = duplex(1024);

        forward_outgoing(input, client_end).await.unwrap();

        let mut sent = Vec::new();
        server_end.read_to_end(&mut sent).await.unwrap();
        assert_eq!(sent, b"hi there\nexit\n");
    }

    #[tokio::test]
    async fn test_outgoing_stops_on_end_of_input() {
        let input = BufReader::new(&b"only line\n"[..]);
        let (client_end, mut server_end) = duplex(1024);

        forward_outgoing(input, client_end).await.unwrap();

        let mut sent = Vec::new();
        server_end.read_to_end(&mut sent).await.unwrap();
        assert_eq!(sent, b"only line\n");
    }

    #[tokio::test]
    async fn test_exit_without_newline_is_not_termination() {
        // read_line delivers the final unterminated line at EOF; it must
        // be sent but not treated as the termination marker.
        let input = BufReader::new(&b"exit"[..]);
        let (client_end, mut server_end) = duplex(1024);

        forward_outgoing(input, client_end).await.unwrap();

        let mut sent = Vec::new();
        server_end.read_to_end(&mut sent).await.unwrap();
        assert_eq!(sent, b"exit");
    }
}
