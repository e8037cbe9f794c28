//! Client error types.

use thiserror::Error;

/// Errors that can occur in a client session.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Could not reach the server
    #[error("Failed to connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// I/O on the established connection or the terminal failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A session task ended abnormally
    #[error("Session task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
