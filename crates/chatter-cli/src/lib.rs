//! Chatter client - line-oriented terminal front-end for the relay.
//!
//! The client is deliberately dumb: it has no state machine of its own.
//! Two concurrent tasks share one TCP connection - one reads the socket
//! and prints relayed text until the server acknowledges the session end,
//! the other reads typed lines and writes them until the user types the
//! termination line. The tasks synchronize only at process exit.

pub mod cli;
pub mod client;
pub mod error;

pub use client::{run_session, ClientConfig};
pub use error::{ClientError, Result};
