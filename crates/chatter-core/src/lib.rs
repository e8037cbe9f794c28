//! Chatter Core - Shared types for the bounded TCP text relay
//!
//! This crate provides the domain types and configuration shared between
//! the relay daemon (chatterd) and the terminal client (chatter).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod config;
pub mod error;
pub mod slot;

// Re-exports for convenience
pub use config::{AddrFamily, RelayConfig, DEFAULT_MAX_CLIENTS, DEFAULT_MAX_MESSAGE, DEFAULT_PORT};
pub use error::{ConfigError, ConfigResult};
pub use slot::SlotId;
