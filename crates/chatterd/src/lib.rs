//! Chatter Daemon - bounded broadcast relay over TCP
//!
//! This crate provides the relay server infrastructure:
//! - `server` - connection table, peer readers, relay fan-out and the
//!   dispatcher event loop
//! - `cli` - daemon entry point (`start`/`stop`/`status`, PID file,
//!   signal-driven shutdown)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     chatterd daemon                      │
//! ├──────────────────────────────────────────────────────────┤
//! │                                                          │
//! │  ┌──────────────┐  accept   ┌──────────────────────────┐ │
//! │  │ TcpListener  │──────────▶│      RelayServer         │ │
//! │  │ (gated while │           │ (dispatcher task, owns   │ │
//! │  │  table full) │           │  the ConnectionTable)    │ │
//! │  └──────────────┘           └───────────┬──────────────┘ │
//! │                                  ▲      │ relay fan-out  │
//! │                      PeerEvent   │      ▼                │
//! │  ┌──────────────┐   mpsc channel │  ┌─────────────────┐  │
//! │  │ reader task  │────────────────┘  │ peer write half │  │
//! │  │ (per client) │                   │   (per slot)    │  │
//! │  └──────────────┘                   └─────────────────┘  │
//! │                                                          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Reader tasks only read; every table mutation and every write happens on
//! the dispatcher task, which serializes all traffic into a total order.
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod cli;
pub mod server;
