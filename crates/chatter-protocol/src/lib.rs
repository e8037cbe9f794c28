//! Chatter Protocol - Wire conventions for the text relay
//!
//! The wire format is deliberately primitive: plaintext over a raw byte
//! stream, with one transport read treated as one application message.
//! There is no length prefix, so two small writes landing within one read
//! window coalesce into a single message, and an oversized write splits
//! across reads. This crate preserves that behavior; callers that need
//! stronger framing must layer it themselves.

pub mod message;

pub use message::{
    is_acknowledgement, is_termination, relay_frame, sender_label, ACK_MARKER, TERMINATION_MARKER,
};
