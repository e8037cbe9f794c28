//! Markers and relay frame construction.

use chatter_core::SlotId;

/// Literal a client sends to end its session. Case-sensitive, trailing
/// newline required, matched against the whole payload: a message with
/// trailing bytes after the literal does NOT terminate the session.
pub const TERMINATION_MARKER: &[u8] = b"exit\n";

/// Literal the server sends back to a terminating client, and only to it,
/// before closing the slot.
pub const ACK_MARKER: &[u8] = b"OK";

/// Returns the sender label prefixed to relayed payloads, e.g. `"C1: "`
/// for the client in slot 0.
pub fn sender_label(slot: SlotId) -> String {
    format!("C{}: ", slot.client_number())
}

/// Builds the frame relayed to every other client: the sender label
/// followed by the raw payload bytes, no additional delimiter.
pub fn relay_frame(slot: SlotId, payload: &[u8]) -> Vec<u8> {
    let label = sender_label(slot);
    let mut frame = Vec::with_capacity(label.len() + payload.len());
    frame.extend_from_slice(label.as_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Whether a payload is the termination marker.
pub fn is_termination(payload: &[u8]) -> bool {
    payload == TERMINATION_MARKER
}

/// Whether a payload is the server's acknowledgement marker.
pub fn is_acknowledgement(payload: &[u8]) -> bool {
    payload == ACK_MARKER
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_label_is_one_based() {
        assert_eq!(sender_label(SlotId::new(0)), "C1: ");
        assert_eq!(sender_label(SlotId::new(4)), "C5: ");
    }

    #[test]
    fn test_relay_frame_prefixes_label() {
        let frame = relay_frame(SlotId::new(0), b"hello\n");
        assert_eq!(frame, b"C1: hello\n");
    }

    #[test]
    fn test_relay_frame_keeps_payload_verbatim() {
        // The payload is opaque bytes; the frame adds nothing but the label.
        let frame = relay_frame(SlotId::new(2), b"no newline");
        assert_eq!(frame, b"C3: no newline");
    }

    #[test]
    fn test_termination_requires_exact_match() {
        assert!(is_termination(b"exit\n"));
        assert!(!is_termination(b"exit"));
        assert!(!is_termination(b"EXIT\n"));
        assert!(!is_termination(b"exit\nmore"));
        assert!(!is_termination(b" exit\n"));
    }

    #[test]
    fn test_acknowledgement_exact_match() {
        assert!(is_acknowledgement(b"OK"));
        assert!(!is_acknowledgement(b"OK\n"));
        assert!(!is_acknowledgement(b"ok"));
    }
}
