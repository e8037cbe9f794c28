//! Broadcast relay fan-out.
//!
//! Forwards one sender's payload, prefixed with its slot label, to every
//! other occupied slot. Delivery is independent per recipient: a dead
//! recipient is collected and reported, never allowed to abort delivery to
//! the rest.

use std::io::ErrorKind;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tracing::debug;

use chatter_core::SlotId;
use chatter_protocol::relay_frame;

use super::table::ConnectionTable;

/// Relays `payload` from `sender` to all other occupied slots.
///
/// Returns the slots whose delivery failed; the caller must release them
/// (the failure is almost always a peer that disconnected between its last
/// read and this write).
pub async fn relay(table: &mut ConnectionTable, sender: SlotId, payload: &[u8]) -> Vec<SlotId> {
    let frame = relay_frame(sender, payload);
    let mut failed = Vec::new();

    for slot in table.occupied_slots() {
        if slot == sender {
            continue;
        }
        let Some(writer) = table.writer_mut(slot) else {
            continue;
        };
        if let Err(e) = send_frame(writer, &frame).await {
            debug!(
                client = %slot,
                error = %e,
                "Relay delivery failed, recipient will be dropped"
            );
            failed.push(slot);
        }
    }

    failed
}

/// Writes a frame, retrying exactly once if the write is interrupted.
/// A second interruption or any other error is the recipient's failure.
pub(crate) async fn send_frame(
    writer: &mut OwnedWriteHalf,
    frame: &[u8],
) -> std::io::Result<()> {
    match writer.write_all(frame).await {
        Err(e) if e.kind() == ErrorKind::Interrupted => writer.write_all(frame).await,
        other => other,
    }
}
