//! Fixed-capacity connection table.
//!
//! The table maps slot index → live peer. Slot indices are stable for the
//! lifetime of a connection (no compaction), and slot assignment is
//! deterministic: `find_free_slot` always returns the lowest-indexed empty
//! slot. The occupied count the table reports is maintained by
//! `occupy`/`release` and must match the number of live peers at all times.

use std::net::SocketAddr;

use tokio::net::tcp::OwnedWriteHalf;
use tokio::task::JoinHandle;
use tracing::warn;

use chatter_core::SlotId;

/// A live client connection occupying one slot.
///
/// Holds the write half of the stream (the read half is owned by the peer's
/// reader task) and the reader task handle so the slot release can remove
/// the connection from the watch set.
#[derive(Debug)]
pub struct Peer {
    writer: OwnedWriteHalf,
    reader_task: JoinHandle<()>,
    conn: u64,
    addr: SocketAddr,
}

impl Peer {
    pub fn new(
        writer: OwnedWriteHalf,
        reader_task: JoinHandle<()>,
        conn: u64,
        addr: SocketAddr,
    ) -> Self {
        Self {
            writer,
            reader_task,
            conn,
            addr,
        }
    }

    /// Connection number assigned at accept time. Peer events carry this so
    /// the dispatcher can discard events from a released slot generation.
    pub fn conn(&self) -> u64 {
        self.conn
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stops the reader task. Dropping the peer afterwards closes the
    /// write half.
    pub fn abort_reader(&self) {
        self.reader_task.abort();
    }
}

/// Fixed-capacity registry of connection slots.
#[derive(Debug)]
pub struct ConnectionTable {
    slots: Vec<Option<Peer>>,
    occupied: usize,
}

impl ConnectionTable {
    /// Creates an empty table with `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots, occupied: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots. Invariant: equals the live client count.
    pub fn occupied(&self) -> usize {
        self.occupied
    }

    pub fn is_full(&self) -> bool {
        self.occupied == self.slots.len()
    }

    /// Returns the lowest-indexed empty slot, or `None` when the table is
    /// full. Scanning in index order keeps slot assignment reproducible.
    pub fn find_free_slot(&self) -> Option<SlotId> {
        self.slots
            .iter()
            .position(Option::is_none)
            .map(SlotId::new)
    }

    /// Places a peer into an empty slot. Returns `false` (and logs) if the
    /// slot is out of range or already occupied - both are caller bugs, but
    /// the table stays consistent rather than panicking.
    pub fn occupy(&mut self, slot: SlotId, peer: Peer) -> bool {
        match self.slots.get_mut(slot.index()) {
            Some(entry @ None) => {
                *entry = Some(peer);
                self.occupied += 1;
                true
            }
            Some(Some(_)) => {
                warn!(client = %slot, "Refusing to occupy an already-occupied slot");
                false
            }
            None => {
                warn!(client = %slot, capacity = self.capacity(), "Slot index out of range");
                false
            }
        }
    }

    /// Empties a slot and hands the peer back to the caller, which is
    /// responsible for aborting its reader task and dropping the write
    /// half. Releasing an empty slot is a caller bug; it is logged and
    /// returns `None` without corrupting the count.
    pub fn release(&mut self, slot: SlotId) -> Option<Peer> {
        match self.slots.get_mut(slot.index()) {
            Some(entry) => match entry.take() {
                Some(peer) => {
                    self.occupied -= 1;
                    Some(peer)
                }
                None => {
                    warn!(client = %slot, "Release of an already-empty slot");
                    None
                }
            },
            None => {
                warn!(client = %slot, capacity = self.capacity(), "Slot index out of range");
                None
            }
        }
    }

    /// Connection number of the peer in `slot`, if occupied.
    pub fn conn_at(&self, slot: SlotId) -> Option<u64> {
        self.slots
            .get(slot.index())
            .and_then(Option::as_ref)
            .map(Peer::conn)
    }

    /// Occupied slots in ascending index order.
    pub fn occupied_slots(&self) -> Vec<SlotId> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| entry.as_ref().map(|_| SlotId::new(i)))
            .collect()
    }

    /// Mutable access to the write half of the peer in `slot`.
    pub fn writer_mut(&mut self, slot: SlotId) -> Option<&mut OwnedWriteHalf> {
        self.slots
            .get_mut(slot.index())
            .and_then(Option::as_mut)
            .map(|peer| &mut peer.writer)
    }

    /// Empties every slot, aborting reader tasks. Used at shutdown.
    pub fn clear(&mut self) {
        for entry in &mut self.slots {
            if let Some(peer) = entry.take() {
                peer.abort_reader();
                self.occupied -= 1;
            }
        }
    }
}
