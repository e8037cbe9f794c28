//! Slot identifiers for the bounded connection table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A fixed index into the connection table.
///
/// Slots are 0-based internally and stable for the lifetime of the
/// connection occupying them (the table never compacts). User-facing
/// labels are 1-based: slot 0 is client `C1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotId(usize);

impl SlotId {
    /// Creates a slot ID from a 0-based table index.
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the 0-based table index.
    pub fn index(&self) -> usize {
        self.0
    }

    /// Returns the 1-based client number used in relay labels.
    pub fn client_number(&self) -> usize {
        self.0 + 1
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.client_number())
    }
}

impl From<usize> for SlotId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_number_is_one_based() {
        assert_eq!(SlotId::new(0).client_number(), 1);
        assert_eq!(SlotId::new(4).client_number(), 5);
    }

    #[test]
    fn test_display_uses_client_number() {
        assert_eq!(SlotId::new(0).to_string(), "C1");
        assert_eq!(SlotId::new(2).to_string(), "C3");
    }

    #[test]
    fn test_ordering_follows_index() {
        assert!(SlotId::new(0) < SlotId::new(1));
    }
}
