//! Strongly-typed identifiers for contexts and blocks.

use std::fmt;

/// Identifies a memory context within a context tree.
///
/// Contexts live in slots that are recycled after deletion. The
/// `generation` disambiguates a deleted context from a newer context that
/// reuses its slot, so a stale `ContextId` never resolves to the wrong
/// context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId {
    slot: u32,
    generation: u32,
}

impl ContextId {
    /// Create an id for the given slot and generation.
    pub const fn new(slot: u32, generation: u32) -> Self {
        Self { slot, generation }
    }

    /// Slot index within the owning tree.
    pub const fn slot(self) -> u32 {
        self.slot
    }

    /// Generation of the slot when this context was created.
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx{}.{}", self.slot, self.generation)
    }
}

/// Native address of a block allocated from a memory context.
///
/// Addresses are composed by the host arena from the owning context's slot,
/// the segment index, and the offset within the segment:
///
/// ```text
///  63            40 39     32 31                0
/// +----------------+---------+-------------------+
/// |  context slot  | segment |      offset       |
/// +----------------+---------+-------------------+
/// ```
///
/// Like real arena addresses, the same value recurs once the owning context
/// is reset and its segments are bump-allocated again. Anything keyed by a
/// `BlockAddr` must therefore be invalidated when the scope ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockAddr(u64);

impl BlockAddr {
    /// Largest slot index representable in an address.
    pub const MAX_SLOT: u32 = (1 << 24) - 1;

    /// Compose an address from its parts.
    ///
    /// Bits of `slot` above [`BlockAddr::MAX_SLOT`] are discarded.
    pub const fn new(slot: u32, segment: u8, offset: u32) -> Self {
        let slot = (slot & Self::MAX_SLOT) as u64;
        Self((slot << 40) | ((segment as u64) << 32) | offset as u64)
    }

    /// Reinterpret a raw address value.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw 64-bit address value.
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Slot of the context the block was allocated from.
    pub const fn slot(self) -> u32 {
        (self.0 >> 40) as u32
    }

    /// Segment index within the owning context.
    pub const fn segment(self) -> u8 {
        (self.0 >> 32) as u8
    }

    /// Byte offset within the segment.
    pub const fn offset(self) -> u32 {
        self.0 as u32
    }
}

impl fmt::Display for BlockAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#014x}", self.0)
    }
}

impl From<u64> for BlockAddr {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn block_addr_parts_round_trip() {
        let addr = BlockAddr::new(7, 2, 4096);
        assert_eq!(addr.slot(), 7);
        assert_eq!(addr.segment(), 2);
        assert_eq!(addr.offset(), 4096);
    }

    #[test]
    fn block_addr_display_is_hex() {
        let addr = BlockAddr::new(1, 0, 16);
        assert_eq!(addr.to_string(), "0x010000000010");
    }

    #[test]
    fn context_ids_differ_by_generation() {
        let a = ContextId::new(3, 0);
        let b = ContextId::new(3, 1);
        assert_ne!(a, b);
        assert_eq!(a.slot(), b.slot());
        assert_eq!(b.to_string(), "ctx3.1");
    }

    proptest! {
        #[test]
        fn distinct_parts_give_distinct_addresses(
            s1 in 0u32..=BlockAddr::MAX_SLOT, g1 in any::<u8>(), o1 in any::<u32>(),
            s2 in 0u32..=BlockAddr::MAX_SLOT, g2 in any::<u8>(), o2 in any::<u32>(),
        ) {
            let a = BlockAddr::new(s1, g1, o1);
            let b = BlockAddr::new(s2, g2, o2);
            prop_assert_eq!(a == b, (s1, g1, o1) == (s2, g2, o2));
        }
    }
}
