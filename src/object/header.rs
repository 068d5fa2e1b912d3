//! Object header word
//!
//! Every heap object starts with a single header word. Outside a
//! compaction cycle it holds the address of the object's shape
//! descriptor. During threading the same word is destructively reused as
//! the root of a linked chain running through every slot that references
//! the object; the three states are an explicit sum type here rather
//! than bare pointer arithmetic, with the encoding unchanged (one word,
//! no side storage).

use crate::error::corruption;
use crate::object::tagged::{tag_of, untag, CHAIN_HEAD, CHAIN_LINK, CHAIN_PLAIN};

/// Decoded state of a header word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderState {
    /// Genuine descriptor address; no references threaded yet
    Descriptor(usize),
    /// Address of the single slot that first referenced this object
    ChainHead(usize),
    /// Address of a later referencing slot
    ChainLink(usize),
}

/// A raw header word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderWord(pub usize);

impl HeaderWord {
    /// Encode a plain descriptor header
    #[inline]
    pub fn descriptor(addr: usize) -> HeaderWord {
        debug_assert!(tag_of(addr) == 0, "descriptor address must be untagged");
        HeaderWord(addr)
    }

    /// Encode a chain-head header pointing at `slot`
    #[inline]
    pub fn chain_head(slot: usize) -> HeaderWord {
        debug_assert!(tag_of(slot) == 0);
        HeaderWord(slot | CHAIN_HEAD)
    }

    /// Encode a chain-link header pointing at `slot`
    #[inline]
    pub fn chain_link(slot: usize) -> HeaderWord {
        debug_assert!(tag_of(slot) == 0);
        HeaderWord(slot | CHAIN_LINK)
    }

    /// Decode the word. A discriminant outside the three chain states is
    /// heap corruption and fatal.
    #[inline]
    pub fn state(self) -> HeaderState {
        match tag_of(self.0) {
            CHAIN_PLAIN => HeaderState::Descriptor(self.0),
            CHAIN_HEAD => HeaderState::ChainHead(untag(self.0)),
            CHAIN_LINK => HeaderState::ChainLink(untag(self.0)),
            _ => corruption("header word with invalid chain discriminant", 0, self.0),
        }
    }

    /// Whether the header is an unthreaded descriptor
    #[inline]
    pub fn is_plain(self) -> bool {
        tag_of(self.0) == CHAIN_PLAIN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_roundtrip() {
        let h = HeaderWord::descriptor(0x7f00);
        assert!(h.is_plain());
        assert_eq!(h.state(), HeaderState::Descriptor(0x7f00));
    }

    #[test]
    fn test_chain_head_roundtrip() {
        let h = HeaderWord::chain_head(0x12340);
        assert!(!h.is_plain());
        assert_eq!(h.state(), HeaderState::ChainHead(0x12340));
    }

    #[test]
    fn test_chain_link_roundtrip() {
        let h = HeaderWord::chain_link(0x43210);
        assert_eq!(h.state(), HeaderState::ChainLink(0x43210));
    }

    #[test]
    #[should_panic(expected = "invalid chain discriminant")]
    fn test_invalid_discriminant_is_fatal() {
        HeaderWord(0x1000 | 3).state();
    }
}
