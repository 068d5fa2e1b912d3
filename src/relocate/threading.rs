//! Threading primitives
//!
//! The core trick: chain together all the slots pointing at a given
//! object, rooted in the object's own header word, with the original
//! descriptor parked at the far end of the chain. Threading a new slot
//! is one swap; unthreading walks the chain once, writing the object's
//! final address (tag reattached) into every slot it visits and putting
//! the descriptor back.
//!
//! The tag of the *first* threaded reference rides on the parked
//! descriptor and is the one every slot receives on unthreading.
//! References to one object normally all carry the same tag; when they
//! do not, the later tags are deliberately discarded.

use crate::heap::Segment;
use crate::memory::{read_word, write_word};
use crate::object::tagged::{tag_of, untag, CHAIN_HEAD, CHAIN_LINK, CHAIN_PLAIN, TAG_MASK};
use crate::object::{HeaderState, HeaderWord};
use crate::error::corruption;

/// Thread the reference held in `slot` onto its target's chain.
///
/// Targets outside the segment (static objects, immediates) and targets
/// in blocks that are not being compacted are left untouched.
///
/// # Safety
/// `slot` must be a valid word-aligned slot. If its value is a heap
/// reference, the target's header must be a descriptor or a chain built
/// by this engine.
pub unsafe fn thread(segment: &Segment, slot: *mut usize) {
    let refw = *slot;
    let target = untag(refw);

    let block = match segment.block_of(target) {
        Some(b) => b,
        None => return,
    };
    if !block.is_compacting() {
        return;
    }

    let header = target as *mut usize;
    match HeaderWord(*header).state() {
        HeaderState::Descriptor(descriptor) => {
            // First reference found: park the descriptor in the slot,
            // carrying this reference's tag for later reattachment.
            *slot = descriptor + tag_of(refw);
            *header = HeaderWord::chain_head(slot as usize).0;
        }
        HeaderState::ChainHead(_) | HeaderState::ChainLink(_) => {
            // Splice the slot onto the front of the chain.
            *slot = *header;
            *header = HeaderWord::chain_link(slot as usize).0;
        }
    }
}

/// Walk `object`'s chain without consuming it and return the parked
/// descriptor word: the descriptor address plus the tag of the first
/// threaded reference (tag 0 if nothing is threaded).
///
/// Needed to resolve an object's shape while its header is overwritten;
/// safe to call at any point during chain construction.
///
/// # Safety
/// `object` must be the untagged address of an object whose header is a
/// descriptor or a chain built by this engine.
pub unsafe fn threaded_descriptor(object: usize) -> usize {
    let mut q = read_word(object);
    loop {
        match q & TAG_MASK {
            CHAIN_PLAIN => return q,
            CHAIN_HEAD => return read_word(untag(q)),
            CHAIN_LINK => q = read_word(untag(q)),
            _ => corruption("chain walk hit an invalid discriminant", object, q),
        }
    }
}

/// Destructively unthread `object`'s chain.
///
/// Every slot on the chain receives `new_encoded` (the relocated address
/// with the original tag already attached); the header word receives the
/// untagged descriptor recovered from the chain terminus. A plain header
/// means nothing referenced the object and there is nothing to do.
///
/// # Safety
/// Same contract as [`threaded_descriptor`]; additionally every slot on
/// the chain must still be writable.
pub unsafe fn unthread(object: usize, new_encoded: usize) {
    let mut q = read_word(object);
    loop {
        match q & TAG_MASK {
            CHAIN_PLAIN => return,
            CHAIN_HEAD => {
                let slot = untag(q) as *mut usize;
                let parked = *slot;
                *slot = new_encoded;
                write_word(object, untag(parked));
                return;
            }
            CHAIN_LINK => {
                let slot = untag(q) as *mut usize;
                let next = *slot;
                *slot = new_encoded;
                q = next;
            }
            _ => corruption("unthread hit an invalid discriminant", object, q),
        }
    }
}
