//! Forward relocation pass
//!
//! Walks heap blocks in address order and threads every internal
//! reference of every object. The scan must cover the whole heap before
//! any assigned address leaks out: an object scanned later can still add
//! slots to the chain of one scanned earlier, and those late slots are
//! only resolved by the backward pass revisiting the object in the same
//! order.
//!
//! For the generation being compacted the scan interleaves a bump
//! simulation over its own block list: each live object gets the next
//! destination address, the spill flag is written where a copy would
//! cross a block boundary, and the chain built so far is resolved to the
//! just-assigned address on the spot.

use crate::error::corruption;
use crate::heap::block::{BlockId, BLOCK_BYTES};
use crate::heap::Segment;
use crate::memory::{read_word, WORD_BYTES};
use crate::object::tagged::{tag_of, untag};
use crate::object::{descriptor_at, HeaderState, HeaderWord, ObjectKind};
use crate::relocate::threading::{threaded_descriptor, unthread};
use crate::relocate::traverse::thread_object;
use crate::stats::CompactionStats;

/// Thread the internal references of every object in `blocks`.
///
/// These blocks are not being compacted, so object headers here are
/// always genuine descriptors; a chained header means the mark phase
/// flagged a block it should not have.
///
/// # Safety
/// Blocks must contain well-formed objects up to their free cursors.
pub(crate) unsafe fn forward_plain(segment: &Segment, blocks: &[BlockId]) {
    for &id in blocks {
        let block = segment.block(id);
        let mut p = block.start();
        let scan_end = block.free();
        while p < scan_end {
            let word = read_word(p);
            let desc = match HeaderWord(word).state() {
                HeaderState::Descriptor(d) => descriptor_at(d),
                _ => corruption("threaded header outside the compacted generation", p, word),
            };
            p = thread_object(segment, desc, p);
        }
    }
}

/// Thread the single large object at the start of each block.
///
/// Pinned blocks are skipped outright; they may not even hold an object
/// at their start. Only container-like kinds can be large.
///
/// # Safety
/// Each non-pinned block must start with a well-formed object.
pub(crate) unsafe fn forward_large(segment: &Segment, blocks: &[BlockId]) {
    for &id in blocks {
        let block = segment.block(id);
        if block.is_pinned() {
            continue;
        }
        let p = block.start();
        let word = read_word(p);
        let desc = match HeaderWord(word).state() {
            HeaderState::Descriptor(d) => descriptor_at(d),
            _ => corruption("threaded header in a large-object block", p, word),
        };
        match desc.kind {
            // nothing to follow
            ObjectKind::ByteArray => {}
            ObjectKind::ArrayPtrs
            | ObjectKind::ArrayPtrsDirty
            | ObjectKind::ArrayPtrsFrozen
            | ObjectKind::ArrayPtrsFrozenDirty
            | ObjectKind::SmallArrayPtrs
            | ObjectKind::SmallArrayPtrsDirty
            | ObjectKind::SmallArrayPtrsFrozen
            | ObjectKind::SmallArrayPtrsFrozenDirty
            | ObjectKind::Stack
            | ObjectKind::ApplyStack
            | ObjectKind::PartialApply
            | ObjectKind::TRecChunk => {
                thread_object(segment, desc, p);
            }
            _ => corruption(
                "unexpected kind in a large-object block",
                p,
                desc.kind.code(),
            ),
        }
    }
}

/// Compacting forward scan over the old blocks of one generation.
///
/// Two cursors run over the same block list: the scan cursor visits
/// every marked object; the destination cursor bump-allocates over the
/// list from its start. An object whose copy would cross the current
/// destination block's end gets its spill flag set and the destination
/// advances to the next block. The object's chain is resolved to the
/// assigned address immediately; references discovered later rebuild a
/// chain that the backward pass resolves.
///
/// # Safety
/// `blocks` must be the compacted generation's marked old blocks, with
/// mark bitmaps describing well-formed objects.
pub(crate) unsafe fn forward_compact(
    segment: &Segment,
    blocks: &[BlockId],
    stats: &mut CompactionStats,
) {
    debug_assert!(!blocks.is_empty());
    let mut dest_idx: usize = 0;
    let mut dest = segment.block(blocks[0]).start();

    for &id in blocks {
        let block = segment.block(id);
        debug_assert!(block.is_compacting());
        let mut p = block.start();
        let scan_end = block.free();

        while p < scan_end {
            while p < scan_end && !block.is_marked(p) {
                p += WORD_BYTES;
            }
            if p >= scan_end {
                break;
            }

            // The destination is needed to resolve this object's chain,
            // and the destination needs the size, so the shape has to be
            // pulled through the chain before traversal.
            let parked = threaded_descriptor(p);
            let desc = descriptor_at(untag(parked));

            let end = thread_object(segment, desc, p);
            let size = end - p;

            let dest_block_end = segment.block(blocks[dest_idx]).start() + BLOCK_BYTES;
            if dest + size > dest_block_end {
                // the copy will cross into the next block; record it so
                // the backward pass advances without re-walking chains
                block.set_spill(p);
                dest_idx += 1;
                dest = segment.block(blocks[dest_idx]).start();
            } else {
                debug_assert!(!block.is_spill(p));
            }

            unthread(p, dest + tag_of(parked));

            stats.live_objects += 1;
            stats.live_bytes += size;
            dest += size;
            p = end;
        }
    }
    log::trace!(
        "forward compact: {} objects, {} bytes live",
        stats.live_objects,
        stats.live_bytes
    );
}
