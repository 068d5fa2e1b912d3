//! Backward compaction pass
//!
//! Re-walks the compacted generation's blocks in the same order as the
//! forward pass, re-deriving each live object's destination from the
//! same bump simulation. For every marked object it resolves whatever
//! chain accumulated since the forward visit (the object's header among
//! the rewritten slots), then copies the bytes down. The destination
//! stream never overtakes the scan stream, so an ascending word copy is
//! safe.
//!
//! Afterwards the block free cursors describe the compacted image and
//! the now-empty trailing blocks go back to the segment.

use crate::heap::block::BlockId;
use crate::heap::{Generation, Segment};
use crate::memory::{copy_words, read_word, word_at, write_word, WORD_BYTES};
use crate::object::shape::STACK_SP_WORD;
use crate::object::tagged::{tag_of, untag};
use crate::object::{descriptor_at, ObjectKind};
use crate::relocate::threading::{threaded_descriptor, unthread};
use crate::relocate::traverse::object_size;
use crate::stats::CompactionStats;

/// Move every live object of `gen` to its assigned address, update the
/// block free cursors, release empty trailing blocks, and return the
/// number of blocks still live.
///
/// # Safety
/// The forward pass must have completed over the same block list in the
/// same order during this cycle.
pub(crate) unsafe fn backward_compact(
    segment: &Segment,
    gen: &mut Generation,
    stats: &mut CompactionStats,
) -> usize {
    if gen.old_blocks.is_empty() {
        return 0;
    }

    let blocks: Vec<BlockId> = gen.old_blocks.clone();
    let mut dest_idx: usize = 0;
    let mut dest = segment.block(blocks[0]).start();
    let mut live_blocks: usize = 1;

    for &id in &blocks {
        let block = segment.block(id);
        let mut p = block.start();
        let scan_end = block.free();

        while p < scan_end {
            while p < scan_end && !block.is_marked(p) {
                p += WORD_BYTES;
            }
            if p >= scan_end {
                break;
            }

            if block.is_spill(p) {
                // forward pass recorded the boundary crossing here
                segment.block(blocks[dest_idx]).set_free(dest);
                dest_idx += 1;
                dest = segment.block(blocks[dest_idx]).start();
                live_blocks += 1;
            }

            let parked = threaded_descriptor(p);
            unthread(p, dest + tag_of(parked));
            let desc = descriptor_at(untag(parked));
            let size = object_size(desc, p);

            if dest != p {
                copy_words(p, dest, size);
                stats.copied_bytes += size;
                if desc.kind == ObjectKind::Stack {
                    relocate_stack(p, dest);
                }
            }

            stats.moved_bytes += size;
            dest += size;
            p += size;
        }
    }

    // final free cursor, then give back everything past it
    segment.block(blocks[dest_idx]).set_free(dest);
    let released = gen.old_blocks.split_off(dest_idx + 1);
    if !released.is_empty() {
        segment.release_blocks(&released);
        stats.blocks_released += released.len();
    }

    live_blocks
}

/// A moved stack still holds an absolute pointer into its own stack
/// area; shift it by the same delta as the object.
unsafe fn relocate_stack(old: usize, new: usize) {
    let sp_slot = word_at(new, STACK_SP_WORD);
    let sp = read_word(sp_slot);
    let delta = new.wrapping_sub(old);
    write_word(sp_slot, sp.wrapping_add(delta));
}
