//! Compaction correctness tests
//!
//! These tests verify the engine's core guarantees:
//! - Threading round-trips: every threaded slot ends up holding the new
//!   address with its tag, and the header is restored
//! - Tags survive relocation; conflicting tags collapse to the first
//! - A full cycle leaves no dangling reference and no stale block
//! - Bytes assigned forward equal bytes accounted backward

mod common;

use common::*;

use cgc::heap::BLOCK_WORDS;
use cgc::memory::WORD_BYTES;
use cgc::object::tagged::{tag_of, untag, with_tag};
use cgc::relocate::threading::{thread, threaded_descriptor, unthread};
use cgc::relocate::{compact, RootSet};

/// Thread N root slots at one object, then unthread: every slot must
/// hold the new encoding, the header must be the descriptor again.
///
/// **Bug this finds:** chain splicing or terminus handling errors
#[test]
fn test_threading_round_trip() {
    let mut fx = HeapFixture::new(4);
    let b = fx.add_old_block();
    let desc = record_desc(0, 1);
    let obj = emit_record(fx.seg(), b, desc, &[], &[7]);

    let mut slots = [with_tag(obj, 2), with_tag(obj, 2), with_tag(obj, 2)];
    unsafe {
        for slot in slots.iter_mut() {
            thread(fx.seg(), slot as *mut usize);
        }

        let parked = threaded_descriptor(obj);
        assert_eq!(untag(parked), desc.address());
        assert_eq!(tag_of(parked), 2);

        let new_addr = fx.seg().base() + 64 * WORD_BYTES;
        unthread(obj, with_tag(new_addr, tag_of(parked)));

        for slot in slots.iter() {
            assert_eq!(*slot, with_tag(new_addr, 2));
        }
        assert_eq!(peek(obj, 0), desc.address());
    }
}

/// References with different tags to one object: the first-threaded
/// reference's tag wins for every slot. Documented discard semantics.
#[test]
fn test_conflicting_tags_collapse_to_first() {
    let mut fx = HeapFixture::new(4);
    let b = fx.add_old_block();
    let desc = record_desc(0, 1);
    let obj = emit_record(fx.seg(), b, desc, &[], &[0]);

    let mut first = with_tag(obj, 5);
    let mut second = with_tag(obj, 3);
    unsafe {
        thread(fx.seg(), &mut first as *mut usize);
        thread(fx.seg(), &mut second as *mut usize);

        let parked = threaded_descriptor(obj);
        assert_eq!(tag_of(parked), 5);

        let new_addr = fx.seg().base();
        unthread(obj, with_tag(new_addr, tag_of(parked)));
    }
    assert_eq!(first, with_tag(fx.seg().base(), 5));
    // the second reference's own tag is gone
    assert_eq!(second, with_tag(fx.seg().base(), 5));
}

/// The chain can be inspected without being consumed, at any point
/// during construction.
#[test]
fn test_threaded_descriptor_is_non_destructive() {
    let mut fx = HeapFixture::new(4);
    let b = fx.add_old_block();
    let desc = record_desc(0, 1);
    let obj = emit_record(fx.seg(), b, desc, &[], &[0]);

    let mut s1 = with_tag(obj, 1);
    let mut s2 = with_tag(obj, 1);
    unsafe {
        assert_eq!(threaded_descriptor(obj), desc.address());

        thread(fx.seg(), &mut s1 as *mut usize);
        assert_eq!(untag(threaded_descriptor(obj)), desc.address());

        thread(fx.seg(), &mut s2 as *mut usize);
        // two reads in a row: the walk must not consume anything
        assert_eq!(untag(threaded_descriptor(obj)), desc.address());
        assert_eq!(untag(threaded_descriptor(obj)), desc.address());

        // and the chain still unthreads completely
        unthread(obj, with_tag(fx.seg().base(), 1));
    }
    assert_eq!(s1, with_tag(fx.seg().base(), 1));
    assert_eq!(s2, with_tag(fx.seg().base(), 1));
}

/// Targets outside the compacted block set are left untouched.
#[test]
fn test_non_compacting_targets_untouched() {
    let mut fx = HeapFixture::new(4);
    let nursery = fx.add_plain_block(0);
    let desc = record_desc(0, 1);
    let obj = emit_record(fx.seg(), nursery, desc, &[], &[0]);

    let mut heap_slot = with_tag(obj, 2);
    let mut null_slot = 0usize;
    let outside = Box::leak(Box::new([desc.address(), 0usize]));
    let mut static_slot = outside.as_ptr() as usize;
    let static_before = static_slot;

    unsafe {
        thread(fx.seg(), &mut heap_slot as *mut usize);
        thread(fx.seg(), &mut null_slot as *mut usize);
        thread(fx.seg(), &mut static_slot as *mut usize);
    }

    assert_eq!(heap_slot, with_tag(obj, 2));
    assert_eq!(peek(obj, 0), desc.address());
    assert_eq!(null_slot, 0);
    assert_eq!(static_slot, static_before);
}

/// Full cycle over one block with garbage at the front: survivors slide
/// down, the root and the inter-object reference follow, raw payload
/// words ride along unchanged.
#[test]
fn test_full_cycle_compacts_single_block() {
    let mut fx = HeapFixture::new(4);
    let b = fx.add_old_block();

    let dead_desc = record_desc(0, 2);
    let a_desc = record_desc(1, 1);
    let b_desc = record_desc(0, 1);

    let _dead = emit_record(fx.seg(), b, dead_desc, &[], &[1, 2]);
    let obj_b_addr_placeholder = 0usize;
    let a = emit_record(fx.seg(), b, a_desc, &[obj_b_addr_placeholder], &[0xA1]);
    let bb = emit_record(fx.seg(), b, b_desc, &[], &[0xB0B]);

    // patch A's reference now that B exists
    unsafe {
        cgc::memory::write_word(at(a, 1), with_tag(bb, 4));
    }

    fx.mark(a);
    fx.mark(bb);

    let mut roots = RootSet::new(1, 2);
    roots.capabilities[0].saved_refs.push(with_tag(a, 1));

    let stats = compact(&mut fx.heap, &mut roots, 0, None, None);

    let block_start = fx.block(b).start();
    let a_new = block_start;
    let b_new = at(block_start, 3);

    assert_eq!(roots.capabilities[0].saved_refs[0], with_tag(a_new, 1));
    assert_eq!(peek(a_new, 0), a_desc.address());
    assert_eq!(peek(a_new, 1), with_tag(b_new, 4));
    assert_eq!(peek(a_new, 2), 0xA1);
    assert_eq!(peek(b_new, 0), b_desc.address());
    assert_eq!(peek(b_new, 1), 0xB0B);

    assert_eq!(stats.live_objects, 2);
    assert_eq!(stats.live_bytes, 5 * WORD_BYTES);
    assert_eq!(stats.moved_bytes, stats.live_bytes);
    assert_eq!(stats.blocks_after, 1);
    assert_eq!(fx.block(b).free(), at(block_start, 5));
}

/// A lone survivor in the last of three blocks migrates to the first;
/// the two emptied trailing blocks go back to the pool.
#[test]
fn test_trailing_blocks_reclaimed() {
    let mut fx = HeapFixture::new(6);
    let b0 = fx.add_old_block();
    let b1 = fx.add_old_block();
    let b2 = fx.add_old_block();

    // blocks 0 and 1 hold only garbage
    let junk = record_desc(0, 3);
    emit_record(fx.seg(), b0, junk, &[], &[9, 9, 9]);
    emit_record(fx.seg(), b1, junk, &[], &[9, 9, 9]);

    let desc = record_desc(0, 1);
    let survivor = emit_record(fx.seg(), b2, desc, &[], &[0x51]);
    fx.mark(survivor);

    let mut roots = RootSet::new(1, 2);
    roots.capabilities[0].saved_refs.push(with_tag(survivor, 0));

    let free_before = fx.seg().free_block_count();
    let stats = compact(&mut fx.heap, &mut roots, 0, None, None);

    let new_addr = fx.block(b0).start();
    assert_eq!(roots.capabilities[0].saved_refs[0], new_addr);
    assert_eq!(peek(new_addr, 1), 0x51);

    assert_eq!(stats.blocks_before, 3);
    assert_eq!(stats.blocks_after, 1);
    assert_eq!(stats.blocks_released, 2);
    assert_eq!(fx.heap.oldest_generation().old_blocks.len(), 1);
    assert_eq!(fx.heap.oldest_generation().live_blocks, 1);
    assert_eq!(fx.seg().free_block_count(), free_before + 2);

    // no live data beyond the free cursor
    assert!(fx.block(b0).free() >= new_addr + 2 * WORD_BYTES);
}

/// Reference cycles resolve: every edge of a cycle ends up pointing at
/// a relocated header, none at stale storage.
#[test]
fn test_cycle_references_resolve() {
    let mut fx = HeapFixture::new(4);
    let b = fx.add_old_block();

    let dead = record_desc(0, 2);
    emit_record(fx.seg(), b, dead, &[], &[0, 0]);

    let desc = record_desc(1, 0);
    let a = emit_record(fx.seg(), b, desc, &[0], &[]);
    let c = emit_record(fx.seg(), b, desc, &[0], &[]);
    unsafe {
        cgc::memory::write_word(at(a, 1), with_tag(c, 2));
        cgc::memory::write_word(at(c, 1), with_tag(a, 2));
    }
    fx.mark(a);
    fx.mark(c);

    let mut roots = RootSet::new(1, 2);
    roots.capabilities[0].saved_refs.push(with_tag(a, 2));

    compact(&mut fx.heap, &mut roots, 0, None, None);

    let a_new = fx.block(b).start();
    let c_new = at(a_new, 2);
    assert_eq!(roots.capabilities[0].saved_refs[0], with_tag(a_new, 2));
    assert_eq!(peek(a_new, 1), with_tag(c_new, 2));
    assert_eq!(peek(c_new, 1), with_tag(a_new, 2));
    assert_eq!(peek(a_new, 0), desc.address());
    assert_eq!(peek(c_new, 0), desc.address());
}

/// Objects already in place are not copied, only accounted.
#[test]
fn test_no_copy_when_already_compact() {
    let mut fx = HeapFixture::new(4);
    let b = fx.add_old_block();
    let desc = record_desc(0, 1);
    let first = emit_record(fx.seg(), b, desc, &[], &[0x11]);
    let second = emit_record(fx.seg(), b, desc, &[], &[0x22]);
    fx.mark(first);
    fx.mark(second);

    let mut roots = RootSet::new(1, 2);
    roots.capabilities[0].saved_refs.push(first);
    roots.capabilities[0].saved_refs.push(second);

    let stats = compact(&mut fx.heap, &mut roots, 0, None, None);

    assert_eq!(stats.copied_bytes, 0);
    assert_eq!(stats.live_bytes, 4 * WORD_BYTES);
    assert_eq!(roots.capabilities[0].saved_refs[0], first);
    assert_eq!(roots.capabilities[0].saved_refs[1], second);
}

/// Forward accounting equals backward accounting over a mixed heap.
#[test]
fn test_size_conservation_across_passes() {
    let mut fx = HeapFixture::new(6);
    let b0 = fx.add_old_block();
    let _b1 = fx.add_old_block();

    let dead = record_desc(0, 4);
    emit_record(fx.seg(), b0, dead, &[], &[0, 0, 0, 0]);

    let r = record_desc(1, 2);
    let filler = emit_byte_array(fx.seg(), b0, 32);
    let x = emit_record(fx.seg(), b0, r, &[0], &[1, 2]);
    let y = emit_record(fx.seg(), b0, r, &[0], &[3, 4]);
    unsafe {
        cgc::memory::write_word(at(x, 1), y);
        cgc::memory::write_word(at(y, 1), filler);
    }
    fx.mark(filler);
    fx.mark(x);
    fx.mark(y);

    let mut roots = RootSet::new(1, 2);
    roots.capabilities[0].saved_refs.push(x);

    let stats = compact(&mut fx.heap, &mut roots, 0, None, None);

    let expected = (34 + 4 + 4) * WORD_BYTES;
    assert_eq!(stats.live_bytes, expected);
    assert_eq!(stats.moved_bytes, expected);
    assert!(stats.copied_bytes <= stats.moved_bytes);
    assert_eq!(stats.live_objects, 3);
}

/// An object bigger than the remaining space of its destination block
/// carries the spill flag and lands at the start of the next block.
#[test]
fn test_spill_assigns_next_block_start() {
    let mut fx = HeapFixture::new(6);
    let b0 = fx.add_old_block();
    let b1 = fx.add_old_block();

    // Block 0: garbage then a survivor nearly filling it.
    let dead = record_desc(0, 8);
    emit_record(fx.seg(), b0, dead, &[], &[0; 8]);
    let filler = emit_byte_array(fx.seg(), b0, BLOCK_WORDS - 9 - 2);
    fx.mark(filler);

    // Block 1: one survivor that cannot fit behind the filler.
    let desc = record_desc(0, 15);
    let wide = emit_record(fx.seg(), b1, desc, &[], &[7; 15]);
    fx.mark(wide);

    let mut roots = RootSet::new(1, 2);
    roots.capabilities[0].saved_refs.push(wide);

    let stats = compact(&mut fx.heap, &mut roots, 0, None, None);

    // filler compacts to the front of block 0; the wide record spills
    let wide_new = fx.block(b1).start();
    assert_eq!(roots.capabilities[0].saved_refs[0], wide_new);
    assert_eq!(peek(wide_new, 15), 7);
    assert_eq!(stats.blocks_after, 2);
    assert_eq!(
        fx.block(b0).free(),
        at(fx.block(b0).start(), BLOCK_WORDS - 9)
    );
    assert_eq!(fx.block(b1).free(), at(wide_new, 16));
}
