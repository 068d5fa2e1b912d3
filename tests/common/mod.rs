//! Test utilities for the compaction test suite
//!
//! The integration tests play the roles of the engine's external
//! collaborators: they allocate blocks, lay out objects word by word,
//! set mark bits the way the mark phase would, and hand the engine a
//! root set. The helpers here keep that scaffolding in one place.

#![allow(dead_code)]

use cgc::config::GcConfig;
use cgc::heap::{BlockId, BlockMeta, Heap, Segment, BLOCK_BYTES, FLAG_COMPACTING, FLAG_LARGE, FLAG_PINNED};
use cgc::memory::{read_word, word_at, write_word, WORD_BYTES};
use cgc::object::shape::*;
use cgc::object::RefMap;

/// Heap plus the bookkeeping a test needs to play allocator and marker
pub struct HeapFixture {
    pub heap: Heap,
}

impl HeapFixture {
    /// A heap whose segment holds exactly `blocks` blocks
    pub fn new(blocks: usize) -> Self {
        let config = GcConfig {
            segment_size: blocks * BLOCK_BYTES,
            generations: 2,
            mark_workers: 1,
            verbose: false,
            stats_enabled: true,
        };
        let heap = Heap::new(&config).expect("test heap");
        HeapFixture { heap }
    }

    pub fn seg(&self) -> &Segment {
        &self.heap.segment
    }

    pub fn block(&self, id: BlockId) -> &BlockMeta {
        self.heap.segment.block(id)
    }

    /// Allocate a block into the oldest generation's compacted list
    pub fn add_old_block(&mut self) -> BlockId {
        let id = self.heap.segment.alloc_block().expect("block");
        self.heap.segment.block(id).set_flag(FLAG_COMPACTING);
        self.heap.oldest_generation_mut().old_blocks.push(id);
        id
    }

    /// Allocate a to-space block into generation `gen_index`
    pub fn add_plain_block(&mut self, gen_index: usize) -> BlockId {
        let id = self.heap.segment.alloc_block().expect("block");
        self.heap.generations[gen_index].blocks.push(id);
        id
    }

    /// Allocate a block onto a worker's todo list of generation `gen_index`
    pub fn add_worker_todo_block(&mut self, gen_index: usize) -> BlockId {
        let id = self.heap.segment.alloc_block().expect("block");
        self.heap.generations[gen_index].workers[0].todo.push(id);
        id
    }

    /// Allocate a large-object block into the oldest generation
    pub fn add_large_block(&mut self, pinned: bool) -> BlockId {
        let id = self.heap.segment.alloc_block().expect("block");
        let meta = self.heap.segment.block(id);
        meta.set_flag(FLAG_LARGE);
        if pinned {
            meta.set_flag(FLAG_PINNED);
        }
        self.heap
            .oldest_generation_mut()
            .large_objects
            .push(id);
        id
    }

    /// Mark the object at `addr` live
    pub fn mark(&self, addr: usize) {
        self.heap
            .segment
            .block_of(addr)
            .expect("marked address outside segment")
            .mark(addr);
    }
}

/// Append `words` to `block` and return the address of the first word
pub fn emit(seg: &Segment, block: BlockId, words: &[usize]) -> usize {
    let meta = seg.block(block);
    let addr = meta.free();
    assert!(
        addr + words.len() * WORD_BYTES <= meta.end(),
        "object does not fit in block"
    );
    unsafe {
        for (i, &w) in words.iter().enumerate() {
            write_word(word_at(addr, i), w);
        }
    }
    meta.set_free(addr + words.len() * WORD_BYTES);
    addr
}

/// Emit a fixed-layout record: header, reference fields, raw words
pub fn emit_record(
    seg: &Segment,
    block: BlockId,
    desc: &'static ShapeDescriptor,
    refs: &[usize],
    raws: &[usize],
) -> usize {
    let mut words = vec![desc.address()];
    words.extend_from_slice(refs);
    words.extend_from_slice(raws);
    emit(seg, block, &words)
}

/// Emit a byte array spanning `data_words` payload words, filled with a
/// recognizable pattern
pub fn emit_byte_array(seg: &Segment, block: BlockId, data_words: usize) -> usize {
    let mut words = vec![BYTE_ARRAY_SHAPE.address(), data_words * WORD_BYTES];
    words.extend(std::iter::repeat(0xAA).take(data_words));
    emit(seg, block, &words)
}

/// Leak a fixed-layout record descriptor
pub fn record_desc(ptrs: u16, nptrs: u16) -> &'static ShapeDescriptor {
    Box::leak(Box::new(ShapeDescriptor::record(ptrs, nptrs)))
}

/// Leak a callable descriptor with a standard calling pattern
pub fn function_desc(ptrs: u16, nptrs: u16, pattern: CallPattern) -> &'static ShapeDescriptor {
    Box::leak(Box::new(ShapeDescriptor::function(
        ptrs,
        nptrs,
        ArgShape::Pattern(pattern),
    )))
}

/// Leak an arbitrary descriptor
pub fn leak_desc(desc: ShapeDescriptor) -> &'static ShapeDescriptor {
    Box::leak(Box::new(desc))
}

/// Leak a small-map return-frame descriptor
pub fn return_frame_desc(map: RefMap) -> &'static FrameDescriptor {
    Box::leak(Box::new(FrameDescriptor::small(FrameKind::Return, map)))
}

/// Read the word at `addr + index * WORD_BYTES`
pub fn peek(addr: usize, index: usize) -> usize {
    unsafe { read_word(word_at(addr, index)) }
}

/// Address `words` words past `addr`
pub fn at(addr: usize, words: usize) -> usize {
    addr + words * WORD_BYTES
}
