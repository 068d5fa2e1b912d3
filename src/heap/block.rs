//! Block metadata - the unit of heap management
//!
//! The heap is carved into fixed-size blocks. A block never moves; only
//! its contents do. Each block carries a free cursor marking the end of
//! live data, a flag byte, and the mark/spill bitmap consumed by the
//! relocation passes. Ordering of blocks within a generation lives in
//! the generation's block list, not here.
//!
//! # Memory Ordering
//!
//! Cursor and flag accesses use `Ordering::Relaxed`: blocks are only
//! mutated inside the whole-heap pause (or by the single allocator thread
//! that owns them), so the pause is the synchronization point and no
//! cross-thread ordering is required from these fields themselves.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use crate::heap::bitmap::MarkBitmap;
use crate::memory::WORD_BYTES;

/// Size of a heap block in bytes
pub const BLOCK_BYTES: usize = 4096;

/// Size of a heap block in words
pub const BLOCK_WORDS: usize = BLOCK_BYTES / WORD_BYTES;

/// Index of a block within the segment's block table
pub type BlockId = usize;

/// Block contains live-marked objects and is being compacted
pub const FLAG_COMPACTING: u8 = 1 << 0;
/// Block holds a single large object
pub const FLAG_LARGE: u8 = 1 << 1;
/// Block is pinned; its contents must not be touched or moved
pub const FLAG_PINNED: u8 = 1 << 2;

/// Per-block metadata
pub struct BlockMeta {
    /// First byte of the block's storage
    start: usize,

    /// End of live data within the block
    free: AtomicUsize,

    /// Flag byte (`FLAG_*`)
    flags: AtomicU8,

    /// Mark/spill bitmap, 1 bit per word
    bitmap: MarkBitmap,
}

impl BlockMeta {
    pub(crate) fn new(start: usize) -> Self {
        Self {
            start,
            free: AtomicUsize::new(start),
            flags: AtomicU8::new(0),
            bitmap: MarkBitmap::new(start, BLOCK_BYTES),
        }
    }

    /// First byte of the block
    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    /// One past the last byte of the block
    #[inline]
    pub fn end(&self) -> usize {
        self.start + BLOCK_BYTES
    }

    /// End of live data within the block
    #[inline]
    pub fn free(&self) -> usize {
        self.free.load(Ordering::Relaxed)
    }

    /// Move the free cursor
    #[inline]
    pub fn set_free(&self, addr: usize) {
        debug_assert!(addr >= self.start && addr <= self.end());
        self.free.store(addr, Ordering::Relaxed);
    }

    /// Bytes of live data in the block
    #[inline]
    pub fn used_bytes(&self) -> usize {
        self.free() - self.start
    }

    // === Flags ===

    #[inline]
    pub fn set_flag(&self, flag: u8) {
        self.flags.fetch_or(flag, Ordering::Relaxed);
    }

    #[inline]
    pub fn clear_flag(&self, flag: u8) {
        self.flags.fetch_and(!flag, Ordering::Relaxed);
    }

    #[inline]
    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags.load(Ordering::Relaxed) & flag != 0
    }

    /// Whether the block's contents are being compacted this cycle
    #[inline]
    pub fn is_compacting(&self) -> bool {
        self.has_flag(FLAG_COMPACTING)
    }

    #[inline]
    pub fn is_large(&self) -> bool {
        self.has_flag(FLAG_LARGE)
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.has_flag(FLAG_PINNED)
    }

    // === Mark / spill flags ===

    /// Liveness flag for the object starting at `addr`
    #[inline]
    pub fn is_marked(&self, addr: usize) -> bool {
        self.bitmap.is_set(addr)
    }

    /// Record the object starting at `addr` as live
    #[inline]
    pub fn mark(&self, addr: usize) {
        self.bitmap.set(addr);
    }

    /// Record that the relocated copy of the object at `addr` crosses
    /// into the next block.
    ///
    /// Stored as the mark bit of the object's second word; objects are
    /// at least two words, so the bit cannot belong to another object.
    #[inline]
    pub fn set_spill(&self, addr: usize) {
        debug_assert!(addr + WORD_BYTES < self.end());
        self.bitmap.set(addr + WORD_BYTES);
    }

    /// Spill flag for the object starting at `addr`
    #[inline]
    pub fn is_spill(&self, addr: usize) -> bool {
        self.bitmap.is_set(addr + WORD_BYTES)
    }

    /// Direct access to the bitmap (mark-phase interface)
    pub fn bitmap(&self) -> &MarkBitmap {
        &self.bitmap
    }

    /// Reset the block for reuse: clear flags and bitmap, rewind the cursor
    pub(crate) fn reset(&self) {
        self.flags.store(0, Ordering::Relaxed);
        self.free.store(self.start, Ordering::Relaxed);
        self.bitmap.clear();
    }
}
