//! Segment - the block pool behind the heap
//!
//! One contiguous anonymous mapping reserved up front and carved into
//! fixed-size blocks, in the reserve-first style of region-based
//! collectors. Because the mapping is contiguous and block-aligned, the
//! owning block of any heap address is a single shift away; that lookup
//! is what lets the threading engine decide in O(1) whether a reference
//! target is subject to relocation.

use memmap2::MmapMut;
use parking_lot::Mutex;

use crate::config::GcConfig;
use crate::error::{CgcError, Result};
use crate::heap::block::{BlockId, BlockMeta, BLOCK_BYTES};
use crate::util::alignment::{align_up, is_aligned};

/// The block pool
pub struct Segment {
    /// Backing mapping; kept alive for the lifetime of the segment
    map: MmapMut,

    /// First block-aligned address inside the mapping
    base: usize,

    /// Total usable size in bytes (multiple of the block size)
    size: usize,

    /// Per-block metadata, indexed by `BlockId`
    blocks: Vec<BlockMeta>,

    /// Ids of blocks not currently owned by any generation
    free_ids: Mutex<Vec<BlockId>>,
}

impl Segment {
    /// Reserve a segment according to `config`
    pub fn new(config: &GcConfig) -> Result<Segment> {
        config.validate()?;

        // Reserve one extra block so the usable range can be realigned to
        // a block boundary whatever the mapping's base turns out to be.
        let reserve = align_up(config.segment_size + BLOCK_BYTES, page_size::get());
        let mut map = memmap2::MmapOptions::new()
            .len(reserve)
            .map_anon()
            .map_err(|e| CgcError::HeapInit(format!("segment reservation failed: {}", e)))?;

        let raw_base = map.as_mut_ptr() as usize;
        let base = align_up(raw_base, BLOCK_BYTES);
        let size = config.segment_size;
        if base + size > raw_base + reserve {
            return Err(CgcError::HeapInit(
                "segment reservation too small after alignment".to_string(),
            ));
        }

        let block_count = size / BLOCK_BYTES;
        let blocks: Vec<BlockMeta> = (0..block_count)
            .map(|i| BlockMeta::new(base + i * BLOCK_BYTES))
            .collect();

        // Hand blocks out lowest-address first.
        let free_ids: Vec<BlockId> = (0..block_count).rev().collect();

        log::debug!(
            "segment reserved: {} blocks at {:#x}",
            block_count,
            base
        );

        Ok(Segment {
            map,
            base,
            size,
            blocks,
            free_ids: Mutex::new(free_ids),
        })
    }

    /// Base address of the usable range
    pub fn base(&self) -> usize {
        self.base
    }

    /// Usable size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Bytes reserved from the operating system
    pub fn reserved_bytes(&self) -> usize {
        self.map.len()
    }

    /// Total number of blocks in the pool
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Whether `addr` lies inside the segment
    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.base && addr < self.base + self.size
    }

    /// Metadata of block `id`
    #[inline]
    pub fn block(&self, id: BlockId) -> &BlockMeta {
        &self.blocks[id]
    }

    /// Id of the block owning `addr`, if the address is heap-managed
    #[inline]
    pub fn block_index(&self, addr: usize) -> Option<BlockId> {
        if self.contains(addr) {
            Some((addr - self.base) / BLOCK_BYTES)
        } else {
            None
        }
    }

    /// Metadata of the block owning `addr`, if the address is heap-managed
    #[inline]
    pub fn block_of(&self, addr: usize) -> Option<&BlockMeta> {
        self.block_index(addr).map(|id| &self.blocks[id])
    }

    /// Take one block from the free list
    pub fn alloc_block(&self) -> Result<BlockId> {
        let mut free = self.free_ids.lock();
        match free.pop() {
            Some(id) => {
                self.blocks[id].reset();
                Ok(id)
            }
            None => Err(CgcError::OutOfBlocks {
                requested: 1,
                available: 0,
            }),
        }
    }

    /// Return a chain of blocks to the free list
    pub fn release_blocks(&self, ids: &[BlockId]) {
        if ids.is_empty() {
            return;
        }
        let mut free = self.free_ids.lock();
        for &id in ids {
            debug_assert!(is_aligned(self.blocks[id].start(), BLOCK_BYTES));
            self.blocks[id].reset();
            free.push(id);
        }
        log::trace!("released {} blocks", ids.len());
    }

    /// Number of blocks currently on the free list
    pub fn free_block_count(&self) -> usize {
        self.free_ids.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> GcConfig {
        GcConfig {
            segment_size: 8 * BLOCK_BYTES,
            ..Default::default()
        }
    }

    #[test]
    fn test_segment_layout() {
        let seg = Segment::new(&small_config()).unwrap();
        assert_eq!(seg.block_count(), 8);
        assert!(is_aligned(seg.base(), BLOCK_BYTES));
        assert!(seg.reserved_bytes() >= seg.size());
    }

    #[test]
    fn test_block_lookup() {
        let seg = Segment::new(&small_config()).unwrap();
        let id = seg.alloc_block().unwrap();
        let start = seg.block(id).start();
        assert_eq!(seg.block_index(start), Some(id));
        assert_eq!(seg.block_index(start + BLOCK_BYTES - 8), Some(id));
        assert_eq!(seg.block_index(seg.base() + seg.size()), None);
        assert_eq!(seg.block_index(0), None);
    }

    #[test]
    fn test_alloc_release_cycle() {
        let seg = Segment::new(&small_config()).unwrap();
        assert_eq!(seg.free_block_count(), 8);
        let a = seg.alloc_block().unwrap();
        let b = seg.alloc_block().unwrap();
        assert_ne!(a, b);
        assert_eq!(seg.free_block_count(), 6);
        seg.release_blocks(&[a, b]);
        assert_eq!(seg.free_block_count(), 8);
    }

    #[test]
    fn test_exhaustion() {
        let seg = Segment::new(&small_config()).unwrap();
        for _ in 0..8 {
            seg.alloc_block().unwrap();
        }
        let err = seg.alloc_block().unwrap_err();
        assert!(matches!(err, CgcError::OutOfBlocks { .. }));
    }

    #[test]
    fn test_blocks_are_writable() {
        let seg = Segment::new(&small_config()).unwrap();
        let id = seg.alloc_block().unwrap();
        let start = seg.block(id).start();
        unsafe {
            crate::memory::write_word(start, 0xabcdef);
            assert_eq!(crate::memory::read_word(start), 0xabcdef);
        }
    }
}
