//! Heap Management Module
//!
//! The heap is a block pool (the segment) plus an ordered set of
//! generations that own blocks. The relocation engine treats the block
//! allocator and the mark phase as external collaborators: blocks arrive
//! already populated and already marked, and this module only provides
//! the structure the passes walk.

pub mod bitmap;
pub mod block;
pub mod generation;
pub mod segment;

pub use bitmap::MarkBitmap;
pub use block::{BlockId, BlockMeta, BLOCK_BYTES, BLOCK_WORDS};
pub use block::{FLAG_COMPACTING, FLAG_LARGE, FLAG_PINNED};
pub use generation::{Generation, WorkerLists};
pub use segment::Segment;

use crate::config::GcConfig;
use crate::error::Result;

/// The managed heap: segment plus generations
pub struct Heap {
    /// The block pool
    pub segment: Segment,

    /// Generations, youngest first
    pub generations: Vec<Generation>,
}

impl Heap {
    /// Create a heap according to `config`
    pub fn new(config: &GcConfig) -> Result<Heap> {
        let segment = Segment::new(config)?;
        let generations = (0..config.generations)
            .map(|i| Generation::new(i, config.mark_workers))
            .collect();
        Ok(Heap {
            segment,
            generations,
        })
    }

    /// Number of generations
    pub fn generation_count(&self) -> usize {
        self.generations.len()
    }

    /// The generation that gets compacted in place
    pub fn oldest_generation(&self) -> &Generation {
        self.generations.last().expect("heap has no generations")
    }

    /// Mutable access to the compacted generation
    pub fn oldest_generation_mut(&mut self) -> &mut Generation {
        self.generations
            .last_mut()
            .expect("heap has no generations")
    }
}
