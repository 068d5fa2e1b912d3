//! # CGC - Threaded Mark-Compact Relocation Engine
//!
//! CGC is the in-place compaction core of a generational managed-heap
//! runtime: given a heap that an external mark phase has already marked
//! for liveness, it computes new, denser addresses for every survivor of
//! the oldest generation and rewrites every reference in the heap and in
//! the root set - without allocating any address-translation table.
//!
//! ## Overview
//!
//! The engine makes three linear passes inside a whole-heap pause:
//!
//! 1. **Threading**: every root slot is chained onto the object it
//!    references, using the object's own header word as chain storage.
//! 2. **Forward update**: a scan of all blocks in address order threads
//!    every intra-heap reference; in the compacted generation a bump
//!    simulation assigns each live object its destination and resolves
//!    the chain built so far to that address.
//! 3. **Backward move**: a second scan over the compacted blocks
//!    resolves remaining chains, copies objects down, and returns empty
//!    trailing blocks to the pool.
//!
//! ```text
//!   header word          threaded chain
//!   ┌────────────┐       ┌──────────┐     ┌──────────┐
//!   │ descriptor │  ==>  │ slot B   │ --> │ slot A   │ --> descriptor
//!   └────────────┘       └──────────┘     └──────────┘     (+ tag of A)
//!    plain state          link state       head state
//! ```
//!
//! References carry small integer tags in their low bits; the tags ride
//! along through relocation. The same low bits discriminate the three
//! chain states while a header is threaded.
//!
//! ## Quick Start
//!
//! ```rust
//! use cgc::RootSet;
//!
//! fn main() -> Result<(), cgc::CgcError> {
//!     let mut collector = cgc::init()?;
//!
//!     // ... allocator fills blocks, mark phase sets mark bits ...
//!
//!     let generations = collector.heap().generation_count();
//!     let mut roots = RootSet::new(1, generations);
//!     let stats = collector.compact(&mut roots, 0, None, None);
//!     assert_eq!(stats.live_objects, 0);
//!     Ok(())
//! }
//! ```
//!
//! ## Collaborators
//!
//! Marking, block allocation policy, root enumeration and cycle
//! scheduling live outside this crate. The boundary types they populate:
//!
//! - [`heap::Heap`] / [`heap::Generation`]: block lists, already marked
//! - [`heap::BlockMeta`]: mark bitmap, free cursor, compaction flag
//! - [`RootSet`]: every reference holder outside the object graph
//! - [`object::ShapeDescriptor`]: per-kind layout, built by the runtime
//!
//! ## Safety
//!
//! The engine reads and writes raw heap words. The embedder guarantees
//! that the pause is total (no mutator runs during [`compact`]), that
//! mark bitmaps describe well-formed objects, and that descriptors
//! outlive the heap. Violations are detected where cheap and abort with
//! a diagnostic; they are never silently repaired.
//!
//! ## Modules
//!
//! - [`config`]: engine configuration and validation
//! - [`error`]: error types and consistency diagnostics
//! - [`gc`]: collector facade owning heap, config and logger
//! - [`heap`]: segment, blocks, bitmaps, generations
//! - [`logging`]: structured compaction event log
//! - [`memory`]: word-granular primitives
//! - [`object`]: tagged references, header words, shapes
//! - [`relocate`]: threading engine and the three passes
//! - [`stats`]: per-cycle statistics

pub mod config;
pub mod error;
pub mod gc;
pub mod heap;
pub mod logging;
pub mod memory;
pub mod object;
pub mod relocate;
pub mod stats;
pub mod util;

pub use config::GcConfig;
pub use error::{CgcError, Result};
pub use gc::CompactingCollector;
pub use relocate::{compact, Capability, RootSet, SchedulerRoots, StableTable, TaskTable};
pub use stats::CompactionStats;

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Create a collector with the default configuration.
///
/// The heap starts empty; the embedding runtime's allocator and mark
/// phase populate it before the first compaction.
pub fn init() -> Result<CompactingCollector> {
    CompactingCollector::new(GcConfig::default())
}

/// Create a collector with a custom configuration.
pub fn init_with_config(config: GcConfig) -> Result<CompactingCollector> {
    CompactingCollector::new(config)
}
