//! Collector facade
//!
//! Thin ownership wrapper tying a heap, a configuration and a logger
//! together. The surrounding runtime decides *when* to compact; this
//! type just makes a cycle one call and keeps the bookkeeping (cycle
//! numbers, event log) in one place.

use crate::config::GcConfig;
use crate::error::Result;
use crate::heap::Heap;
use crate::logging::{GcEvent, GcLogger, GcLoggerConfig, LogLevel};
use crate::relocate::{compact, RootSet};
use crate::stats::CompactionStats;

/// A compacting collector bound to one heap
pub struct CompactingCollector {
    heap: Heap,
    config: GcConfig,
    logger: GcLogger,
    cycles: u64,
}

impl CompactingCollector {
    /// Create a collector with a freshly reserved heap
    pub fn new(config: GcConfig) -> Result<CompactingCollector> {
        config.validate()?;
        let heap = Heap::new(&config)?;
        let logger = GcLogger::new(GcLoggerConfig {
            level: if config.verbose {
                LogLevel::Debug
            } else {
                LogLevel::Info
            },
            console: config.verbose,
            ..Default::default()
        });
        Ok(CompactingCollector {
            heap,
            config,
            logger,
            cycles: 0,
        })
    }

    /// The heap this collector manages
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Mutable access for the external collaborators (allocator, mark
    /// phase, root suppliers) that populate the heap
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// The active configuration
    pub fn config(&self) -> &GcConfig {
        &self.config
    }

    /// The event logger
    pub fn logger(&self) -> &GcLogger {
        &self.logger
    }

    /// Completed compaction cycles
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run one full compaction over the already-marked heap.
    ///
    /// See [`crate::relocate::compact`] for the parameter contract.
    pub fn compact(
        &mut self,
        roots: &mut RootSet,
        static_list: usize,
        dead_weak_list: Option<&mut usize>,
        resurrected_tasks: Option<&mut usize>,
    ) -> CompactionStats {
        self.cycles += 1;
        let cycle = self.cycles;
        self.logger.log(GcEvent::CycleStart {
            cycle,
            old_blocks: self.heap.oldest_generation().old_block_count(),
        });

        let stats = compact(
            &mut self.heap,
            roots,
            static_list,
            dead_weak_list,
            resurrected_tasks,
        );

        if self.config.stats_enabled {
            self.logger.log_cycle(cycle, &stats);
            log::info!("{}", stats);
        }
        stats
    }
}
