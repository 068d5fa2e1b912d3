//! Compaction statistics
//!
//! One `CompactionStats` record is produced per compaction cycle. The
//! forward pass counts live objects and bytes while assigning addresses;
//! the backward pass counts the bytes it scans and the subset it actually
//! copies. A correct cycle scans exactly the bytes the forward pass
//! assigned, which the integration tests assert.

use serde::Serialize;
use std::time::Instant;

/// Statistics for one compaction cycle
#[derive(Debug, Default, Clone, Serialize)]
pub struct CompactionStats {
    /// Root slots handed to the threading engine
    pub roots_threaded: usize,
    /// Live objects relocated (or left in place) in the compacted generation
    pub live_objects: usize,
    /// Bytes of live data assigned new addresses by the forward pass
    pub live_bytes: usize,
    /// Bytes scanned by the backward pass (must equal `live_bytes`)
    pub moved_bytes: usize,
    /// Bytes physically copied (moves where source != destination)
    pub copied_bytes: usize,
    /// Blocks in the compacted generation before the cycle
    pub blocks_before: usize,
    /// Live blocks remaining after the cycle
    pub blocks_after: usize,
    /// Blocks returned to the segment free list
    pub blocks_released: usize,
    /// Duration of the root-threading phase in microseconds
    pub threading_micros: u64,
    /// Duration of the forward pass in microseconds
    pub forward_micros: u64,
    /// Duration of the backward pass in microseconds
    pub backward_micros: u64,
}

impl CompactionStats {
    /// Total cycle duration in microseconds
    pub fn total_micros(&self) -> u64 {
        self.threading_micros + self.forward_micros + self.backward_micros
    }
}

impl std::fmt::Display for CompactionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "compaction: {} objects / {} bytes live, {} bytes copied, blocks {} -> {} ({} released), {}us",
            self.live_objects,
            self.live_bytes,
            self.copied_bytes,
            self.blocks_before,
            self.blocks_after,
            self.blocks_released,
            self.total_micros()
        )
    }
}

/// Wall-clock timer for a single pass
pub struct PhaseTimer {
    start: Instant,
}

impl PhaseTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Elapsed time in microseconds
    pub fn elapsed_micros(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl Default for PhaseTimer {
    fn default() -> Self {
        Self::start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_micros() {
        let stats = CompactionStats {
            threading_micros: 10,
            forward_micros: 20,
            backward_micros: 30,
            ..Default::default()
        };
        assert_eq!(stats.total_micros(), 60);
    }

    #[test]
    fn test_display_mentions_blocks() {
        let stats = CompactionStats {
            blocks_before: 4,
            blocks_after: 2,
            blocks_released: 2,
            ..Default::default()
        };
        let text = stats.to_string();
        assert!(text.contains("4 -> 2"));
    }

    #[test]
    fn test_serializes_to_json() {
        let stats = CompactionStats::default();
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("live_objects"));
    }

    #[test]
    fn test_phase_timer_monotonic() {
        let timer = PhaseTimer::start();
        let a = timer.elapsed_micros();
        let b = timer.elapsed_micros();
        assert!(b >= a);
    }
}
