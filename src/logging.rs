//! Compaction logging and tracing
//!
//! Structured event log for compaction cycles, alongside the `log` crate
//! macros used for fine-grained pass traces. Useful for performance
//! analysis and production monitoring.
//!
//! Log Levels:
//! - ERROR: heap-consistency diagnostics (see `error::corruption`)
//! - INFO: cycle summaries
//! - DEBUG: per-phase events
//! - TRACE: per-pass details

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use crate::stats::CompactionStats;

/// Log level for compaction events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

/// Compaction event types
#[derive(Debug, Clone)]
pub enum GcEvent {
    /// Compaction cycle started
    CycleStart { cycle: u64, old_blocks: usize },

    /// A pass started
    PhaseStart { phase: &'static str, cycle: u64 },

    /// A pass completed
    PhaseEnd {
        phase: &'static str,
        duration_us: u64,
        cycle: u64,
    },

    /// Compaction cycle completed
    CycleEnd {
        cycle: u64,
        live_bytes: usize,
        blocks_released: usize,
        duration_us: u64,
    },
}

/// Logger configuration
#[derive(Debug, Clone)]
pub struct GcLoggerConfig {
    /// Minimum log level
    pub level: LogLevel,

    /// Enable console output
    pub console: bool,

    /// Emit events as JSON instead of human-readable lines
    pub json: bool,

    /// Prefix console lines with timestamps
    pub timestamps: bool,
}

impl Default for GcLoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            console: false,
            json: false,
            timestamps: true,
        }
    }
}

/// Centralized logger for compaction events
///
/// Events are buffered for later inspection and optionally echoed to the
/// console. Buffering uses a plain mutex; the engine only logs from the
/// single collector thread, so there is no contention to speak of.
pub struct GcLogger {
    config: GcLoggerConfig,
    events: Mutex<Vec<(Instant, GcEvent)>>,
    enabled: AtomicBool,
}

impl GcLogger {
    /// Create a new logger
    pub fn new(config: GcLoggerConfig) -> Self {
        Self {
            config,
            events: Mutex::new(Vec::new()),
            enabled: AtomicBool::new(true),
        }
    }

    /// Enable logging
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    /// Disable logging
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    /// Check if logging is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Log a compaction event
    pub fn log(&self, event: GcEvent) {
        if !self.is_enabled() {
            return;
        }

        if self.event_level(&event) > self.config.level {
            return;
        }

        if let Ok(mut events) = self.events.lock() {
            events.push((Instant::now(), event.clone()));
        }

        if self.config.console {
            self.output_console(&event);
        }
    }

    /// Log a full cycle from its statistics
    pub fn log_cycle(&self, cycle: u64, stats: &CompactionStats) {
        self.log(GcEvent::PhaseEnd {
            phase: "threading",
            duration_us: stats.threading_micros,
            cycle,
        });
        self.log(GcEvent::PhaseEnd {
            phase: "forward",
            duration_us: stats.forward_micros,
            cycle,
        });
        self.log(GcEvent::PhaseEnd {
            phase: "backward",
            duration_us: stats.backward_micros,
            cycle,
        });
        self.log(GcEvent::CycleEnd {
            cycle,
            live_bytes: stats.live_bytes,
            blocks_released: stats.blocks_released,
            duration_us: stats.total_micros(),
        });
    }

    /// Number of buffered events
    pub fn event_count(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Drain and return the buffered events
    pub fn take_events(&self) -> Vec<GcEvent> {
        match self.events.lock() {
            Ok(mut events) => events.drain(..).map(|(_, e)| e).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn event_level(&self, event: &GcEvent) -> LogLevel {
        match event {
            GcEvent::CycleStart { .. } | GcEvent::CycleEnd { .. } => LogLevel::Info,
            GcEvent::PhaseStart { .. } | GcEvent::PhaseEnd { .. } => LogLevel::Debug,
        }
    }

    fn output_console(&self, event: &GcEvent) {
        if self.config.timestamps {
            let now = chrono::Local::now();
            print!("[{}] ", now.format("%Y-%m-%d %H:%M:%S%.3f"));
        }

        if self.config.json {
            self.output_json(event);
        } else {
            self.output_human(event);
        }
    }

    fn output_human(&self, event: &GcEvent) {
        match event {
            GcEvent::CycleStart { cycle, old_blocks } => {
                println!("compact #{}: start ({} old blocks)", cycle, old_blocks);
            }
            GcEvent::PhaseStart { phase, cycle } => {
                println!("compact #{}: {} start", cycle, phase);
            }
            GcEvent::PhaseEnd {
                phase,
                duration_us,
                cycle,
            } => {
                println!("compact #{}: {} done in {}us", cycle, phase, duration_us);
            }
            GcEvent::CycleEnd {
                cycle,
                live_bytes,
                blocks_released,
                duration_us,
            } => {
                println!(
                    "compact #{}: done in {}us, {} bytes live, {} blocks released",
                    cycle, duration_us, live_bytes, blocks_released
                );
            }
        }
    }

    fn output_json(&self, event: &GcEvent) {
        let value = match event {
            GcEvent::CycleStart { cycle, old_blocks } => serde_json::json!({
                "event": "cycle_start", "cycle": cycle, "old_blocks": old_blocks,
            }),
            GcEvent::PhaseStart { phase, cycle } => serde_json::json!({
                "event": "phase_start", "phase": phase, "cycle": cycle,
            }),
            GcEvent::PhaseEnd {
                phase,
                duration_us,
                cycle,
            } => serde_json::json!({
                "event": "phase_end", "phase": phase, "cycle": cycle,
                "duration_us": duration_us,
            }),
            GcEvent::CycleEnd {
                cycle,
                live_bytes,
                blocks_released,
                duration_us,
            } => serde_json::json!({
                "event": "cycle_end", "cycle": cycle, "live_bytes": live_bytes,
                "blocks_released": blocks_released, "duration_us": duration_us,
            }),
        };
        println!("{}", value);
    }
}

impl Default for GcLogger {
    fn default() -> Self {
        Self::new(GcLoggerConfig::default())
    }
}
