// Echo profiler shared types
//
// Measurement catalog, clock abstraction, trigger table, watchdog snapshots
// and quality results shared by every Echo component.

pub mod clock;
pub mod constants;
pub mod point;
pub mod quality;
pub mod snapshot;
pub mod trigger;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, MonotonicClock, SharedClock};
pub use point::{Category, MeasurementPoint};
pub use quality::{HookStatus, QualityIssue, QualityResult, Severity};
pub use snapshot::{FreezeSnapshot, HeavyFunction, MemorySnapshot, SnapshotContext};
pub use trigger::{TriggerConfig, TriggerReason, WindowConfig};

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds since the Unix epoch
///
/// Only used for human-facing timestamps (snapshots, spikes, sessions);
/// every duration is measured through a [`Clock`].
pub fn wall_clock_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
