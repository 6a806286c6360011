//! Host hooks consulted when a freeze is captured

use echo_types::{MemorySnapshot, SnapshotContext};
use std::fmt;

/// Supplies "what was running" at freeze time
///
/// Called from the watchdog thread while the primary thread is stalled, so
/// implementations must only read shared state.
pub trait SnapshotSource: Send + Sync + fmt::Debug {
    /// Primary thread stack, innermost first
    fn stack_trace(&self) -> Vec<String>;

    fn context(&self) -> SnapshotContext;
}

/// Supplies opaque heap counters
pub trait MemoryProbe: Send + Sync + fmt::Debug {
    fn sample(&self) -> MemorySnapshot;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EmptySnapshotSource;

impl SnapshotSource for EmptySnapshotSource {
    fn stack_trace(&self) -> Vec<String> {
        Vec::new()
    }

    fn context(&self) -> SnapshotContext {
        SnapshotContext::default()
    }
}

/// Probe for hosts that cannot report memory; every counter is zero
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMemoryProbe;

impl MemoryProbe for NullMemoryProbe {
    fn sample(&self) -> MemorySnapshot {
        MemorySnapshot::default()
    }
}
