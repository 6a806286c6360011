//! Freeze snapshot records
//!
//! A [`FreezeSnapshot`] is built once, at stall-detection time, and never
//! mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque heap counters supplied by the host
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MemorySnapshot {
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub total_bytes: u64,
    pub max_bytes: u64,
}

impl MemorySnapshot {
    /// Build from used/total/max; free is derived
    pub fn new(used_bytes: u64, total_bytes: u64, max_bytes: u64) -> Self {
        Self {
            used_bytes,
            free_bytes: total_bytes.saturating_sub(used_bytes),
            total_bytes,
            max_bytes,
        }
    }

    /// Used memory in whole megabytes
    pub fn used_mb(&self) -> u64 {
        self.used_bytes / (1024 * 1024)
    }

    /// Used memory as a percentage of the maximum, 0 when unknown
    pub fn usage_percent(&self) -> f64 {
        if self.max_bytes == 0 {
            return 0.0;
        }
        self.used_bytes as f64 * 100.0 / self.max_bytes as f64
    }
}

/// A function that was expensive at the time of a freeze
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HeavyFunction {
    pub name: String,
    pub call_count: u64,
    pub total_ms: f64,
    pub max_ms: f64,
}

/// What was running when the primary thread stalled
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotContext {
    /// Open spans on the primary thread, innermost first
    pub active_spans: Vec<String>,
    /// Milliseconds per subsystem phase in the stalled tick
    pub tick_phases: BTreeMap<String, f64>,
    /// Labeled spans still open, `Point:label` to elapsed ms
    pub active_sub_timings: BTreeMap<String, f64>,
    pub heavy_functions: Vec<HeavyFunction>,
}

/// Diagnostic record captured when the heartbeat stalls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FreezeSnapshot {
    /// Wall-clock capture time
    pub timestamp_ms: u64,
    /// Heartbeat age at detection
    pub freeze_duration_ms: u64,
    pub memory: MemorySnapshot,
    /// Primary thread stack, innermost first, truncated
    pub stack_trace: Vec<String>,
    #[serde(flatten)]
    pub context: SnapshotContext,
}

impl FreezeSnapshot {
    /// Whether the snapshot carries any profiler context
    pub fn has_context(&self) -> bool {
        !self.context.active_spans.is_empty()
            || !self.context.tick_phases.is_empty()
            || !self.context.heavy_functions.is_empty()
    }
}
