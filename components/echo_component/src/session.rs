//! Profiling session identity and host-reported signals

use echo_types::HookStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity and age of the current profiling session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: Uuid,
    /// Wall-clock start time
    pub started_at_ms: u64,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Session {
    pub(crate) id: Uuid,
    pub(crate) started_at_ms: u64,
    pub(crate) started_nanos: u64,
}

impl Session {
    pub(crate) fn begin(started_at_ms: u64, started_nanos: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at_ms,
            started_nanos,
        }
    }

    pub(crate) fn info(&self, now_nanos: u64) -> SessionInfo {
        SessionInfo {
            id: self.id,
            started_at_ms: self.started_at_ms,
            duration_ms: now_nanos.saturating_sub(self.started_nanos) / 1_000_000,
        }
    }
}

/// Signals about the host integration that feed the quality score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostSignals {
    /// Explicit hook status; derived from `heartbeat_count` when unset
    pub hook_status: Option<HookStatus>,
    /// A degraded heartbeat source was used at some point this session
    pub used_fallback_heartbeat: bool,
    /// Phase samples measured outside the span engine
    pub phase_samples: u64,
    /// Sub-timing entries measured outside the span engine
    pub sub_timing_entries: u64,
    /// Heartbeats delivered by the host's tick hook this session
    pub heartbeat_count: u64,
}

impl HostSignals {
    pub fn effective_hook_status(&self) -> HookStatus {
        self.hook_status
            .unwrap_or_else(|| HookStatus::from_heartbeat_count(self.heartbeat_count))
    }
}
