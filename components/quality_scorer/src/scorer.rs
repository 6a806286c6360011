//! Deduction-based quality score

use echo_types::{HookStatus, QualityResult, Severity};
use serde::{Deserialize, Serialize};
use tracing::debug;

const NO_TICKS_PENALTY: u32 = 25;
const FEW_TICKS_PENALTY: u32 = 15;
const LIMITED_TICKS_PENALTY: u32 = 5;
const FEW_TICKS_BELOW: u64 = 10;
const LIMITED_TICKS_BELOW: u64 = 100;

const SESSION_TOO_SHORT_PENALTY: u32 = 15;
const SHORT_SESSION_PENALTY: u32 = 8;
const SESSION_TOO_SHORT_MS: u64 = 3_000;
const SHORT_SESSION_MS: u64 = 10_000;

const NO_PHASE_PENALTY: u32 = 15;
const NO_SUB_TIMING_PENALTY: u32 = 10;

const HOOK_MISSING_PENALTY: u32 = 25;
const HOOK_PARTIAL_PENALTY: u32 = 10;
const WATCHDOG_INACTIVE_PENALTY: u32 = 5;
const FALLBACK_HEARTBEAT_PENALTY: u32 = 20;

/// Everything the scorer looks at, gathered by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityInputs {
    pub tick_samples: u64,
    pub session_duration_ms: u64,
    pub deep_analysis_enabled: bool,
    pub phase_samples: u64,
    pub sub_timing_entries: u64,
    pub hook_status: HookStatus,
    /// Watchdog running and receiving heartbeats
    pub watchdog_active: bool,
    pub used_fallback_heartbeat: bool,
}

impl Default for QualityInputs {
    fn default() -> Self {
        Self {
            tick_samples: 0,
            session_duration_ms: 0,
            deep_analysis_enabled: false,
            phase_samples: 0,
            sub_timing_entries: 0,
            hook_status: HookStatus::Ok,
            watchdog_active: true,
            used_fallback_heartbeat: false,
        }
    }
}

/// Scores session data quality
///
/// Stateless: the same inputs always give the same result.
#[derive(Debug, Default, Clone, Copy)]
pub struct QualityScorer;

impl QualityScorer {
    pub fn new() -> Self {
        Self
    }

    /// Start at 100 and deduct for each detected problem, flooring at 0
    pub fn score(&self, inputs: &QualityInputs) -> QualityResult {
        let mut result = QualityResult::perfect();
        let mut penalty = 0u32;

        match inputs.tick_samples {
            0 => {
                penalty += NO_TICKS_PENALTY;
                result.add_issue(
                    "no_tick_data",
                    Severity::Critical,
                    "No tick data collected (total_ticks = 0)",
                );
            }
            n if n < FEW_TICKS_BELOW => {
                penalty += FEW_TICKS_PENALTY;
                result.add_issue("low_tick_count", Severity::Warning, format!("Very few ticks: {}", n));
            }
            n if n < LIMITED_TICKS_BELOW => {
                penalty += LIMITED_TICKS_PENALTY;
                result.add_issue("short_sample", Severity::Info, format!("Limited tick sample: {}", n));
            }
            _ => {}
        }

        let session_ms = inputs.session_duration_ms;
        if session_ms < SESSION_TOO_SHORT_MS {
            penalty += SESSION_TOO_SHORT_PENALTY;
            result.add_issue(
                "session_too_short",
                Severity::Warning,
                format!("Session < 3 seconds: {:.1}s", session_ms as f64 / 1000.0),
            );
        } else if session_ms < SHORT_SESSION_MS {
            penalty += SHORT_SESSION_PENALTY;
            result.add_issue("short_session", Severity::Info, "Session < 10 seconds");
        }

        if inputs.deep_analysis_enabled {
            if inputs.phase_samples == 0 {
                penalty += NO_PHASE_PENALTY;
                result.add_issue(
                    "no_phase_data",
                    Severity::Warning,
                    "Deep analysis enabled but no phase data",
                );
            }
            if inputs.sub_timing_entries == 0 {
                penalty += NO_SUB_TIMING_PENALTY;
                result.add_issue(
                    "no_subprofiler_data",
                    Severity::Warning,
                    "Deep analysis enabled but no sub-timing data",
                );
            }
        }

        match inputs.hook_status {
            HookStatus::Missing => {
                penalty += HOOK_MISSING_PENALTY;
                result.add_issue("hook_missing", Severity::Critical, "Liveness hook not firing");
            }
            HookStatus::Partial => {
                penalty += HOOK_PARTIAL_PENALTY;
                result.add_issue(
                    "hook_partial",
                    Severity::Warning,
                    "Liveness hook firing intermittently",
                );
            }
            HookStatus::Ok => {}
        }

        if !inputs.watchdog_active {
            penalty += WATCHDOG_INACTIVE_PENALTY;
            result.add_issue(
                "freeze_detector_inactive",
                Severity::Info,
                "Freeze watchdog not receiving heartbeats",
            );
        }

        if inputs.used_fallback_heartbeat {
            penalty += FALLBACK_HEARTBEAT_PENALTY;
            result.add_issue(
                "used_fallback_ticks",
                Severity::Warning,
                "Fallback heartbeat was used - data may be inaccurate",
            );
        }

        result.score = 100u32.saturating_sub(penalty);
        debug!(
            "Quality score {} ({} issues)",
            result.score,
            result.issues.len()
        );
        result
    }
}
