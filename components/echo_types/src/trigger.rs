//! Detailed-window trigger reasons and their window settings

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a detailed sampling window was requested
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerReason {
    /// A tick ran over budget
    SlowTick,
    /// A context menu is being built
    ContextMenu,
    /// Burst of UI / inventory refreshes
    UiBurst,
    /// Developer hotkey or console command
    ManualCapture,
}

impl TriggerReason {
    /// Every trigger reason
    pub const ALL: [TriggerReason; 4] = [
        TriggerReason::SlowTick,
        TriggerReason::ContextMenu,
        TriggerReason::UiBurst,
        TriggerReason::ManualCapture,
    ];
}

impl fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TriggerReason::SlowTick => "SLOW_TICK",
            TriggerReason::ContextMenu => "CONTEXT_MENU",
            TriggerReason::UiBurst => "UI_BURST",
            TriggerReason::ManualCapture => "MANUAL_CAPTURE",
        };
        f.write_str(name)
    }
}

/// Parameters of one detailed sampling window
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WindowConfig {
    /// How long the window stays open
    pub duration_ms: u64,
    /// Track one call in `sample_rate` (1 = every call)
    pub sample_rate: u32,
    /// Context tag stamped on every tracked call
    pub context_tag: String,
}

impl WindowConfig {
    /// Create a window config
    pub fn new(duration_ms: u64, sample_rate: u32, context_tag: impl Into<String>) -> Self {
        Self {
            duration_ms,
            sample_rate: sample_rate.max(1),
            context_tag: context_tag.into(),
        }
    }
}

/// Static mapping from trigger reason to window parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriggerConfig {
    entries: Vec<(TriggerReason, WindowConfig)>,
}

impl TriggerConfig {
    /// Table with no entries; every trigger is unknown
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add or replace the window for a reason
    pub fn with(mut self, reason: TriggerReason, window: WindowConfig) -> Self {
        self.entries.retain(|(r, _)| *r != reason);
        self.entries.push((reason, window));
        self
    }

    /// Window parameters for a reason, if configured
    pub fn lookup(&self, reason: TriggerReason) -> Option<&WindowConfig> {
        self.entries
            .iter()
            .find(|(r, _)| *r == reason)
            .map(|(_, w)| w)
    }

    /// Number of configured reasons
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no reason is configured
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TriggerConfig {
    /// Default table
    ///
    /// - SLOW_TICK: 300ms, 1/4
    /// - CONTEXT_MENU: 300ms, 1/2
    /// - UI_BURST: 200ms, 1/4
    /// - MANUAL_CAPTURE: 2000ms, every call
    fn default() -> Self {
        Self::empty()
            .with(TriggerReason::SlowTick, WindowConfig::new(300, 4, "SLOW_TICK"))
            .with(TriggerReason::ContextMenu, WindowConfig::new(300, 2, "CONTEXT_MENU"))
            .with(TriggerReason::UiBurst, WindowConfig::new(200, 4, "UI_BURST"))
            .with(TriggerReason::ManualCapture, WindowConfig::new(2000, 1, "MANUAL"))
    }
}
