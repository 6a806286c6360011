//! Save decisions driven by the quality score

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a finished report should be written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveLocation {
    Normal,
    LowQuality,
}

impl fmt::Display for SaveLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveLocation::Normal => f.write_str("normal"),
            SaveLocation::LowQuality => f.write_str("low_quality"),
        }
    }
}

/// Minimum score a report needs to be saved normally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePolicy {
    min_quality_to_save: u32,
}

impl SavePolicy {
    /// Threshold is clamped to 0..=100
    pub fn new(min_quality_to_save: u32) -> Self {
        Self {
            min_quality_to_save: min_quality_to_save.min(100),
        }
    }

    pub fn min_quality_to_save(&self) -> u32 {
        self.min_quality_to_save
    }

    pub fn should_save(&self, score: u32) -> bool {
        score >= self.min_quality_to_save
    }

    pub fn save_location(&self, score: u32) -> SaveLocation {
        if self.should_save(score) {
            SaveLocation::Normal
        } else {
            SaveLocation::LowQuality
        }
    }
}

impl Default for SavePolicy {
    fn default() -> Self {
        Self::new(0)
    }
}
