//! Watchdog timing configuration

use crate::{Result, WatchdogError};
use echo_types::constants::{
    FREEZE_THRESHOLD_MS, MAX_FREEZE_HISTORY, WATCHDOG_POLL_INTERVAL_MS,
    WATCHDOG_RECHECK_INTERVAL_MS,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often the watchdog polls and when it declares a freeze
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchdogConfig {
    /// Heartbeat age that counts as a freeze
    pub threshold_ms: u64,
    pub poll_interval_ms: u64,
    /// Re-check interval while waiting for a stalled heartbeat to resume
    pub recheck_interval_ms: u64,
    /// Snapshots kept in the history ring
    pub max_history: usize,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            threshold_ms: FREEZE_THRESHOLD_MS,
            poll_interval_ms: WATCHDOG_POLL_INTERVAL_MS,
            recheck_interval_ms: WATCHDOG_RECHECK_INTERVAL_MS,
            max_history: MAX_FREEZE_HISTORY,
        }
    }
}

impl WatchdogConfig {
    pub fn validate(&self) -> Result<()> {
        if self.threshold_ms == 0 {
            return Err(WatchdogError::InvalidConfiguration(
                "threshold_ms must be > 0".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 || self.recheck_interval_ms == 0 {
            return Err(WatchdogError::InvalidConfiguration(
                "poll and recheck intervals must be > 0".to_string(),
            ));
        }
        if self.max_history == 0 {
            return Err(WatchdogError::InvalidConfiguration(
                "max_history must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn recheck_interval(&self) -> Duration {
        Duration::from_millis(self.recheck_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WatchdogConfig::default();
        assert_eq!(config.threshold_ms, 500);
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.recheck_interval(), Duration::from_secs(1));
        assert_eq!(config.max_history, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_values_rejected() {
        let config = WatchdogConfig {
            threshold_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = WatchdogConfig {
            max_history: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
