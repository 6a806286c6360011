//! Configuration for the Echo profiler

use crate::{EchoError, Result};
use echo_types::constants::{
    DEFAULT_SPIKE_THRESHOLD_MS, DEFAULT_TOP_N, FREEZE_THRESHOLD_MS, TRIGGER_COOLDOWN_MS,
    WATCHDOG_POLL_INTERVAL_MS, WATCHDOG_RECHECK_INTERVAL_MS,
};
use freeze_watchdog::WatchdogConfig;
use serde::{Deserialize, Serialize};

/// Configuration for the Echo profiler
///
/// Missing fields take their default values when loading from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EchoConfig {
    /// Start profiling as soon as the component is created
    enabled: bool,

    /// Record script calls and script-related points
    script_profiling_enabled: bool,

    /// Log every stack anomaly instead of only the first
    debug_mode: bool,

    /// Expect phase and sub-timing data when scoring quality
    deep_analysis_enabled: bool,

    /// Samples above this are logged as spikes and slow ticks open a window
    spike_threshold_ms: f64,

    freeze_threshold_ms: u64,
    watchdog_poll_ms: u64,
    watchdog_recheck_ms: u64,

    /// Minimum detailed-window trigger spacing
    trigger_cooldown_ms: u64,

    /// Reports scoring below this go to the low quality location
    min_quality_to_save: u32,

    /// Entries in top-N rankings and freeze snapshots
    top_n: usize,
}

impl EchoConfig {
    /// Create a new builder for EchoConfig
    ///
    /// # Example
    ///
    /// ```
    /// use echo_component::EchoConfig;
    ///
    /// let config = EchoConfig::builder()
    ///     .script_profiling_enabled(true)
    ///     .spike_threshold_ms(50.0)
    ///     .build();
    /// assert!(config.script_profiling_enabled());
    /// ```
    pub fn builder() -> EchoConfigBuilder {
        EchoConfigBuilder::default()
    }

    /// Parse a JSON document and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if !self.spike_threshold_ms.is_finite() || self.spike_threshold_ms <= 0.0 {
            return Err(EchoError::InvalidConfiguration(format!(
                "spike_threshold_ms must be > 0 (got {})",
                self.spike_threshold_ms
            )));
        }
        if self.freeze_threshold_ms == 0 {
            return Err(EchoError::InvalidConfiguration(
                "freeze_threshold_ms must be > 0".to_string(),
            ));
        }
        if self.watchdog_poll_ms == 0 || self.watchdog_recheck_ms == 0 {
            return Err(EchoError::InvalidConfiguration(
                "watchdog intervals must be > 0".to_string(),
            ));
        }
        if self.min_quality_to_save > 100 {
            return Err(EchoError::InvalidConfiguration(format!(
                "min_quality_to_save must be <= 100 (got {})",
                self.min_quality_to_save
            )));
        }
        if self.top_n == 0 {
            return Err(EchoError::InvalidConfiguration(
                "top_n must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn script_profiling_enabled(&self) -> bool {
        self.script_profiling_enabled
    }

    pub fn debug_mode(&self) -> bool {
        self.debug_mode
    }

    pub fn deep_analysis_enabled(&self) -> bool {
        self.deep_analysis_enabled
    }

    pub fn spike_threshold_ms(&self) -> f64 {
        self.spike_threshold_ms
    }

    pub fn freeze_threshold_ms(&self) -> u64 {
        self.freeze_threshold_ms
    }

    pub fn watchdog_poll_ms(&self) -> u64 {
        self.watchdog_poll_ms
    }

    pub fn watchdog_recheck_ms(&self) -> u64 {
        self.watchdog_recheck_ms
    }

    pub fn trigger_cooldown_ms(&self) -> u64 {
        self.trigger_cooldown_ms
    }

    pub fn min_quality_to_save(&self) -> u32 {
        self.min_quality_to_save
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    /// Watchdog timings derived from this configuration
    pub fn watchdog_config(&self) -> WatchdogConfig {
        WatchdogConfig {
            threshold_ms: self.freeze_threshold_ms,
            poll_interval_ms: self.watchdog_poll_ms,
            recheck_interval_ms: self.watchdog_recheck_ms,
            ..WatchdogConfig::default()
        }
    }
}

impl Default for EchoConfig {
    /// Default values:
    /// - profiling off until enabled, script profiling off
    /// - spike threshold: 33.33 ms (30 fps)
    /// - freeze threshold: 500 ms, polled every 100 ms
    /// - trigger cooldown: 1000 ms
    /// - min_quality_to_save: 30
    fn default() -> Self {
        Self {
            enabled: false,
            script_profiling_enabled: false,
            debug_mode: false,
            deep_analysis_enabled: false,
            spike_threshold_ms: DEFAULT_SPIKE_THRESHOLD_MS,
            freeze_threshold_ms: FREEZE_THRESHOLD_MS,
            watchdog_poll_ms: WATCHDOG_POLL_INTERVAL_MS,
            watchdog_recheck_ms: WATCHDOG_RECHECK_INTERVAL_MS,
            trigger_cooldown_ms: TRIGGER_COOLDOWN_MS,
            min_quality_to_save: 30,
            top_n: DEFAULT_TOP_N,
        }
    }
}

/// Builder for EchoConfig
///
/// Unset fields fall back to [`EchoConfig::default`].
#[derive(Debug, Clone, Default)]
pub struct EchoConfigBuilder {
    enabled: Option<bool>,
    script_profiling_enabled: Option<bool>,
    debug_mode: Option<bool>,
    deep_analysis_enabled: Option<bool>,
    spike_threshold_ms: Option<f64>,
    freeze_threshold_ms: Option<u64>,
    watchdog_poll_ms: Option<u64>,
    watchdog_recheck_ms: Option<u64>,
    trigger_cooldown_ms: Option<u64>,
    min_quality_to_save: Option<u32>,
    top_n: Option<usize>,
}

impl EchoConfigBuilder {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn script_profiling_enabled(mut self, enabled: bool) -> Self {
        self.script_profiling_enabled = Some(enabled);
        self
    }

    pub fn debug_mode(mut self, enabled: bool) -> Self {
        self.debug_mode = Some(enabled);
        self
    }

    pub fn deep_analysis_enabled(mut self, enabled: bool) -> Self {
        self.deep_analysis_enabled = Some(enabled);
        self
    }

    pub fn spike_threshold_ms(mut self, threshold_ms: f64) -> Self {
        self.spike_threshold_ms = Some(threshold_ms);
        self
    }

    pub fn freeze_threshold_ms(mut self, threshold_ms: u64) -> Self {
        self.freeze_threshold_ms = Some(threshold_ms);
        self
    }

    pub fn watchdog_poll_ms(mut self, poll_ms: u64) -> Self {
        self.watchdog_poll_ms = Some(poll_ms);
        self
    }

    pub fn watchdog_recheck_ms(mut self, recheck_ms: u64) -> Self {
        self.watchdog_recheck_ms = Some(recheck_ms);
        self
    }

    pub fn trigger_cooldown_ms(mut self, cooldown_ms: u64) -> Self {
        self.trigger_cooldown_ms = Some(cooldown_ms);
        self
    }

    pub fn min_quality_to_save(mut self, score: u32) -> Self {
        self.min_quality_to_save = Some(score);
        self
    }

    pub fn top_n(mut self, n: usize) -> Self {
        self.top_n = Some(n);
        self
    }

    /// Build the EchoConfig
    ///
    /// Values are not validated here; `EchoComponent::new` validates.
    pub fn build(self) -> EchoConfig {
        let defaults = EchoConfig::default();
        EchoConfig {
            enabled: self.enabled.unwrap_or(defaults.enabled),
            script_profiling_enabled: self
                .script_profiling_enabled
                .unwrap_or(defaults.script_profiling_enabled),
            debug_mode: self.debug_mode.unwrap_or(defaults.debug_mode),
            deep_analysis_enabled: self
                .deep_analysis_enabled
                .unwrap_or(defaults.deep_analysis_enabled),
            spike_threshold_ms: self.spike_threshold_ms.unwrap_or(defaults.spike_threshold_ms),
            freeze_threshold_ms: self
                .freeze_threshold_ms
                .unwrap_or(defaults.freeze_threshold_ms),
            watchdog_poll_ms: self.watchdog_poll_ms.unwrap_or(defaults.watchdog_poll_ms),
            watchdog_recheck_ms: self
                .watchdog_recheck_ms
                .unwrap_or(defaults.watchdog_recheck_ms),
            trigger_cooldown_ms: self
                .trigger_cooldown_ms
                .unwrap_or(defaults.trigger_cooldown_ms),
            min_quality_to_save: self
                .min_quality_to_save
                .unwrap_or(defaults.min_quality_to_save),
            top_n: self.top_n.unwrap_or(defaults.top_n),
        }
    }
}
