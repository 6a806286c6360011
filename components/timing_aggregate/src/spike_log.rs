//! Log of individual samples that exceeded the spike threshold

use echo_types::constants::{DEFAULT_SPIKE_THRESHOLD_MS, SPIKE_LOG_MAX_ENTRIES};
use echo_types::{wall_clock_millis, MeasurementPoint};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// One recorded spike
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpikeEntry {
    /// Wall-clock time the spike was logged
    pub timestamp_ms: u64,
    pub duration_micros: u64,
    pub point: MeasurementPoint,
    pub label: Option<String>,
}

impl SpikeEntry {
    pub fn duration_ms(&self) -> f64 {
        self.duration_micros as f64 / 1000.0
    }

    /// Label if present, otherwise the point name
    pub fn source(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => format!("{:?}", self.point),
        }
    }
}

/// Serializable summary of the spike log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpikeSummary {
    pub threshold_ms: f64,
    pub total_spikes: u64,
    pub worst_spike_ms: f64,
    pub worst_spike_source: String,
    pub recent_spikes: Vec<SpikeEntry>,
}

/// Bounded log of spikes plus running totals
#[derive(Debug)]
pub struct SpikeLog {
    threshold_ms: RwLock<f64>,
    entries: Mutex<VecDeque<SpikeEntry>>,
    total_spikes: AtomicU64,
    worst_spike_micros: AtomicU64,
    worst_spike_source: RwLock<String>,
}

impl SpikeLog {
    /// Spike log with the default threshold
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_SPIKE_THRESHOLD_MS)
    }

    pub fn with_threshold(threshold_ms: f64) -> Self {
        Self {
            threshold_ms: RwLock::new(threshold_ms),
            entries: Mutex::new(VecDeque::with_capacity(SPIKE_LOG_MAX_ENTRIES)),
            total_spikes: AtomicU64::new(0),
            worst_spike_micros: AtomicU64::new(0),
            worst_spike_source: RwLock::new(String::new()),
        }
    }

    pub fn threshold_ms(&self) -> f64 {
        *self.threshold_ms.read()
    }

    pub fn set_threshold_ms(&self, threshold_ms: f64) {
        info!("Spike threshold set to {} ms", threshold_ms);
        *self.threshold_ms.write() = threshold_ms;
    }

    /// Record a sample if it meets the threshold; returns whether it did
    pub fn log_spike(&self, duration_micros: u64, point: MeasurementPoint, label: Option<&str>) -> bool {
        let duration_ms = duration_micros as f64 / 1000.0;
        if duration_ms < self.threshold_ms() {
            return false;
        }

        let entry = SpikeEntry {
            timestamp_ms: wall_clock_millis(),
            duration_micros,
            point,
            label: label.map(str::to_owned),
        };
        let source = entry.source();

        {
            let mut entries = self.entries.lock();
            entries.push_back(entry);
            while entries.len() > SPIKE_LOG_MAX_ENTRIES {
                entries.pop_front();
            }
        }
        self.total_spikes.fetch_add(1, Ordering::Relaxed);

        let mut current = self.worst_spike_micros.load(Ordering::Relaxed);
        while duration_micros > current {
            match self.worst_spike_micros.compare_exchange_weak(
                current,
                duration_micros,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    *self.worst_spike_source.write() = source;
                    break;
                }
                Err(actual) => current = actual,
            }
        }

        true
    }

    /// Up to `count` spikes, newest first
    pub fn recent_spikes(&self, count: usize) -> Vec<SpikeEntry> {
        self.entries.lock().iter().rev().take(count).cloned().collect()
    }

    /// Every retained spike, oldest first
    pub fn all_spikes(&self) -> Vec<SpikeEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn total_spikes(&self) -> u64 {
        self.total_spikes.load(Ordering::Relaxed)
    }

    pub fn worst_spike_ms(&self) -> f64 {
        self.worst_spike_micros.load(Ordering::Relaxed) as f64 / 1000.0
    }

    pub fn worst_spike_source(&self) -> String {
        self.worst_spike_source.read().clone()
    }

    /// Retained spikes grouped by point
    pub fn spikes_by_point(&self) -> BTreeMap<MeasurementPoint, u64> {
        let mut result = BTreeMap::new();
        for entry in self.entries.lock().iter() {
            *result.entry(entry.point).or_insert(0) += 1;
        }
        result
    }

    pub fn summary(&self, recent: usize) -> SpikeSummary {
        SpikeSummary {
            threshold_ms: self.threshold_ms(),
            total_spikes: self.total_spikes(),
            worst_spike_ms: self.worst_spike_ms(),
            worst_spike_source: self.worst_spike_source(),
            recent_spikes: self.recent_spikes(recent),
        }
    }

    /// Clear entries and totals; the threshold is kept
    pub fn reset(&self) {
        self.entries.lock().clear();
        self.total_spikes.store(0, Ordering::Relaxed);
        self.worst_spike_micros.store(0, Ordering::Relaxed);
        self.worst_spike_source.write().clear();
    }
}

impl Default for SpikeLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_below_threshold_is_ignored() {
        let log = SpikeLog::new();
        assert!(!log.log_spike(33_000, MeasurementPoint::Tick, None));
        assert_eq!(log.total_spikes(), 0);
        assert!(log.log_spike(33_330, MeasurementPoint::Tick, None));
        assert_eq!(log.total_spikes(), 1);
    }

    #[test]
    fn test_worst_spike_tracking() {
        let log = SpikeLog::with_threshold(10.0);
        log.log_spike(20_000, MeasurementPoint::Render, Some("terrain"));
        log.log_spike(50_000, MeasurementPoint::Tick, None);
        log.log_spike(30_000, MeasurementPoint::Network, None);

        assert_eq!(log.worst_spike_ms(), 50.0);
        assert_eq!(log.worst_spike_source(), "Tick");
        assert_eq!(log.recent_spikes(1)[0].point, MeasurementPoint::Network);
    }

    #[test]
    fn test_bounded_entries() {
        let log = SpikeLog::with_threshold(1.0);
        for i in 0..(SPIKE_LOG_MAX_ENTRIES as u64 + 20) {
            log.log_spike(2_000 + i, MeasurementPoint::Physics, None);
        }
        assert_eq!(log.all_spikes().len(), SPIKE_LOG_MAX_ENTRIES);
        assert_eq!(log.total_spikes(), SPIKE_LOG_MAX_ENTRIES as u64 + 20);
        assert_eq!(log.all_spikes()[0].duration_micros, 2_020);
    }

    #[test]
    fn test_spikes_by_point() {
        let log = SpikeLog::with_threshold(1.0);
        log.log_spike(5_000, MeasurementPoint::Tick, None);
        log.log_spike(5_000, MeasurementPoint::Tick, None);
        log.log_spike(5_000, MeasurementPoint::Audio, Some("mixer"));

        let by_point = log.spikes_by_point();
        assert_eq!(by_point[&MeasurementPoint::Tick], 2);
        assert_eq!(by_point[&MeasurementPoint::Audio], 1);
    }

    #[test]
    fn test_reset_keeps_threshold() {
        let log = SpikeLog::new();
        log.set_threshold_ms(5.0);
        log.log_spike(6_000, MeasurementPoint::Tick, None);
        log.reset();

        assert_eq!(log.total_spikes(), 0);
        assert_eq!(log.worst_spike_source(), "");
        assert_eq!(log.threshold_ms(), 5.0);
    }
}
