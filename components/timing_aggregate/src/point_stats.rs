//! Per-point and per-label timing statistics

use dashmap::DashMap;
use echo_types::constants::{ROLLING_WINDOW_1S_MS, ROLLING_WINDOW_5S_MS, ROLLING_WINDOW_60S_MS};
use echo_types::MeasurementPoint;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Raise `slot` to `value` if larger, retrying on contention
pub fn update_max(slot: &AtomicU64, value: u64) {
    let mut current = slot.load(Ordering::Relaxed);
    while value > current {
        match slot.compare_exchange_weak(current, value, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return,
            Err(actual) => current = actual,
        }
    }
}

/// Lower `slot` to `value` if smaller, retrying on contention
pub fn update_min(slot: &AtomicU64, value: u64) {
    let mut current = slot.load(Ordering::Relaxed);
    while value < current {
        match slot.compare_exchange_weak(current, value, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return,
            Err(actual) => current = actual,
        }
    }
}

/// Summary of one rolling horizon
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RollingStats {
    pub window_ms: u64,
    pub average_micros: f64,
    pub max_micros: u64,
    pub sample_count: usize,
}

/// Samples seen within the last `window_ms`
#[derive(Debug)]
pub struct RollingWindow {
    window_ms: u64,
    samples: Mutex<VecDeque<(u64, u64)>>,
}

impl RollingWindow {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            samples: Mutex::new(VecDeque::new()),
        }
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Add a sample taken at `now_ms`
    pub fn add(&self, value: u64, now_ms: u64) {
        let mut samples = self.samples.lock();
        samples.push_back((value, now_ms));
        Self::evict(&mut samples, now_ms, self.window_ms);
    }

    fn evict(samples: &mut VecDeque<(u64, u64)>, now_ms: u64, window_ms: u64) {
        let threshold = now_ms.saturating_sub(window_ms);
        while let Some(&(_, ts)) = samples.front() {
            if ts >= threshold {
                break;
            }
            samples.pop_front();
        }
    }

    /// Average / max / count over the horizon ending at `now_ms`
    pub fn stats(&self, now_ms: u64) -> RollingStats {
        let mut samples = self.samples.lock();
        Self::evict(&mut samples, now_ms, self.window_ms);

        let sample_count = samples.len();
        if sample_count == 0 {
            return RollingStats {
                window_ms: self.window_ms,
                ..Default::default()
            };
        }

        let (sum, max) = samples
            .iter()
            .fold((0u64, 0u64), |(sum, max), &(v, _)| (sum + v, max.max(v)));

        RollingStats {
            window_ms: self.window_ms,
            average_micros: sum as f64 / sample_count as f64,
            max_micros: max,
            sample_count,
        }
    }

    pub fn reset(&self) {
        self.samples.lock().clear();
    }
}

/// Statistics for one free-text label attached to a point
#[derive(Debug, Default)]
pub struct LabelStatistics {
    call_count: AtomicU64,
    total_micros: AtomicU64,
    self_micros: AtomicU64,
    max_micros: AtomicU64,
}

impl LabelStatistics {
    pub fn record(&self, elapsed_micros: u64, self_micros: u64) {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.total_micros.fetch_add(elapsed_micros, Ordering::Relaxed);
        self.self_micros.fetch_add(self_micros, Ordering::Relaxed);
        update_max(&self.max_micros, elapsed_micros);
    }

    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn total_micros(&self) -> u64 {
        self.total_micros.load(Ordering::Relaxed)
    }

    pub fn self_micros(&self) -> u64 {
        self.self_micros.load(Ordering::Relaxed)
    }

    pub fn max_micros(&self) -> u64 {
        self.max_micros.load(Ordering::Relaxed)
    }
}

/// Point-in-time copy of a label's statistics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabelSummary {
    pub point: MeasurementPoint,
    pub label: String,
    pub call_count: u64,
    pub total_micros: u64,
    pub self_micros: u64,
    pub max_micros: u64,
    pub average_micros: f64,
}

/// Point-in-time copy of a point's statistics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PointSnapshot {
    pub point: MeasurementPoint,
    pub call_count: u64,
    pub total_micros: u64,
    pub self_micros: u64,
    pub max_micros: u64,
    pub min_micros: u64,
    pub average_micros: f64,
    pub rolling_1s: RollingStats,
    pub rolling_5s: RollingStats,
    pub rolling_60s: RollingStats,
    pub label_count: usize,
}

/// Accumulated statistics for a single measurement point
///
/// Counters are plain atomics so concurrent writers never block each other;
/// only the rolling windows take a (short) lock.
#[derive(Debug)]
pub struct PointStatistics {
    point: MeasurementPoint,
    call_count: AtomicU64,
    total_micros: AtomicU64,
    self_micros: AtomicU64,
    max_micros: AtomicU64,
    min_micros: AtomicU64,
    rolling_1s: RollingWindow,
    rolling_5s: RollingWindow,
    rolling_60s: RollingWindow,
    labels: DashMap<String, LabelStatistics>,
}

impl PointStatistics {
    /// Create empty statistics for `point`
    pub fn new(point: MeasurementPoint) -> Self {
        Self {
            point,
            call_count: AtomicU64::new(0),
            total_micros: AtomicU64::new(0),
            self_micros: AtomicU64::new(0),
            max_micros: AtomicU64::new(0),
            min_micros: AtomicU64::new(u64::MAX),
            rolling_1s: RollingWindow::new(ROLLING_WINDOW_1S_MS),
            rolling_5s: RollingWindow::new(ROLLING_WINDOW_5S_MS),
            rolling_60s: RollingWindow::new(ROLLING_WINDOW_60S_MS),
            labels: DashMap::new(),
        }
    }

    pub fn point(&self) -> MeasurementPoint {
        self.point
    }

    /// Fold one completed sample in
    pub fn record(&self, elapsed_micros: u64, self_micros: u64, label: Option<&str>, now_ms: u64) {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.total_micros.fetch_add(elapsed_micros, Ordering::Relaxed);
        self.self_micros.fetch_add(self_micros, Ordering::Relaxed);
        update_max(&self.max_micros, elapsed_micros);
        update_min(&self.min_micros, elapsed_micros);

        self.rolling_1s.add(elapsed_micros, now_ms);
        self.rolling_5s.add(elapsed_micros, now_ms);
        self.rolling_60s.add(elapsed_micros, now_ms);

        if let Some(label) = label.filter(|l| !l.is_empty()) {
            self.record_label(label, elapsed_micros, self_micros);
        }
    }

    fn record_label(&self, label: &str, elapsed_micros: u64, self_micros: u64) {
        // Read guard must be released before taking the shard for insertion
        if let Some(stats) = self.labels.get(label) {
            stats.record(elapsed_micros, self_micros);
            return;
        }
        self.labels
            .entry(label.to_owned())
            .or_default()
            .record(elapsed_micros, self_micros);
    }

    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn total_micros(&self) -> u64 {
        self.total_micros.load(Ordering::Relaxed)
    }

    pub fn self_micros(&self) -> u64 {
        self.self_micros.load(Ordering::Relaxed)
    }

    pub fn max_micros(&self) -> u64 {
        self.max_micros.load(Ordering::Relaxed)
    }

    /// Smallest sample, 0 before the first sample
    pub fn min_micros(&self) -> u64 {
        match self.min_micros.load(Ordering::Relaxed) {
            u64::MAX => 0,
            min => min,
        }
    }

    pub fn average_micros(&self) -> f64 {
        let count = self.call_count();
        if count == 0 {
            0.0
        } else {
            self.total_micros() as f64 / count as f64
        }
    }

    pub fn rolling_1s(&self) -> &RollingWindow {
        &self.rolling_1s
    }

    pub fn rolling_5s(&self) -> &RollingWindow {
        &self.rolling_5s
    }

    pub fn rolling_60s(&self) -> &RollingWindow {
        &self.rolling_60s
    }

    /// Summary for one label, if it was ever recorded
    pub fn label(&self, label: &str) -> Option<LabelSummary> {
        self.labels
            .get(label)
            .map(|stats| self.label_summary(label, &stats))
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    fn label_summary(&self, label: &str, stats: &LabelStatistics) -> LabelSummary {
        let call_count = stats.call_count();
        LabelSummary {
            point: self.point,
            label: label.to_owned(),
            call_count,
            total_micros: stats.total_micros(),
            self_micros: stats.self_micros(),
            max_micros: stats.max_micros(),
            average_micros: if call_count == 0 {
                0.0
            } else {
                stats.total_micros() as f64 / call_count as f64
            },
        }
    }

    /// Every label summary, unsorted
    pub fn labels(&self) -> Vec<LabelSummary> {
        self.labels
            .iter()
            .map(|entry| self.label_summary(entry.key(), entry.value()))
            .collect()
    }

    fn top_labels_by<K: Ord>(&self, n: usize, key: impl Fn(&LabelSummary) -> K) -> Vec<LabelSummary> {
        let mut labels = self.labels();
        labels.sort_by(|a, b| key(b).cmp(&key(a)).then_with(|| a.label.cmp(&b.label)));
        labels.truncate(n);
        labels
    }

    pub fn top_labels_by_total_time(&self, n: usize) -> Vec<LabelSummary> {
        self.top_labels_by(n, |l| l.total_micros)
    }

    pub fn top_labels_by_max_time(&self, n: usize) -> Vec<LabelSummary> {
        self.top_labels_by(n, |l| l.max_micros)
    }

    pub fn top_labels_by_call_count(&self, n: usize) -> Vec<LabelSummary> {
        self.top_labels_by(n, |l| l.call_count)
    }

    /// Copy current values, rolling windows evaluated at `now_ms`
    pub fn snapshot(&self, now_ms: u64) -> PointSnapshot {
        PointSnapshot {
            point: self.point,
            call_count: self.call_count(),
            total_micros: self.total_micros(),
            self_micros: self.self_micros(),
            max_micros: self.max_micros(),
            min_micros: self.min_micros(),
            average_micros: self.average_micros(),
            rolling_1s: self.rolling_1s.stats(now_ms),
            rolling_5s: self.rolling_5s.stats(now_ms),
            rolling_60s: self.rolling_60s.stats(now_ms),
            label_count: self.label_count(),
        }
    }

    pub fn reset(&self) {
        self.call_count.store(0, Ordering::Relaxed);
        self.total_micros.store(0, Ordering::Relaxed);
        self.self_micros.store(0, Ordering::Relaxed);
        self.max_micros.store(0, Ordering::Relaxed);
        self.min_micros.store(u64::MAX, Ordering::Relaxed);
        self.rolling_1s.reset();
        self.rolling_5s.reset();
        self.rolling_60s.reset();
        self.labels.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_update_max_under_contention() {
        let slot = Arc::new(AtomicU64::new(0));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let slot = slot.clone();
                thread::spawn(move || {
                    for i in 0..1000 {
                        update_max(&slot, t * 1000 + i);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(slot.load(Ordering::SeqCst), 7999);
    }

    #[test]
    fn test_update_min_ignores_larger() {
        let slot = AtomicU64::new(50);
        update_min(&slot, 70);
        assert_eq!(slot.load(Ordering::SeqCst), 50);
        update_min(&slot, 20);
        assert_eq!(slot.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn test_rolling_window_evicts_old_samples() {
        let window = RollingWindow::new(1000);
        window.add(100, 0);
        window.add(300, 500);

        let stats = window.stats(900);
        assert_eq!(stats.sample_count, 2);
        assert_eq!(stats.max_micros, 300);
        assert_eq!(stats.average_micros, 200.0);

        // Sample at t=0 falls out once now - 1000 passes it
        let stats = window.stats(1001);
        assert_eq!(stats.sample_count, 1);
        assert_eq!(stats.max_micros, 300);

        assert_eq!(window.stats(5000).sample_count, 0);
    }

    #[test]
    fn test_point_statistics_record() {
        let stats = PointStatistics::new(MeasurementPoint::Render);
        assert_eq!(stats.min_micros(), 0);

        stats.record(3000, 3000, None, 10);
        stats.record(1000, 500, Some("world"), 20);

        assert_eq!(stats.call_count(), 2);
        assert_eq!(stats.total_micros(), 4000);
        assert_eq!(stats.self_micros(), 3500);
        assert_eq!(stats.max_micros(), 3000);
        assert_eq!(stats.min_micros(), 1000);
        assert_eq!(stats.average_micros(), 2000.0);
        assert_eq!(stats.label_count(), 1);

        let label = stats.label("world").unwrap();
        assert_eq!(label.call_count, 1);
        assert_eq!(label.self_micros, 500);
    }

    #[test]
    fn test_empty_label_is_ignored() {
        let stats = PointStatistics::new(MeasurementPoint::Custom1);
        stats.record(10, 10, Some(""), 0);
        assert_eq!(stats.label_count(), 0);
        assert_eq!(stats.call_count(), 1);
    }

    #[test]
    fn test_top_labels() {
        let stats = PointStatistics::new(MeasurementPoint::Custom1);
        stats.record(100, 100, Some("a"), 0);
        stats.record(100, 100, Some("a"), 0);
        stats.record(100, 100, Some("a"), 0);
        stats.record(500, 500, Some("b"), 0);
        stats.record(50, 50, Some("c"), 0);

        let by_total: Vec<_> = stats.top_labels_by_total_time(2).into_iter().map(|l| l.label).collect();
        assert_eq!(by_total, vec!["b", "a"]);

        let by_calls = stats.top_labels_by_call_count(1);
        assert_eq!(by_calls[0].label, "a");

        let by_max = stats.top_labels_by_max_time(3);
        assert_eq!(by_max[0].label, "b");
        assert_eq!(by_max.len(), 3);
    }

    #[test]
    fn test_reset_clears_everything() {
        let stats = PointStatistics::new(MeasurementPoint::Tick);
        stats.record(10, 10, Some("x"), 0);
        stats.reset();

        let snap = stats.snapshot(0);
        assert_eq!(snap.call_count, 0);
        assert_eq!(snap.min_micros, 0);
        assert_eq!(snap.rolling_1s.sample_count, 0);
        assert_eq!(snap.label_count, 0);
    }
}
