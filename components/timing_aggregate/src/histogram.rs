//! Tick duration histogram
//!
//! Fixed millisecond buckets for the distribution, plus a ring of the most
//! recent samples so that percentiles are exact once enough ticks exist.

use echo_types::constants::{
    DEFAULT_HISTOGRAM_BUCKETS_MS, HISTOGRAM_SAMPLE_BUFFER, JANK_THRESHOLD_30FPS_MICROS,
    JANK_THRESHOLD_60FPS_MICROS,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Minimum recent samples before percentiles stop interpolating buckets
const EXACT_PERCENTILE_MIN_SAMPLES: usize = 10;

#[derive(Debug)]
struct RecentSamples {
    buf: Vec<u64>,
    next: usize,
}

impl RecentSamples {
    fn push(&mut self, value: u64) {
        if self.buf.len() < HISTOGRAM_SAMPLE_BUFFER {
            self.buf.push(value);
        } else {
            self.buf[self.next] = value;
        }
        self.next = (self.next + 1) % HISTOGRAM_SAMPLE_BUFFER;
    }
}

/// Serializable view of the histogram
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistogramSnapshot {
    pub buckets_ms: Vec<f64>,
    pub labels: Vec<String>,
    pub counts: Vec<u64>,
    pub total_samples: u64,
    pub average_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub jank_count_60fps: u64,
    pub jank_count_30fps: u64,
    pub jank_percent_60fps: f64,
    pub jank_percent_30fps: f64,
}

/// Distribution of tick durations
#[derive(Debug)]
pub struct TickHistogram {
    buckets_ms: Vec<f64>,
    counts: Vec<AtomicU64>,
    total_samples: AtomicU64,
    sum_micros: AtomicU64,
    jank_60: AtomicU64,
    jank_30: AtomicU64,
    recent: Mutex<RecentSamples>,
}

impl TickHistogram {
    /// Histogram with the default tick buckets
    pub fn new() -> Self {
        Self::with_buckets(&DEFAULT_HISTOGRAM_BUCKETS_MS)
    }

    /// Histogram with custom bucket lower bounds (ascending, first should be 0)
    pub fn with_buckets(buckets_ms: &[f64]) -> Self {
        let buckets_ms = if buckets_ms.is_empty() {
            vec![0.0]
        } else {
            buckets_ms.to_vec()
        };
        let counts = buckets_ms.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets_ms,
            counts,
            total_samples: AtomicU64::new(0),
            sum_micros: AtomicU64::new(0),
            jank_60: AtomicU64::new(0),
            jank_30: AtomicU64::new(0),
            recent: Mutex::new(RecentSamples {
                buf: Vec::with_capacity(HISTOGRAM_SAMPLE_BUFFER),
                next: 0,
            }),
        }
    }

    /// Record one tick duration
    pub fn add_sample(&self, duration_micros: u64) {
        let duration_ms = duration_micros as f64 / 1000.0;
        self.counts[self.bucket_index(duration_ms)].fetch_add(1, Ordering::Relaxed);
        self.total_samples.fetch_add(1, Ordering::Relaxed);
        self.sum_micros.fetch_add(duration_micros, Ordering::Relaxed);

        if duration_micros > JANK_THRESHOLD_60FPS_MICROS {
            self.jank_60.fetch_add(1, Ordering::Relaxed);
        }
        if duration_micros > JANK_THRESHOLD_30FPS_MICROS {
            self.jank_30.fetch_add(1, Ordering::Relaxed);
        }

        self.recent.lock().push(duration_micros);
    }

    fn bucket_index(&self, duration_ms: f64) -> usize {
        self.buckets_ms
            .iter()
            .rposition(|&lower| duration_ms >= lower)
            .unwrap_or(0)
    }

    pub fn buckets_ms(&self) -> &[f64] {
        &self.buckets_ms
    }

    pub fn counts(&self) -> Vec<u64> {
        self.counts.iter().map(|c| c.load(Ordering::Relaxed)).collect()
    }

    pub fn total_samples(&self) -> u64 {
        self.total_samples.load(Ordering::Relaxed)
    }

    pub fn average_ms(&self) -> f64 {
        let total = self.total_samples();
        if total == 0 {
            return 0.0;
        }
        self.sum_micros.load(Ordering::Relaxed) as f64 / 1000.0 / total as f64
    }

    /// Percentile in milliseconds (0..=100)
    pub fn percentile(&self, percentile: f64) -> f64 {
        let total = self.total_samples();
        if total == 0 {
            return 0.0;
        }

        {
            let recent = self.recent.lock();
            let n = recent.buf.len();
            if n >= EXACT_PERCENTILE_MIN_SAMPLES {
                let mut sorted = recent.buf.clone();
                drop(recent);
                sorted.sort_unstable();
                let rank = (percentile * n as f64 / 100.0).ceil() as i64 - 1;
                let index = rank.clamp(0, n as i64 - 1) as usize;
                return sorted[index] as f64 / 1000.0;
            }
        }

        self.interpolated_percentile(total, percentile)
    }

    fn interpolated_percentile(&self, total: u64, percentile: f64) -> f64 {
        let target = (total as f64 * percentile / 100.0) as u64;
        let counts = self.counts();
        let last = counts.len() - 1;
        let mut cumulative = 0u64;

        for (i, &count) in counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                if i == last {
                    return self.buckets_ms[i];
                }
                let start = self.buckets_ms[i];
                let end = self.buckets_ms[i + 1];
                let previous = cumulative - count;
                let fraction = if count > 0 {
                    (target - previous) as f64 / count as f64
                } else {
                    0.5
                };
                return start + fraction * (end - start);
            }
        }

        self.buckets_ms[last]
    }

    pub fn p50(&self) -> f64 {
        self.percentile(50.0)
    }

    pub fn p95(&self) -> f64 {
        self.percentile(95.0)
    }

    pub fn p99(&self) -> f64 {
        self.percentile(99.0)
    }

    /// Ticks slower than one 60 fps frame
    pub fn jank_count_60fps(&self) -> u64 {
        self.jank_60.load(Ordering::Relaxed)
    }

    /// Ticks slower than one 30 fps frame
    pub fn jank_count_30fps(&self) -> u64 {
        self.jank_30.load(Ordering::Relaxed)
    }

    fn percent_of_total(&self, count: u64) -> f64 {
        let total = self.total_samples();
        if total == 0 {
            0.0
        } else {
            count as f64 * 100.0 / total as f64
        }
    }

    pub fn jank_percent_60fps(&self) -> f64 {
        self.percent_of_total(self.jank_count_60fps())
    }

    pub fn jank_percent_30fps(&self) -> f64 {
        self.percent_of_total(self.jank_count_30fps())
    }

    /// Human bucket labels such as `"16.7-20.0ms"` and `">=200.0ms"`
    pub fn bucket_labels(&self) -> Vec<String> {
        self.buckets_ms
            .iter()
            .enumerate()
            .map(|(i, lower)| match self.buckets_ms.get(i + 1) {
                Some(upper) => format!("{:.1}-{:.1}ms", lower, upper),
                None => format!(">={:.1}ms", lower),
            })
            .collect()
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        HistogramSnapshot {
            buckets_ms: self.buckets_ms.clone(),
            labels: self.bucket_labels(),
            counts: self.counts(),
            total_samples: self.total_samples(),
            average_ms: self.average_ms(),
            p50_ms: self.p50(),
            p95_ms: self.p95(),
            p99_ms: self.p99(),
            jank_count_60fps: self.jank_count_60fps(),
            jank_count_30fps: self.jank_count_30fps(),
            jank_percent_60fps: self.jank_percent_60fps(),
            jank_percent_30fps: self.jank_percent_30fps(),
        }
    }

    pub fn reset(&self) {
        for count in &self.counts {
            count.store(0, Ordering::Relaxed);
        }
        self.total_samples.store(0, Ordering::Relaxed);
        self.sum_micros.store(0, Ordering::Relaxed);
        self.jank_60.store(0, Ordering::Relaxed);
        self.jank_30.store(0, Ordering::Relaxed);
        let mut recent = self.recent.lock();
        recent.buf.clear();
        recent.next = 0;
    }
}

impl Default for TickHistogram {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_assignment() {
        let histogram = TickHistogram::new();
        histogram.add_sample(0);
        histogram.add_sample(4_999);
        histogram.add_sample(16_670);
        histogram.add_sample(250_000);

        let counts = histogram.counts();
        assert_eq!(counts[0], 2);
        assert_eq!(counts[3], 1);
        assert_eq!(counts[8], 1);
        assert_eq!(histogram.total_samples(), 4);
    }

    #[test]
    fn test_exact_percentiles_with_enough_samples() {
        let histogram = TickHistogram::new();
        for ms in 1..=100u64 {
            histogram.add_sample(ms * 1000);
        }
        assert_eq!(histogram.p50(), 50.0);
        assert_eq!(histogram.p95(), 95.0);
        assert_eq!(histogram.p99(), 99.0);
        assert_eq!(histogram.average_ms(), 50.5);
    }

    #[test]
    fn test_interpolated_percentile_with_few_samples() {
        let histogram = TickHistogram::new();
        // Two samples in the 10-16.67ms bucket
        histogram.add_sample(12_000);
        histogram.add_sample(13_000);

        // target = 1 of 2 in the bucket => halfway between 10 and 16.67
        let p50 = histogram.p50();
        assert!((p50 - 13.335).abs() < 1e-9, "p50 was {}", p50);
    }

    #[test]
    fn test_ring_keeps_most_recent_samples() {
        let histogram = TickHistogram::new();
        for _ in 0..HISTOGRAM_SAMPLE_BUFFER {
            histogram.add_sample(1_000);
        }
        for _ in 0..HISTOGRAM_SAMPLE_BUFFER {
            histogram.add_sample(9_000);
        }
        assert_eq!(histogram.p50(), 9.0);
        assert_eq!(histogram.total_samples(), 2 * HISTOGRAM_SAMPLE_BUFFER as u64);
    }

    #[test]
    fn test_jank_counts() {
        let histogram = TickHistogram::new();
        histogram.add_sample(16_667);
        histogram.add_sample(16_668);
        histogram.add_sample(40_000);
        histogram.add_sample(1_000);

        assert_eq!(histogram.jank_count_60fps(), 2);
        assert_eq!(histogram.jank_count_30fps(), 1);
        assert_eq!(histogram.jank_percent_60fps(), 50.0);
        assert_eq!(histogram.jank_percent_30fps(), 25.0);
    }

    #[test]
    fn test_empty_histogram() {
        let histogram = TickHistogram::new();
        assert_eq!(histogram.p99(), 0.0);
        assert_eq!(histogram.average_ms(), 0.0);
        assert_eq!(histogram.jank_percent_60fps(), 0.0);
    }

    #[test]
    fn test_labels_and_reset() {
        let histogram = TickHistogram::new();
        let labels = histogram.bucket_labels();
        assert_eq!(labels[0], "0.0-5.0ms");
        assert_eq!(labels[8], ">=200.0ms");

        histogram.add_sample(50_000);
        histogram.reset();
        let snap = histogram.snapshot();
        assert_eq!(snap.total_samples, 0);
        assert!(snap.counts.iter().all(|&c| c == 0));
    }
}
