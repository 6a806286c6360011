//! Central statistics aggregator
//!
//! Every completed span ends up here: per-point totals, the tick histogram,
//! the spike log and the data-quality counters used by session scoring.

use echo_types::{MeasurementPoint, SharedClock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::histogram::TickHistogram;
use crate::point_stats::{LabelSummary, PointSnapshot, PointStatistics};
use crate::ranking::RankingCache;
use crate::spike_log::SpikeLog;

/// Non-fatal data-quality counters
#[derive(Debug, Default)]
pub struct DataQualityCounters {
    mismatch_count: AtomicU64,
    unmatched_pops: AtomicU64,
    dropped_frames: AtomicU64,
    orphaned_spans: AtomicU64,
    rejected_pushes: AtomicU64,
}

/// Copy of [`DataQualityCounters`]
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DataQualitySnapshot {
    pub mismatch_count: u64,
    pub unmatched_pops: u64,
    pub dropped_frames: u64,
    pub orphaned_spans: u64,
    pub rejected_pushes: u64,
}

impl DataQualityCounters {
    /// Pop whose point differed from the open span
    pub fn record_mismatch(&self) -> u64 {
        self.mismatch_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Pop against an empty stack
    pub fn record_unmatched_pop(&self) {
        self.unmatched_pops.fetch_add(1, Ordering::Relaxed);
    }

    /// Stale frames purged by the TTL guard
    pub fn record_dropped_frames(&self, count: u64) {
        self.dropped_frames.fetch_add(count, Ordering::Relaxed);
    }

    /// Spans discarded when profiling was disabled mid-flight
    pub fn record_orphaned_spans(&self, count: u64) {
        self.orphaned_spans.fetch_add(count, Ordering::Relaxed);
    }

    /// Push refused at the depth limit
    pub fn record_rejected_push(&self) {
        self.rejected_pushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mismatch_count(&self) -> u64 {
        self.mismatch_count.load(Ordering::Relaxed)
    }

    pub fn unmatched_pops(&self) -> u64 {
        self.unmatched_pops.load(Ordering::Relaxed)
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    pub fn orphaned_spans(&self) -> u64 {
        self.orphaned_spans.load(Ordering::Relaxed)
    }

    pub fn rejected_pushes(&self) -> u64 {
        self.rejected_pushes.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> DataQualitySnapshot {
        DataQualitySnapshot {
            mismatch_count: self.mismatch_count(),
            unmatched_pops: self.unmatched_pops(),
            dropped_frames: self.dropped_frames(),
            orphaned_spans: self.orphaned_spans(),
            rejected_pushes: self.rejected_pushes(),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.mismatch_count,
            &self.unmatched_pops,
            &self.dropped_frames,
            &self.orphaned_spans,
            &self.rejected_pushes,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Accumulates every completed sample for a session
#[derive(Debug)]
pub struct StatisticsAggregator {
    clock: SharedClock,
    points: Vec<PointStatistics>,
    histogram: TickHistogram,
    spikes: SpikeLog,
    quality: DataQualityCounters,
    by_total_time: RankingCache<PointSnapshot>,
    by_call_count: RankingCache<PointSnapshot>,
}

impl StatisticsAggregator {
    /// Create an empty aggregator
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            points: MeasurementPoint::ALL.iter().map(|&p| PointStatistics::new(p)).collect(),
            histogram: TickHistogram::new(),
            spikes: SpikeLog::new(),
            quality: DataQualityCounters::default(),
            by_total_time: RankingCache::new(),
            by_call_count: RankingCache::new(),
        }
    }

    /// Create an aggregator with a custom spike threshold
    pub fn with_spike_threshold(clock: SharedClock, threshold_ms: f64) -> Self {
        let aggregator = Self::new(clock);
        aggregator.spikes.set_threshold_ms(threshold_ms);
        aggregator
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Fold one completed measurement in
    ///
    /// `Tick` samples also feed the histogram; every sample is checked
    /// against the spike threshold.
    pub fn record(
        &self,
        point: MeasurementPoint,
        elapsed_micros: u64,
        self_micros: u64,
        label: Option<&str>,
    ) {
        let now_ms = self.clock.now_millis();
        self.points[point.index()].record(elapsed_micros, self_micros, label, now_ms);

        if point == MeasurementPoint::Tick {
            self.histogram.add_sample(elapsed_micros);
        }

        if self.spikes.log_spike(elapsed_micros, point, label) {
            debug!("Spike on {:?}: {} us", point, elapsed_micros);
        }
    }

    /// Live statistics for one point
    pub fn point(&self, point: MeasurementPoint) -> &PointStatistics {
        &self.points[point.index()]
    }

    pub fn snapshot(&self, point: MeasurementPoint) -> PointSnapshot {
        self.point(point).snapshot(self.clock.now_millis())
    }

    /// Snapshots of every point that has at least one sample
    pub fn snapshots(&self) -> Vec<PointSnapshot> {
        let now_ms = self.clock.now_millis();
        self.points
            .iter()
            .filter(|p| p.call_count() > 0)
            .map(|p| p.snapshot(now_ms))
            .collect()
    }

    /// Points ranked by cumulative time (cached for one second)
    pub fn top_by_total_time(&self, n: usize) -> Vec<PointSnapshot> {
        let now_ms = self.clock.now_millis();
        self.by_total_time.get_or_refresh(now_ms, n, || {
            let mut ranked = self.snapshots();
            ranked.sort_by(|a, b| b.total_micros.cmp(&a.total_micros).then(a.point.cmp(&b.point)));
            ranked
        })
    }

    /// Points ranked by call count (cached for one second)
    pub fn top_by_call_count(&self, n: usize) -> Vec<PointSnapshot> {
        let now_ms = self.clock.now_millis();
        self.by_call_count.get_or_refresh(now_ms, n, || {
            let mut ranked = self.snapshots();
            ranked.sort_by(|a, b| b.call_count.cmp(&a.call_count).then(a.point.cmp(&b.point)));
            ranked
        })
    }

    /// Labels across every point, ranked by cumulative time
    pub fn top_labels_by_total_time(&self, n: usize) -> Vec<LabelSummary> {
        let mut labels: Vec<LabelSummary> = self.points.iter().flat_map(|p| p.labels()).collect();
        labels.sort_by(|a, b| {
            b.total_micros
                .cmp(&a.total_micros)
                .then_with(|| a.label.cmp(&b.label))
        });
        labels.truncate(n);
        labels
    }

    pub fn histogram(&self) -> &TickHistogram {
        &self.histogram
    }

    pub fn spike_log(&self) -> &SpikeLog {
        &self.spikes
    }

    pub fn quality(&self) -> &DataQualityCounters {
        &self.quality
    }

    /// Number of tick samples recorded this session
    pub fn tick_samples(&self) -> u64 {
        self.point(MeasurementPoint::Tick).call_count()
    }

    /// Points other than `Tick` that have samples
    pub fn phase_samples(&self) -> u64 {
        self.points
            .iter()
            .filter(|p| p.point() != MeasurementPoint::Tick)
            .map(|p| p.call_count())
            .sum()
    }

    /// Distinct labels recorded across every point
    pub fn sub_timing_entries(&self) -> usize {
        self.points.iter().map(|p| p.label_count()).sum()
    }

    /// Clear all session data
    pub fn reset(&self) {
        for point in &self.points {
            point.reset();
        }
        self.histogram.reset();
        self.spikes.reset();
        self.quality.reset();
        self.by_total_time.invalidate();
        self.by_call_count.invalidate();
        debug!("Statistics aggregator reset");
    }
}
