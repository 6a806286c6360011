//! Timing aggregation for the Echo profiler
//!
//! Lock-free per-point statistics, rolling windows, a tick histogram, spike
//! log and cached top-N rankings.
//!
//! # Features
//!
//! - **StatisticsAggregator**: entry point that every completed span feeds
//! - **PointStatistics**: count/total/self/max/min + 1s/5s/60s rolling windows
//! - **TickHistogram**: tick-time distribution, percentiles and jank counts
//! - **SpikeLog**: bounded log of over-threshold samples
//! - **RankingCache**: one-second TTL cache for sorted top-N queries

mod aggregator;
mod histogram;
mod point_stats;
mod ranking;
mod spike_log;

pub use aggregator::{DataQualityCounters, DataQualitySnapshot, StatisticsAggregator};
pub use histogram::{HistogramSnapshot, TickHistogram};
pub use point_stats::{
    update_max, update_min, LabelStatistics, LabelSummary, PointSnapshot, PointStatistics,
    RollingStats, RollingWindow,
};
pub use ranking::RankingCache;
pub use spike_log::{SpikeEntry, SpikeLog, SpikeSummary};
