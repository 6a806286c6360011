//! Concurrency and session-level tests for the statistics aggregator

use echo_types::{ManualClock, MeasurementPoint};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::thread;
use timing_aggregate::StatisticsAggregator;

#[test]
fn test_concurrent_writers_keep_exact_totals() {
    let clock = ManualClock::shared();
    let aggregator = Arc::new(StatisticsAggregator::new(clock));

    let handles: Vec<_> = (0..8u64)
        .map(|t| {
            let aggregator = aggregator.clone();
            thread::spawn(move || {
                for i in 0..1_000u64 {
                    let label = if i % 2 == 0 { "even" } else { "odd" };
                    aggregator.record(MeasurementPoint::Simulation, t * 10 + 1, 1, Some(label));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stats = aggregator.point(MeasurementPoint::Simulation);
    assert_eq!(stats.call_count(), 8_000);
    assert_eq!(stats.max_micros(), 71);
    assert_eq!(stats.min_micros(), 1);
    assert_eq!(stats.self_micros(), 8_000);
    assert_eq!(stats.label("even").unwrap().call_count, 4_000);
    assert_eq!(stats.label("odd").unwrap().call_count, 4_000);
}

#[test]
fn test_rolling_windows_follow_the_clock() {
    let clock = ManualClock::shared();
    let aggregator = StatisticsAggregator::new(clock.clone());

    aggregator.record(MeasurementPoint::Frame, 1_000, 1_000, None);
    clock.advance_millis(2_000);
    aggregator.record(MeasurementPoint::Frame, 3_000, 3_000, None);

    let snap = aggregator.snapshot(MeasurementPoint::Frame);
    assert_eq!(snap.rolling_1s.sample_count, 1);
    assert_eq!(snap.rolling_1s.max_micros, 3_000);
    assert_eq!(snap.rolling_5s.sample_count, 2);
    assert_eq!(snap.rolling_5s.average_micros, 2_000.0);

    clock.advance_millis(61_000);
    let snap = aggregator.snapshot(MeasurementPoint::Frame);
    assert_eq!(snap.rolling_60s.sample_count, 0);
    assert_eq!(snap.call_count, 2);
}

#[test]
fn test_snapshot_serializes_to_json() {
    let aggregator = StatisticsAggregator::new(ManualClock::shared());
    aggregator.record(MeasurementPoint::Tick, 16_000, 4_000, None);

    let json = serde_json::to_value(aggregator.snapshot(MeasurementPoint::Tick)).unwrap();
    assert_eq!(json["point"], "TICK");
    assert_eq!(json["selfMicros"], 4_000);
    assert_eq!(json["rolling1s"]["sampleCount"], 1);
}

#[test]
fn test_quality_snapshot_lists_only_engine_counters() {
    let aggregator = StatisticsAggregator::new(ManualClock::shared());
    aggregator.quality().record_unmatched_pop();
    aggregator.quality().record_rejected_push();

    let json = serde_json::to_value(aggregator.quality().snapshot()).unwrap();
    let mut keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        vec!["droppedFrames", "mismatchCount", "orphanedSpans", "rejectedPushes", "unmatchedPops"]
    );
    assert_eq!(json["unmatchedPops"], 1);
    assert_eq!(json["rejectedPushes"], 1);
}
