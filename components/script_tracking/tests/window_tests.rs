//! Trigger cooldown, window folding and sampling behaviour

use echo_types::{Clock, ManualClock, TriggerConfig, TriggerReason};
use pretty_assertions::assert_eq;
use script_tracking::{DetailedWindowManager, ScriptProfiler};
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_concurrent_triggers_open_one_window() {
    let clock = ManualClock::shared();
    clock.set_millis(10_000);
    let manager = Arc::new(DetailedWindowManager::new(clock.clone()));
    let threads = 16;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let manager = manager.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                let reason = TriggerReason::ALL[i % TriggerReason::ALL.len()];
                manager.trigger(reason)
            })
        })
        .collect();

    let opened = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .filter(|&opened| opened)
        .count();

    assert_eq!(opened, 1);
    assert_eq!(manager.windows_opened(), 1);
}

#[test]
fn test_retrigger_after_cooldown_folds_expired_window() {
    let clock = ManualClock::shared();
    let manager = DetailedWindowManager::new(clock.clone());

    assert!(manager.trigger(TriggerReason::SlowTick));
    let status = manager.status();
    assert_eq!(status.sample_rate, 4);
    assert_eq!(status.context_tag, "SLOW_TICK");
    assert_eq!(status.remaining_ms, 300);

    // Inside the default cooldown
    clock.set_millis(500);
    assert!(!manager.trigger(TriggerReason::SlowTick));

    clock.set_millis(1_500);
    assert!(manager.trigger(TriggerReason::SlowTick));
    assert_eq!(manager.total_active_ms(), 300);
    assert_eq!(manager.sample_rate(), 4);
    assert!(manager.is_active());
}

#[test]
fn test_short_cooldown_retrigger_at_500ms() {
    let clock = ManualClock::shared();
    let manager = DetailedWindowManager::with_config(clock.clone(), TriggerConfig::default(), 500);

    assert!(manager.trigger(TriggerReason::SlowTick));
    clock.set_millis(500);
    assert!(manager.trigger(TriggerReason::SlowTick));

    assert_eq!(manager.total_active_ms(), 300);
    assert_eq!(manager.windows_opened(), 2);
    assert_eq!(&*manager.context_tag(), "SLOW_TICK");
}

#[test]
fn test_windows_opened_counts_each_open_once() {
    let clock = ManualClock::shared();
    let manager = DetailedWindowManager::new(clock.clone());

    manager.trigger(TriggerReason::ContextMenu);
    manager.start_manual_capture(100);
    clock.advance_millis(2_000);
    manager.trigger(TriggerReason::UiBurst);

    assert_eq!(manager.windows_opened(), 3);
}

#[test]
fn test_untracked_calls_outside_window() {
    let clock = ManualClock::shared();
    let profiler = ScriptProfiler::new(clock.clone());

    for i in 0..1_000 {
        profiler.record_call_start("OnPlayerUpdate", i);
    }

    let counters = profiler.counters();
    assert_eq!(counters.untracked_calls, 1_000);
    assert_eq!(counters.tracked_calls, 0);
    assert!(profiler.tracker().is_empty());
}

#[test]
fn test_tracking_stops_when_window_expires() {
    let clock = ManualClock::shared();
    let profiler = ScriptProfiler::new(clock.clone());
    profiler.window().start_manual_capture(50);

    assert!(profiler.record_call_start("a", clock.now_nanos()));
    profiler.record_call_end(clock.now_nanos() + 1_000);

    clock.advance_millis(50);
    assert!(!profiler.record_call_start("b", clock.now_nanos()));
    profiler.on_tick_boundary();
    assert_eq!(profiler.window().total_active_ms(), 50);
}
