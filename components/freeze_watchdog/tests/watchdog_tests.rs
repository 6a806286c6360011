//! Watchdog loop behaviour against a hand-driven clock

use echo_types::{ManualClock, SnapshotContext};
use freeze_watchdog::{FreezeWatchdog, SnapshotSource, WatchdogConfig};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn fast_config() -> WatchdogConfig {
    WatchdogConfig {
        threshold_ms: 500,
        poll_interval_ms: 5,
        recheck_interval_ms: 5,
        max_history: 10,
    }
}

fn setup() -> (Arc<ManualClock>, FreezeWatchdog) {
    let clock = ManualClock::shared();
    let watchdog = FreezeWatchdog::with_config(clock.clone(), fast_config()).unwrap();
    (clock, watchdog)
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

/// Let the loop run several more polls
fn settle() {
    thread::sleep(Duration::from_millis(60));
}

#[derive(Debug)]
struct RenderingStack;

impl SnapshotSource for RenderingStack {
    fn stack_trace(&self) -> Vec<String> {
        vec!["Rendering (12.00ms)".to_string(), "Game Tick (40.00ms)".to_string()]
    }

    fn context(&self) -> SnapshotContext {
        let mut context = SnapshotContext::default();
        context.tick_phases.insert("Rendering".to_string(), 12.0);
        context
    }
}

#[derive(Debug, Default)]
struct FlakySource {
    broken: AtomicBool,
}

impl SnapshotSource for FlakySource {
    fn stack_trace(&self) -> Vec<String> {
        if self.broken.load(Ordering::SeqCst) {
            panic!("stack unavailable");
        }
        Vec::new()
    }

    fn context(&self) -> SnapshotContext {
        SnapshotContext::default()
    }
}

#[test]
fn test_one_snapshot_per_stall() {
    let (clock, watchdog) = setup();
    watchdog.start().unwrap();
    watchdog.heartbeat();

    clock.advance_millis(400);
    settle();
    assert_eq!(watchdog.total_freezes(), 0);

    clock.advance_millis(200);
    assert!(wait_until(|| watchdog.total_freezes() == 1));
    settle();
    assert_eq!(watchdog.total_freezes(), 1);

    // Still the same stall
    clock.advance_millis(2_000);
    settle();
    assert_eq!(watchdog.total_freezes(), 1);

    // Heartbeat resumes, then stalls again
    watchdog.heartbeat();
    clock.advance_millis(700);
    assert!(wait_until(|| watchdog.total_freezes() == 2));

    let history = watchdog.history();
    assert_eq!(history[0].freeze_duration_ms, 600);
    assert!(history[1].freeze_duration_ms >= 700);
    watchdog.stop();
}

#[test]
fn test_snapshot_carries_source_context() {
    let (clock, watchdog) = setup();
    watchdog.set_snapshot_source(Arc::new(RenderingStack));
    watchdog.start().unwrap();

    clock.advance_millis(1_000);
    assert!(wait_until(|| watchdog.latest().is_some()));

    let snapshot = watchdog.latest().unwrap();
    assert_eq!(snapshot.stack_trace[0], "Rendering (12.00ms)");
    assert_eq!(snapshot.context.tick_phases["Rendering"], 12.0);
    assert!(snapshot.has_context());
    watchdog.stop();
}

#[test]
fn test_panicking_source_does_not_kill_loop() {
    let (clock, watchdog) = setup();
    let source = Arc::new(FlakySource::default());
    source.broken.store(true, Ordering::SeqCst);
    watchdog.set_snapshot_source(source.clone());
    watchdog.start().unwrap();

    clock.advance_millis(600);
    settle();
    assert_eq!(watchdog.total_freezes(), 0);
    assert!(watchdog.is_running());

    source.broken.store(false, Ordering::SeqCst);
    watchdog.heartbeat();
    clock.advance_millis(600);
    assert!(wait_until(|| watchdog.total_freezes() == 1));
    watchdog.stop();
}

#[test]
fn test_start_stop_are_idempotent() {
    let (clock, watchdog) = setup();
    watchdog.stop();
    assert!(!watchdog.is_running());

    watchdog.start().unwrap();
    watchdog.start().unwrap();
    assert!(watchdog.is_running());
    assert_eq!(watchdog.last_heartbeat_age_ms(), Some(0));

    watchdog.stop();
    watchdog.stop();
    assert!(!watchdog.is_running());

    // A restarted watchdog detects stalls again
    watchdog.start().unwrap();
    clock.advance_millis(800);
    assert!(wait_until(|| watchdog.total_freezes() == 1));
}

#[test]
fn test_no_freeze_while_heartbeat_flows() {
    let (clock, watchdog) = setup();
    watchdog.start().unwrap();

    for _ in 0..50 {
        clock.advance_millis(16);
        watchdog.heartbeat();
        thread::sleep(Duration::from_millis(1));
    }

    assert_eq!(watchdog.ticks_received(), 50);
    assert_eq!(watchdog.total_freezes(), 0);
    watchdog.stop();
}

#[test]
fn test_reset_clears_history() {
    let (clock, watchdog) = setup();
    watchdog.start().unwrap();
    clock.advance_millis(600);
    assert!(wait_until(|| watchdog.total_freezes() == 1));

    watchdog.reset();
    assert!(watchdog.history().is_empty());
    assert_eq!(watchdog.total_freezes(), 0);
    assert!(watchdog.is_running());
}
