//! Heartbeat watchdog loop
//!
//! The primary thread calls [`FreezeWatchdog::heartbeat`] once per tick. A
//! dedicated thread runs a current-thread tokio runtime that polls the
//! heartbeat age. One snapshot is taken per stall: after a capture the loop
//! waits for the heartbeat counter to move before it polls again.

use crate::source::{EmptySnapshotSource, MemoryProbe, NullMemoryProbe, SnapshotSource};
use crate::{Result, WatchdogConfig};
use echo_types::constants::{FREEZE_HEAVY_FUNCTIONS, FREEZE_STACK_LIMIT};
use echo_types::{wall_clock_millis, FreezeSnapshot, SharedClock};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::Notify;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

const THREAD_NAME: &str = "echo-freeze-watchdog";

/// State shared with the watchdog thread
#[derive(Debug)]
struct Shared {
    config: WatchdogConfig,
    clock: SharedClock,
    running: AtomicBool,
    last_heartbeat_ms: AtomicU64,
    ticks_received: AtomicU64,
    total_freezes: AtomicU64,
    history: Mutex<VecDeque<FreezeSnapshot>>,
    source: RwLock<Arc<dyn SnapshotSource>>,
    memory: RwLock<Arc<dyn MemoryProbe>>,
}

#[derive(Debug)]
struct Runner {
    handle: JoinHandle<()>,
    shutdown: Arc<Notify>,
}

/// Detects primary thread stalls from a missing heartbeat
#[derive(Debug)]
pub struct FreezeWatchdog {
    shared: Arc<Shared>,
    runner: Mutex<Option<Runner>>,
}

impl FreezeWatchdog {
    /// Watchdog with the default thresholds
    pub fn new(clock: SharedClock) -> Self {
        Self::build(clock, WatchdogConfig::default())
    }

    pub fn with_config(clock: SharedClock, config: WatchdogConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(clock, config))
    }

    fn build(clock: SharedClock, config: WatchdogConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                clock,
                running: AtomicBool::new(false),
                last_heartbeat_ms: AtomicU64::new(0),
                ticks_received: AtomicU64::new(0),
                total_freezes: AtomicU64::new(0),
                history: Mutex::new(VecDeque::with_capacity(config.max_history)),
                source: RwLock::new(Arc::new(EmptySnapshotSource)),
                memory: RwLock::new(Arc::new(NullMemoryProbe)),
            }),
            runner: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &WatchdogConfig {
        &self.shared.config
    }

    pub fn set_snapshot_source(&self, source: Arc<dyn SnapshotSource>) {
        *self.shared.source.write() = source;
    }

    pub fn set_memory_probe(&self, probe: Arc<dyn MemoryProbe>) {
        *self.shared.memory.write() = probe;
    }

    /// Start the polling thread; a no-op if already running
    pub fn start(&self) -> Result<()> {
        let mut runner = self.runner.lock();
        if self.shared.running.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.shared
            .last_heartbeat_ms
            .store(self.shared.clock.now_millis(), Ordering::Release);

        let shared = Arc::clone(&self.shared);
        let shutdown = Arc::new(Notify::new());
        let loop_shutdown = Arc::clone(&shutdown);
        let spawned = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || run(shared, loop_shutdown));

        match spawned {
            Ok(handle) => {
                *runner = Some(Runner { handle, shutdown });
                info!(
                    "Freeze watchdog started (threshold={}ms, poll={}ms)",
                    self.shared.config.threshold_ms, self.shared.config.poll_interval_ms
                );
                Ok(())
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::Release);
                error!("Failed to spawn freeze watchdog: {}", e);
                Err(e.into())
            }
        }
    }

    /// Signal the loop to exit and wait for its thread; a no-op if stopped
    pub fn stop(&self) {
        let runner = self.runner.lock().take();
        if !self.shared.running.swap(false, Ordering::AcqRel) && runner.is_none() {
            return;
        }

        if let Some(runner) = runner {
            runner.shutdown.notify_one();
            if runner.handle.join().is_err() {
                error!("Freeze watchdog thread panicked");
            }
        }
        info!("Freeze watchdog stopped");
    }

    /// Liveness signal from the primary thread; ignored while stopped
    pub fn heartbeat(&self) {
        if !self.shared.running.load(Ordering::Acquire) {
            return;
        }
        self.shared
            .last_heartbeat_ms
            .store(self.shared.clock.now_millis(), Ordering::Release);
        self.shared.ticks_received.fetch_add(1, Ordering::AcqRel);
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Heartbeats received while running
    pub fn ticks_received(&self) -> u64 {
        self.shared.ticks_received.load(Ordering::Acquire)
    }

    /// Freezes detected, including ones evicted from the history
    pub fn total_freezes(&self) -> u64 {
        self.shared.total_freezes.load(Ordering::Acquire)
    }

    /// Age of the last heartbeat; `None` while stopped
    pub fn last_heartbeat_age_ms(&self) -> Option<u64> {
        self.is_running().then(|| self.shared.heartbeat_age_ms())
    }

    /// Recent snapshots, oldest first
    pub fn history(&self) -> Vec<FreezeSnapshot> {
        self.shared.history.lock().iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<FreezeSnapshot> {
        self.shared.history.lock().back().cloned()
    }

    /// Clear the history and counters; the loop keeps running
    pub fn reset(&self) {
        self.shared.history.lock().clear();
        self.shared.total_freezes.store(0, Ordering::Release);
        self.shared.ticks_received.store(0, Ordering::Release);
        self.shared
            .last_heartbeat_ms
            .store(self.shared.clock.now_millis(), Ordering::Release);
    }
}

impl Drop for FreezeWatchdog {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Shared {
    fn heartbeat_age_ms(&self) -> u64 {
        self.clock
            .now_millis()
            .saturating_sub(self.last_heartbeat_ms.load(Ordering::Acquire))
    }

    fn on_freeze(&self, stalled_ms: u64) {
        warn!("Freeze detected: primary thread stalled for {}ms", stalled_ms);

        match panic::catch_unwind(AssertUnwindSafe(|| self.capture(stalled_ms))) {
            Ok(snapshot) => {
                let mut history = self.history.lock();
                while history.len() >= self.config.max_history {
                    history.pop_front();
                }
                history.push_back(snapshot);
                self.total_freezes.fetch_add(1, Ordering::AcqRel);
            }
            Err(_) => error!("Freeze snapshot capture panicked; continuing"),
        }
    }

    fn capture(&self, stalled_ms: u64) -> FreezeSnapshot {
        let source = self.source.read().clone();
        let memory = self.memory.read().clone();

        let mut stack_trace = source.stack_trace();
        stack_trace.truncate(FREEZE_STACK_LIMIT);
        let mut context = source.context();
        context.heavy_functions.truncate(FREEZE_HEAVY_FUNCTIONS);

        FreezeSnapshot {
            timestamp_ms: wall_clock_millis(),
            freeze_duration_ms: stalled_ms,
            memory: memory.sample(),
            stack_trace,
            context,
        }
    }
}

/// Thread entry: drive the loop on a private current-thread runtime
fn run(shared: Arc<Shared>, shutdown: Arc<Notify>) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Freeze watchdog runtime failed to start: {}", e);
            shared.running.store(false, Ordering::Release);
            return;
        }
    };
    runtime.block_on(watch(shared, shutdown));
}

async fn watch(shared: Arc<Shared>, shutdown: Arc<Notify>) {
    let poll = shared.config.poll_interval();
    let recheck = shared.config.recheck_interval();

    loop {
        tokio::select! {
            _ = sleep(poll) => {}
            _ = shutdown.notified() => break,
        }
        if !shared.running.load(Ordering::Acquire) {
            break;
        }

        let ticks = shared.ticks_received.load(Ordering::Acquire);
        let stalled_ms = shared.heartbeat_age_ms();
        if stalled_ms < shared.config.threshold_ms {
            continue;
        }

        shared.on_freeze(stalled_ms);

        // Same stall: wait for the heartbeat to move before polling again
        while shared.ticks_received.load(Ordering::Acquire) == ticks {
            tokio::select! {
                _ = sleep(recheck) => {}
                _ = shutdown.notified() => return,
            }
            if !shared.running.load(Ordering::Acquire) {
                return;
            }
        }
        debug!("Heartbeat resumed after freeze");
    }
}
