//! Sampled script call profiling
//!
//! Glues the sampling gate (an active detailed window plus a 1-in-N counter)
//! to the [`CallTracker`] and accumulates per-function statistics.

use dashmap::DashMap;
use echo_types::SharedClock;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use timing_aggregate::{update_max, RankingCache};
use tracing::{debug, trace};

use crate::call_tracker::{CallResult, CallTracker};
use crate::window::{DetailedWindowManager, DEFAULT_CONTEXT_TAG};

/// Accumulated statistics for one script function
#[derive(Debug)]
pub struct FunctionStats {
    call_count: AtomicU64,
    total_micros: AtomicU64,
    self_micros: AtomicU64,
    max_micros: AtomicU64,
    context: RwLock<Arc<str>>,
}

impl Default for FunctionStats {
    fn default() -> Self {
        Self {
            call_count: AtomicU64::new(0),
            total_micros: AtomicU64::new(0),
            self_micros: AtomicU64::new(0),
            max_micros: AtomicU64::new(0),
            context: RwLock::new(Arc::from(DEFAULT_CONTEXT_TAG)),
        }
    }
}

impl FunctionStats {
    fn record(&self, total_micros: u64, self_micros: u64, context: &Arc<str>) {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.total_micros.fetch_add(total_micros, Ordering::Relaxed);
        self.self_micros.fetch_add(self_micros, Ordering::Relaxed);
        update_max(&self.max_micros, total_micros);
        if !context.is_empty() {
            *self.context.write() = Arc::clone(context);
        }
    }

    fn summary(&self, name: &str) -> FunctionSummary {
        let call_count = self.call_count.load(Ordering::Relaxed);
        let total_micros = self.total_micros.load(Ordering::Relaxed);
        FunctionSummary {
            name: name.to_owned(),
            call_count,
            total_micros,
            self_micros: self.self_micros.load(Ordering::Relaxed),
            max_micros: self.max_micros.load(Ordering::Relaxed),
            average_micros: if call_count == 0 {
                0.0
            } else {
                total_micros as f64 / call_count as f64
            },
            context: self.context.read().to_string(),
        }
    }
}

/// Copy of one function's statistics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSummary {
    pub name: String,
    pub call_count: u64,
    pub total_micros: u64,
    pub self_micros: u64,
    pub max_micros: u64,
    pub average_micros: f64,
    /// Context tag of the most recent tracked call
    pub context: String,
}

/// Script tracking counters
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScriptCounters {
    pub total_calls: u64,
    pub tracked_calls: u64,
    pub untracked_calls: u64,
    /// Tracked starts refused at the depth limit
    pub dropped_calls: u64,
    pub dropped_frames: u64,
    pub stack_resets: u64,
    pub total_time_micros: u64,
    pub tracking_rate_percent: f64,
}

/// Sampled script call profiler
#[derive(Debug)]
pub struct ScriptProfiler {
    clock: SharedClock,
    window: DetailedWindowManager,
    tracker: CallTracker,
    functions: DashMap<Arc<str>, FunctionStats>,
    contexts: DashMap<Arc<str>, AtomicU64>,
    total_calls: AtomicU64,
    tracked_calls: AtomicU64,
    untracked_calls: AtomicU64,
    dropped_calls: AtomicU64,
    total_time_micros: AtomicU64,
    by_time: RankingCache<FunctionSummary>,
    by_calls: RankingCache<FunctionSummary>,
}

impl ScriptProfiler {
    /// Profiler with a default window manager on `clock`
    pub fn new(clock: SharedClock) -> Self {
        let window = DetailedWindowManager::new(clock.clone());
        Self::with_window(clock, window)
    }

    pub fn with_window(clock: SharedClock, window: DetailedWindowManager) -> Self {
        Self {
            clock,
            window,
            tracker: CallTracker::new(),
            functions: DashMap::new(),
            contexts: DashMap::new(),
            total_calls: AtomicU64::new(0),
            tracked_calls: AtomicU64::new(0),
            untracked_calls: AtomicU64::new(0),
            dropped_calls: AtomicU64::new(0),
            total_time_micros: AtomicU64::new(0),
            by_time: RankingCache::new(),
            by_calls: RankingCache::new(),
        }
    }

    pub fn window(&self) -> &DetailedWindowManager {
        &self.window
    }

    pub fn tracker(&self) -> &CallTracker {
        &self.tracker
    }

    /// Register the calling thread as the primary thread
    pub fn set_primary_thread(&self) {
        self.tracker.set_primary_thread();
    }

    /// A script call is starting; returns whether it is being tracked
    ///
    /// Untracked calls are the common case and are only counted.
    pub fn record_call_start(&self, name: &str, start_nanos: u64) -> bool {
        self.total_calls.fetch_add(1, Ordering::Relaxed);

        let sample = self.tracker.next_sample();
        if !self.window.should_sample(sample) {
            self.untracked_calls.fetch_add(1, Ordering::Relaxed);
            trace!("Script call {} not sampled", name);
            return false;
        }

        if self
            .tracker
            .record_start(Arc::from(name), self.window.context_tag(), start_nanos)
        {
            self.tracked_calls.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            self.dropped_calls.fetch_add(1, Ordering::Relaxed);
            debug!("Script call {} dropped at max depth", name);
            false
        }
    }

    /// A script call ended; `None` if its start was not tracked
    pub fn record_call_end(&self, end_nanos: u64) -> Option<CallResult> {
        let result = self.tracker.record_end(end_nanos)?;

        self.with_function(&result.name, |stats| {
            stats.record(result.elapsed_micros, result.self_micros, &result.context_tag)
        });
        self.total_time_micros
            .fetch_add(result.elapsed_micros, Ordering::Relaxed);
        self.with_context(&result.context_tag, |total| {
            total.fetch_add(result.elapsed_micros, Ordering::Relaxed)
        });

        Some(result)
    }

    // Read guards are released before falling back to insertion
    fn with_function<R>(&self, name: &Arc<str>, f: impl FnOnce(&FunctionStats) -> R) -> R {
        if let Some(stats) = self.functions.get(name) {
            return f(&stats);
        }
        let stats = self.functions.entry(Arc::clone(name)).or_default();
        f(&stats)
    }

    fn with_context<R>(&self, tag: &Arc<str>, f: impl FnOnce(&AtomicU64) -> R) -> R {
        if let Some(total) = self.contexts.get(tag) {
            return f(&total);
        }
        let total = self.contexts.entry(Arc::clone(tag)).or_default();
        f(&total)
    }

    /// Advance the script frame id and fold expired window time
    pub fn on_tick_boundary(&self) -> u64 {
        self.window.on_tick_boundary();
        self.tracker.on_tick_boundary()
    }

    pub fn function(&self, name: &str) -> Option<FunctionSummary> {
        self.functions.get(name).map(|stats| stats.summary(name))
    }

    pub fn functions(&self) -> Vec<FunctionSummary> {
        self.functions
            .iter()
            .map(|entry| entry.value().summary(entry.key()))
            .collect()
    }

    /// Functions ranked by cumulative time (cached for one second)
    pub fn top_functions_by_time(&self, n: usize) -> Vec<FunctionSummary> {
        self.by_time.get_or_refresh(self.clock.now_millis(), n, || {
            let mut all = self.functions();
            all.sort_by(|a, b| b.total_micros.cmp(&a.total_micros).then_with(|| a.name.cmp(&b.name)));
            all
        })
    }

    /// Functions ranked by call count (cached for one second)
    pub fn top_functions_by_calls(&self, n: usize) -> Vec<FunctionSummary> {
        self.by_calls.get_or_refresh(self.clock.now_millis(), n, || {
            let mut all = self.functions();
            all.sort_by(|a, b| b.call_count.cmp(&a.call_count).then_with(|| a.name.cmp(&b.name)));
            all
        })
    }

    /// Tracked time per context tag, in microseconds
    pub fn context_totals(&self) -> BTreeMap<String, u64> {
        self.contexts
            .iter()
            .map(|entry| (entry.key().to_string(), entry.value().load(Ordering::Relaxed)))
            .collect()
    }

    pub fn counters(&self) -> ScriptCounters {
        let total_calls = self.total_calls.load(Ordering::Relaxed);
        let tracked_calls = self.tracked_calls.load(Ordering::Relaxed);
        ScriptCounters {
            total_calls,
            tracked_calls,
            untracked_calls: self.untracked_calls.load(Ordering::Relaxed),
            dropped_calls: self.dropped_calls.load(Ordering::Relaxed),
            dropped_frames: self.tracker.dropped_frames(),
            stack_resets: self.tracker.stack_resets(),
            total_time_micros: self.total_time_micros.load(Ordering::Relaxed),
            tracking_rate_percent: if total_calls == 0 {
                0.0
            } else {
                tracked_calls as f64 * 100.0 / total_calls as f64
            },
        }
    }

    /// Clear statistics, stacks and window state
    pub fn reset(&self) {
        self.functions.clear();
        self.contexts.clear();
        for counter in [
            &self.total_calls,
            &self.tracked_calls,
            &self.untracked_calls,
            &self.dropped_calls,
            &self.total_time_micros,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.tracker.reset_all();
        self.window.reset();
        self.by_time.invalidate();
        self.by_calls.invalidate();
    }
}
