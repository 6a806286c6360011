//! Push/pop instrumentation engine
//!
//! The host calls [`Profiler::push`]/[`Profiler::pop`] (or uses a
//! [`ScopeGuard`]) around measured regions. Every completed span is handed to
//! the [`StatisticsAggregator`] with its total and exclusive time.
//!
//! Nothing here ever fails loudly: filtered pushes return `None`, and
//! unbalanced pops are counted as data-quality signals.

use echo_types::constants::FRAME_TTL_NANOS;
use echo_types::{Category, MeasurementPoint, SharedClock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use timing_aggregate::StatisticsAggregator;
use tracing::{debug, info, warn};

use crate::per_thread::PerThread;
use crate::scope::{ScopeGuard, ScopePool};
use crate::stack::{ActiveSpan, CompletedSpan, Span, SpanId, SpanStack, StackFrame};

/// Span stack and label pool owned by one thread
#[derive(Debug, Default)]
struct ThreadSpans {
    stack: SpanStack<Span>,
    pool: ScopePool,
    /// Subsystem time completed since the last `Tick` push
    tick_phases: BTreeMap<MeasurementPoint, u64>,
}

impl ThreadSpans {
    fn recycle(&mut self, span: &mut Span) {
        if let Some(label) = span.take_label() {
            self.pool.release(label);
        }
    }

    /// Drop every open span, returning how many there were
    fn drain(&mut self) -> usize {
        self.tick_phases.clear();
        let mut drained = self.stack.drain();
        for span in &mut drained {
            self.recycle(span);
        }
        drained.len()
    }
}

/// Label pool counters for the calling thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub available: usize,
    pub capacity: usize,
    pub fresh_allocations: u64,
    pub reused: u64,
}

fn mismatch_message(expected: MeasurementPoint, found: MeasurementPoint) -> String {
    format!("Stack mismatch: expected {:?}, got {:?}", expected, found)
}

/// Hierarchical span profiler
#[derive(Debug)]
pub struct Profiler {
    clock: SharedClock,
    aggregator: Arc<StatisticsAggregator>,
    enabled: AtomicBool,
    script_profiling_enabled: AtomicBool,
    debug_mode: AtomicBool,
    mismatch_reported: AtomicBool,
    next_span_id: AtomicU64,
    threads: PerThread<ThreadSpans>,
}

impl Profiler {
    /// Create a disabled profiler feeding `aggregator`
    pub fn new(clock: SharedClock, aggregator: Arc<StatisticsAggregator>) -> Self {
        Self {
            clock,
            aggregator,
            enabled: AtomicBool::new(false),
            script_profiling_enabled: AtomicBool::new(false),
            debug_mode: AtomicBool::new(false),
            mismatch_reported: AtomicBool::new(false),
            next_span_id: AtomicU64::new(1),
            threads: PerThread::new(),
        }
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn aggregator(&self) -> &Arc<StatisticsAggregator> {
        &self.aggregator
    }

    // ========================================================================
    // Control
    // ========================================================================

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
        info!("Profiler enabled");
    }

    /// Stop profiling and drop every open span on every thread
    ///
    /// Returns the number of orphaned spans.
    pub fn disable(&self) -> usize {
        self.enabled.store(false, Ordering::SeqCst);

        let mut orphaned = 0;
        self.threads.drain_and_clear(|spans| orphaned += spans.drain());

        if orphaned > 0 {
            warn!("{} orphaned spans cleared on disable", orphaned);
            self.aggregator.quality().record_orphaned_spans(orphaned as u64);
        }
        info!("Profiler disabled");
        orphaned
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_script_profiling(&self, enabled: bool) {
        self.script_profiling_enabled.store(enabled, Ordering::SeqCst);
        info!(
            "Script profiling {}",
            if enabled { "enabled" } else { "disabled" }
        );
    }

    pub fn is_script_profiling_enabled(&self) -> bool {
        self.script_profiling_enabled.load(Ordering::Relaxed)
    }

    /// Log every stack anomaly instead of only the first per session
    pub fn set_debug_mode(&self, debug_mode: bool) {
        self.debug_mode.store(debug_mode, Ordering::Relaxed);
    }

    /// Register the calling thread as the primary thread
    pub fn set_primary_thread(&self) {
        let id = thread::current().id();
        self.threads.set_primary(id);
        debug!("Primary thread set: {:?}", id);
    }

    pub fn is_primary_thread(&self) -> bool {
        self.threads.is_primary(thread::current().id())
    }

    /// Clear aggregated statistics and forget idle worker threads
    ///
    /// Open spans are left alone.
    pub fn reset(&self) {
        self.aggregator.reset();
        self.threads.retain_others(|spans| !spans.stack.is_empty());
        self.mismatch_reported.store(false, Ordering::SeqCst);
    }

    fn accepts(&self, point: MeasurementPoint) -> bool {
        self.is_enabled() && (!point.is_script_related() || self.is_script_profiling_enabled())
    }

    fn report_anomaly(&self, message: std::fmt::Arguments<'_>) {
        if self.debug_mode.load(Ordering::Relaxed)
            || !self.mismatch_reported.swap(true, Ordering::Relaxed)
        {
            warn!("{}", message);
        } else {
            debug!("{}", message);
        }
    }

    // ========================================================================
    // Push / pop
    // ========================================================================

    /// Open a span on the calling thread's stack
    ///
    /// Returns `None` when the point is filtered (profiling or script
    /// profiling disabled) or when the stack is at its depth limit.
    pub fn push(&self, point: MeasurementPoint, label: Option<&str>) -> Option<SpanId> {
        if !self.accepts(point) {
            return None;
        }

        let now = self.clock.now_nanos();
        let id = SpanId(self.next_span_id.fetch_add(1, Ordering::Relaxed));

        self.threads.with(|spans| {
            if point == MeasurementPoint::Tick {
                spans.tick_phases.clear();
            }
            let label = label.map(|l| spans.pool.acquire(l));
            let span = Span::new(id, point, label, now);
            self.push_span(spans, span, now)
        })
    }

    fn push_span(&self, spans: &mut ThreadSpans, span: Span, now: u64) -> Option<SpanId> {
        let id = span.id();
        if spans.stack.is_full() {
            let mut stale = spans.stack.purge_stale(now, FRAME_TTL_NANOS);
            if !stale.is_empty() {
                warn!("Purged {} stale spans at depth limit", stale.len());
                self.aggregator.quality().record_dropped_frames(stale.len() as u64);
                for span in &mut stale {
                    spans.recycle(span);
                }
            }
        }

        match spans.stack.push(span) {
            Ok(()) => Some(id),
            Err(mut rejected) => {
                debug!("Push of {:?} rejected at max depth", rejected.point());
                self.aggregator.quality().record_rejected_push();
                spans.recycle(&mut rejected);
                None
            }
        }
    }

    /// Close the innermost span on the calling thread's stack
    ///
    /// An empty stack is tolerated. If the innermost span belongs to a
    /// different point the mismatch is counted and the popped span's own
    /// point is recorded.
    pub fn pop(&self, point: MeasurementPoint) -> Option<CompletedSpan> {
        if !self.accepts(point) {
            return None;
        }

        let now = self.clock.now_nanos();
        let completed = self.threads.with(|spans| {
            let mut popped = spans.stack.pop_completed(now)?;
            let span = &mut popped.frame;

            if span.point() != point {
                self.aggregator.quality().record_mismatch();
                self.report_anomaly(format_args!("{}", mismatch_message(point, span.point())));
            }

            let completed = CompletedSpan {
                id: span.id(),
                point: span.point(),
                elapsed_nanos: popped.elapsed_nanos,
                self_nanos: popped.self_nanos,
            };
            if completed.point.category() == Category::Subsystem {
                *spans.tick_phases.entry(completed.point).or_default() += completed.elapsed_nanos;
            }
            self.aggregator.record(
                completed.point,
                completed.elapsed_micros(),
                completed.self_micros(),
                span.label(),
            );
            spans.recycle(span);
            Some(completed)
        });

        if completed.is_none() {
            self.aggregator.quality().record_unmatched_pop();
            self.report_anomaly(format_args!("Unmatched pop for {:?}", point));
        }
        completed
    }

    /// Push and return a guard that pops on drop
    pub fn scope(&self, point: MeasurementPoint) -> ScopeGuard<'_> {
        let tracked = self.push(point, None).is_some();
        ScopeGuard::new(self, point, tracked)
    }

    /// Labeled variant of [`Profiler::scope`]
    pub fn scope_labeled(&self, point: MeasurementPoint, label: &str) -> ScopeGuard<'_> {
        let tracked = self.push(point, Some(label)).is_some();
        ScopeGuard::new(self, point, tracked)
    }

    /// Run `f` inside a span
    pub fn measure<R>(&self, point: MeasurementPoint, f: impl FnOnce() -> R) -> R {
        let _scope = self.scope(point);
        f()
    }

    // ========================================================================
    // Label and raw APIs
    // ========================================================================

    /// Free-text scope recorded under `Custom1`
    pub fn push_label(&self, label: &str) -> Option<SpanId> {
        self.push(MeasurementPoint::Custom1, Some(label))
    }

    pub fn pop_label(&self) -> Option<CompletedSpan> {
        self.pop(MeasurementPoint::Custom1)
    }

    /// Start a stackless measurement; `None` if the point is filtered
    pub fn start_raw(&self, point: MeasurementPoint) -> Option<u64> {
        self.accepts(point).then(|| self.clock.now_nanos())
    }

    /// Finish a stackless measurement started with [`Profiler::start_raw`]
    ///
    /// No stack is involved, so self time equals elapsed time.
    pub fn end_raw(&self, point: MeasurementPoint, start_nanos: Option<u64>, label: Option<&str>) {
        let Some(start) = start_nanos else {
            return;
        };
        if !self.is_enabled() {
            return;
        }
        let elapsed_micros = self.clock.now_nanos().saturating_sub(start) / 1_000;
        self.aggregator.record(point, elapsed_micros, elapsed_micros, label);
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Open spans on the calling thread
    pub fn current_depth(&self) -> usize {
        self.threads.with(|spans| spans.stack.depth())
    }

    /// Innermost open point on the calling thread
    pub fn current_point(&self) -> Option<MeasurementPoint> {
        self.threads.with(|spans| spans.stack.top().map(Span::point))
    }

    /// Open spans on the primary thread, innermost first
    pub fn primary_stack_snapshot(&self) -> Vec<ActiveSpan> {
        let now = self.clock.now_nanos();
        self.threads.with_primary(|spans| {
            spans
                .stack
                .frames()
                .iter()
                .rev()
                .map(|span| ActiveSpan {
                    point: span.point(),
                    label: span.label().map(str::to_owned),
                    elapsed_nanos: now.saturating_sub(span.start_nanos()),
                })
                .collect()
        })
    }

    /// Subsystem nanoseconds completed on the primary thread in the current
    /// tick
    pub fn current_tick_phases(&self) -> BTreeMap<MeasurementPoint, u64> {
        self.threads.with_primary(|spans| spans.tick_phases.clone())
    }

    /// Label pool counters for the calling thread
    pub fn pool_stats(&self) -> PoolStats {
        self.threads.with(|spans| PoolStats {
            available: spans.pool.available(),
            capacity: spans.pool.capacity(),
            fresh_allocations: spans.pool.fresh_allocations(),
            reused: spans.pool.reused(),
        })
    }

    /// Forget the calling worker thread's stack and pool
    pub fn release_thread(&self) {
        self.threads.release_current();
    }

    /// Threads currently holding span state
    pub fn thread_count(&self) -> usize {
        self.threads.thread_count()
    }
}
