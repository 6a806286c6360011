//! Per-thread script call stack
//!
//! Script calls are far too frequent to always record, so most starts are
//! never pushed. An empty stack at `record_end` is therefore the normal case
//! and is not reported anywhere.

use echo_types::constants::FRAME_TTL_NANOS;
use serde::{Deserialize, Serialize};
use span_engine::{PerThread, SpanStack, StackFrame};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

/// One tracked script call
#[derive(Debug)]
pub struct CallFrame {
    name: Arc<str>,
    context_tag: Arc<str>,
    start_nanos: u64,
    frame_id: u64,
    child_nanos: u64,
}

impl CallFrame {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context_tag(&self) -> &str {
        &self.context_tag
    }

    /// Tick counter value when the call started
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }
}

impl StackFrame for CallFrame {
    fn start_nanos(&self) -> u64 {
        self.start_nanos
    }

    fn child_nanos(&self) -> u64 {
        self.child_nanos
    }

    fn add_child_nanos(&mut self, nanos: u64) {
        self.child_nanos += nanos;
    }
}

/// Timings of a finished tracked call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallResult {
    pub name: Arc<str>,
    pub context_tag: Arc<str>,
    pub elapsed_micros: u64,
    pub self_micros: u64,
    pub frame_id: u64,
}

#[derive(Debug, Default)]
struct ThreadCalls {
    stack: SpanStack<CallFrame>,
    sample_counter: u64,
}

/// Script call stacks for every thread plus the tick frame id
#[derive(Debug, Default)]
pub struct CallTracker {
    threads: PerThread<ThreadCalls>,
    frame_id: AtomicU64,
    dropped_frames: AtomicU64,
    stack_resets: AtomicU64,
}

impl CallTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the calling thread as the primary thread
    pub fn set_primary_thread(&self) {
        self.threads.set_primary(thread::current().id());
    }

    /// Advance the calling thread's sample counter and return the new value
    ///
    /// Called once per call attempt, tracked or not.
    pub fn next_sample(&self) -> u64 {
        self.threads.with(|calls| {
            calls.sample_counter = calls.sample_counter.wrapping_add(1);
            calls.sample_counter
        })
    }

    /// Push a tracked call
    ///
    /// At the depth limit, frames older than the TTL are purged first (their
    /// end never fired). Returns `false` if the stack is still full.
    pub fn record_start(&self, name: Arc<str>, context_tag: Arc<str>, start_nanos: u64) -> bool {
        let frame_id = self.current_frame_id();
        self.threads.with(|calls| {
            if calls.stack.is_full() {
                let purged = calls.stack.purge_stale(start_nanos, FRAME_TTL_NANOS).len();
                if purged > 0 {
                    warn!("Cleaned {} stale script frames (end never fired)", purged);
                    self.dropped_frames.fetch_add(purged as u64, Ordering::Relaxed);
                }
            }

            calls
                .stack
                .push(CallFrame {
                    name,
                    context_tag,
                    start_nanos,
                    frame_id,
                    child_nanos: 0,
                })
                .is_ok()
        })
    }

    /// Pop the innermost tracked call; `None` if this call was never tracked
    pub fn record_end(&self, end_nanos: u64) -> Option<CallResult> {
        let popped = self.threads.with(|calls| calls.stack.pop_completed(end_nanos))?;
        let frame = popped.frame;
        Some(CallResult {
            name: frame.name,
            context_tag: frame.context_tag,
            elapsed_micros: popped.elapsed_nanos / 1_000,
            self_micros: popped.self_nanos / 1_000,
            frame_id: frame.frame_id,
        })
    }

    /// Purge stale frames on the calling thread without pushing
    pub fn purge_stale(&self, now_nanos: u64) -> usize {
        let purged = self
            .threads
            .with(|calls| calls.stack.purge_stale(now_nanos, FRAME_TTL_NANOS).len());
        if purged > 0 {
            self.dropped_frames.fetch_add(purged as u64, Ordering::Relaxed);
        }
        purged
    }

    /// Clear the calling thread's stack, returning how many frames it held
    pub fn reset_stack(&self) -> usize {
        let cleared = self.threads.with(|calls| calls.stack.drain().len());
        if cleared > 0 {
            debug!("Script call stack reset (had {} frames)", cleared);
            self.stack_resets.fetch_add(1, Ordering::Relaxed);
        }
        cleared
    }

    /// Drop open calls on every thread and forget worker threads, keeping
    /// counters
    pub fn drain_all(&self) -> usize {
        let mut drained = 0;
        self.threads
            .drain_and_clear(|calls| drained += calls.stack.drain().len());
        if drained > 0 {
            debug!("Dropped {} open script calls", drained);
        }
        drained
    }

    /// Clear every thread's stack and sample counter and forget worker
    /// threads
    pub fn reset_all(&self) {
        self.threads.drain_and_clear(|calls| {
            calls.stack.drain();
            calls.sample_counter = 0;
        });
        self.frame_id.store(0, Ordering::Relaxed);
        self.dropped_frames.store(0, Ordering::Relaxed);
        self.stack_resets.store(0, Ordering::Relaxed);
    }

    /// Advance the frame id; returns the new id
    pub fn on_tick_boundary(&self) -> u64 {
        self.frame_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn current_frame_id(&self) -> u64 {
        self.frame_id.load(Ordering::Relaxed)
    }

    /// Tracked calls open on the calling thread
    pub fn depth(&self) -> usize {
        self.threads.with(|calls| calls.stack.depth())
    }

    pub fn is_empty(&self) -> bool {
        self.depth() == 0
    }

    /// Frames purged by the TTL guard
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    pub fn stack_resets(&self) -> u64 {
        self.stack_resets.load(Ordering::Relaxed)
    }

    /// Threads currently holding call state
    pub fn thread_count(&self) -> usize {
        self.threads.thread_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echo_types::constants::MAX_STACK_DEPTH;

    fn name(s: &str) -> Arc<str> {
        Arc::from(s)
    }

    #[test]
    fn test_nested_calls_propagate_child_time() {
        let tracker = CallTracker::new();
        assert!(tracker.record_start(name("outer"), name("SLOW_TICK"), 0));
        assert!(tracker.record_start(name("inner"), name("SLOW_TICK"), 1_000_000));

        let inner = tracker.record_end(4_000_000).unwrap();
        assert_eq!(&*inner.name, "inner");
        assert_eq!(inner.elapsed_micros, 3_000);
        assert_eq!(inner.self_micros, 3_000);

        let outer = tracker.record_end(10_000_000).unwrap();
        assert_eq!(outer.elapsed_micros, 10_000);
        assert_eq!(outer.self_micros, 7_000);
        assert_eq!(&*outer.context_tag, "SLOW_TICK");
    }

    #[test]
    fn test_end_without_start_is_silent() {
        let tracker = CallTracker::new();
        assert!(tracker.record_end(5).is_none());
        assert_eq!(tracker.dropped_frames(), 0);
    }

    #[test]
    fn test_overflow_purges_stale_then_retries() {
        let tracker = CallTracker::new();
        for _ in 0..MAX_STACK_DEPTH {
            assert!(tracker.record_start(name("leak"), name("t"), 0));
        }

        // Still fresh: refused
        assert!(!tracker.record_start(name("f"), name("t"), 1_000_000_000));
        assert_eq!(tracker.depth(), MAX_STACK_DEPTH);

        // Six seconds later every leaked frame is stale
        assert!(tracker.record_start(name("f"), name("t"), 6_000_000_000));
        assert_eq!(tracker.depth(), 1);
        assert_eq!(tracker.dropped_frames(), MAX_STACK_DEPTH as u64);
    }

    #[test]
    fn test_frame_id_follows_tick_boundaries() {
        let tracker = CallTracker::new();
        tracker.on_tick_boundary();
        assert_eq!(tracker.on_tick_boundary(), 2);

        tracker.record_start(name("f"), name("t"), 0);
        assert_eq!(tracker.record_end(10).unwrap().frame_id, 2);
    }

    #[test]
    fn test_reset_stack_counts_resets() {
        let tracker = CallTracker::new();
        assert_eq!(tracker.reset_stack(), 0);
        assert_eq!(tracker.stack_resets(), 0);

        tracker.record_start(name("a"), name("t"), 0);
        tracker.record_start(name("b"), name("t"), 0);
        assert_eq!(tracker.reset_stack(), 2);
        assert_eq!(tracker.stack_resets(), 1);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_sample_counter_is_per_thread() {
        let tracker = Arc::new(CallTracker::new());
        assert_eq!(tracker.next_sample(), 1);
        assert_eq!(tracker.next_sample(), 2);

        let other = tracker.clone();
        let first = thread::spawn(move || other.next_sample()).join().unwrap();
        assert_eq!(first, 1);
    }

    #[test]
    fn test_drain_all_forgets_worker_threads() {
        let tracker = Arc::new(CallTracker::new());
        tracker.set_primary_thread();
        tracker.record_start(name("main"), name("t"), 0);

        for _ in 0..50 {
            let other = tracker.clone();
            thread::spawn(move || {
                other.next_sample();
                other.record_start(name("worker"), name("t"), 0);
            })
            .join()
            .unwrap();
        }
        assert_eq!(tracker.thread_count(), 51);

        assert_eq!(tracker.drain_all(), 51);
        assert_eq!(tracker.thread_count(), 1);
        assert!(tracker.is_empty());
    }
}
