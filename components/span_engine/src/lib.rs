//! Span engine for the Echo profiler
//!
//! Per-thread span stacks with a primary-thread fast path, scoped spans and
//! a recycled label pool, feeding a shared statistics aggregator.

mod per_thread;
mod profiler;
mod scope;
mod stack;

pub use per_thread::PerThread;
pub use profiler::{PoolStats, Profiler};
pub use scope::{ScopeGuard, ScopePool};
pub use stack::{ActiveSpan, CompletedSpan, PoppedFrame, Span, SpanId, SpanStack, StackFrame};
