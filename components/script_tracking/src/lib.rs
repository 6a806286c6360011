//! Script call tracking for the Echo profiler
//!
//! Script calls are only recorded while a detailed window is open, and then
//! only one in every N. This crate owns the window state machine, the
//! per-thread call stacks and per-function statistics.

mod call_tracker;
mod labeler;
mod script_profiler;
mod window;

pub use call_tracker::{CallFrame, CallResult, CallTracker};
pub use labeler::{shorten_filename, FunctionKind, FunctionLabeler, LabelerStats};
pub use script_profiler::{FunctionStats, FunctionSummary, ScriptCounters, ScriptProfiler};
pub use window::{DetailedWindowManager, WindowStatus, DEFAULT_CONTEXT_TAG, MANUAL_CAPTURE_TAG};
