//! Freeze snapshot context read from the live profiler

use echo_types::constants::FREEZE_HEAVY_FUNCTIONS;
use echo_types::{Category, HeavyFunction, SnapshotContext};
use freeze_watchdog::SnapshotSource;
use script_tracking::ScriptProfiler;
use span_engine::{ActiveSpan, Profiler};
use std::sync::Arc;

/// Reads the primary span stack and the heaviest script functions for the
/// watchdog
#[derive(Debug)]
pub struct ProfilerSnapshotSource {
    profiler: Arc<Profiler>,
    scripts: Arc<ScriptProfiler>,
    top_n: usize,
}

impl ProfilerSnapshotSource {
    pub fn new(profiler: Arc<Profiler>, scripts: Arc<ScriptProfiler>, top_n: usize) -> Self {
        Self {
            profiler,
            scripts,
            top_n,
        }
    }
}

fn describe_all(spans: &[ActiveSpan]) -> Vec<String> {
    spans.iter().map(ActiveSpan::describe).collect()
}

fn nanos_to_ms(nanos: u64) -> f64 {
    nanos as f64 / 1_000_000.0
}

impl SnapshotSource for ProfilerSnapshotSource {
    fn stack_trace(&self) -> Vec<String> {
        describe_all(&self.profiler.primary_stack_snapshot())
    }

    /// What the primary thread was doing at the stall
    ///
    /// Tick phases are this tick's completed subsystem time plus the
    /// elapsed time of subsystem spans still open. Sub-timings are the
    /// labeled spans still open.
    fn context(&self) -> SnapshotContext {
        let open = self.profiler.primary_stack_snapshot();

        let mut phase_nanos = self.profiler.current_tick_phases();
        for span in open.iter().filter(|s| s.point.category() == Category::Subsystem) {
            *phase_nanos.entry(span.point).or_default() += span.elapsed_nanos;
        }
        let tick_phases = phase_nanos
            .into_iter()
            .map(|(point, nanos)| (point.display_name().to_string(), nanos_to_ms(nanos)))
            .collect();

        let active_sub_timings = open
            .iter()
            .filter_map(|span| {
                let label = span.label.as_deref()?;
                Some((
                    format!("{}:{}", span.point.display_name(), label),
                    nanos_to_ms(span.elapsed_nanos),
                ))
            })
            .take(self.top_n)
            .collect();

        let heavy_functions = self
            .scripts
            .top_functions_by_time(FREEZE_HEAVY_FUNCTIONS)
            .into_iter()
            .map(|f| HeavyFunction {
                name: f.name,
                call_count: f.call_count,
                total_ms: f.total_micros as f64 / 1_000.0,
                max_ms: f.max_micros as f64 / 1_000.0,
            })
            .collect();

        SnapshotContext {
            active_spans: describe_all(&open),
            tick_phases,
            active_sub_timings,
            heavy_functions,
        }
    }
}
