//! Main Echo component wiring every profiler module together

use crate::session::Session;
use crate::snapshot_source::ProfilerSnapshotSource;
use crate::{EchoConfig, HostSignals, Result, SessionInfo};
use echo_types::{
    wall_clock_millis, FreezeSnapshot, HookStatus, MeasurementPoint, MonotonicClock,
    QualityResult, SharedClock, TriggerConfig, TriggerReason,
};
use freeze_watchdog::{FreezeWatchdog, MemoryProbe};
use parking_lot::{Mutex, RwLock};
use quality_scorer::{QualityInputs, QualityScorer, SaveLocation, SavePolicy};
use script_tracking::{
    CallResult, DetailedWindowManager, FunctionSummary, ScriptCounters, ScriptProfiler,
    WindowStatus,
};
use span_engine::{CompletedSpan, Profiler, ScopeGuard, SpanId};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use timing_aggregate::{PointSnapshot, StatisticsAggregator};
use tracing::{debug, info};

/// The Echo profiler context
///
/// Owns the span engine, the script profiler, the freeze watchdog and the
/// quality scorer. Construct one per process and share it by reference.
///
/// # Example
///
/// ```
/// use echo_component::{EchoComponent, EchoConfig};
/// use echo_types::MeasurementPoint;
///
/// let echo = EchoComponent::new(EchoConfig::default()).unwrap();
/// echo.enable(true).unwrap();
///
/// echo.begin_tick();
/// {
///     let _render = echo.scope(MeasurementPoint::Render);
/// }
/// echo.end_tick();
///
/// assert_eq!(echo.aggregator().tick_samples(), 1);
/// echo.disable();
/// ```
#[derive(Debug)]
pub struct EchoComponent {
    config: EchoConfig,
    clock: SharedClock,
    profiler: Arc<Profiler>,
    scripts: Arc<ScriptProfiler>,
    watchdog: FreezeWatchdog,
    scorer: QualityScorer,
    save_policy: SavePolicy,
    session: RwLock<Session>,
    heartbeats: AtomicU64,
    fallback_heartbeat: AtomicBool,
    signals: Mutex<HostSignals>,
}

impl EchoComponent {
    /// Create a component on the monotonic clock
    ///
    /// Profiling starts immediately if the config says `enabled`.
    pub fn new(config: EchoConfig) -> Result<Self> {
        Self::with_clock(config, MonotonicClock::shared())
    }

    pub fn with_clock(config: EchoConfig, clock: SharedClock) -> Result<Self> {
        config.validate()?;
        debug!("Creating EchoComponent with config: {:?}", config);

        let aggregator = Arc::new(StatisticsAggregator::with_spike_threshold(
            clock.clone(),
            config.spike_threshold_ms(),
        ));
        let profiler = Arc::new(Profiler::new(clock.clone(), aggregator));
        profiler.set_script_profiling(config.script_profiling_enabled());
        profiler.set_debug_mode(config.debug_mode());

        let window = DetailedWindowManager::with_config(
            clock.clone(),
            TriggerConfig::default(),
            config.trigger_cooldown_ms(),
        );
        let scripts = Arc::new(ScriptProfiler::with_window(clock.clone(), window));

        let watchdog = FreezeWatchdog::with_config(clock.clone(), config.watchdog_config())?;
        watchdog.set_snapshot_source(Arc::new(ProfilerSnapshotSource::new(
            profiler.clone(),
            scripts.clone(),
            config.top_n(),
        )));

        let session = Session::begin(wall_clock_millis(), clock.now_nanos());
        let component = Self {
            save_policy: SavePolicy::new(config.min_quality_to_save()),
            config,
            clock,
            profiler,
            scripts,
            watchdog,
            scorer: QualityScorer::new(),
            session: RwLock::new(session),
            heartbeats: AtomicU64::new(0),
            fallback_heartbeat: AtomicBool::new(false),
            signals: Mutex::new(HostSignals::default()),
        };

        if component.config.enabled() {
            component.enable(false)?;
        }
        Ok(component)
    }

    pub fn config(&self) -> &EchoConfig {
        &self.config
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn profiler(&self) -> &Arc<Profiler> {
        &self.profiler
    }

    pub fn aggregator(&self) -> &Arc<StatisticsAggregator> {
        self.profiler.aggregator()
    }

    pub fn scripts(&self) -> &Arc<ScriptProfiler> {
        &self.scripts
    }

    pub fn window(&self) -> &DetailedWindowManager {
        self.scripts.window()
    }

    pub fn watchdog(&self) -> &FreezeWatchdog {
        &self.watchdog
    }

    pub fn set_memory_probe(&self, probe: Arc<dyn MemoryProbe>) {
        self.watchdog.set_memory_probe(probe);
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start profiling with the calling thread as the primary thread
    ///
    /// With `reset_stats`, a disabled component starts a fresh session. A
    /// no-op if already enabled.
    pub fn enable(&self, reset_stats: bool) -> Result<()> {
        if self.profiler.is_enabled() {
            return Ok(());
        }
        if reset_stats {
            self.reset();
        }

        self.profiler.set_primary_thread();
        self.scripts.set_primary_thread();
        self.profiler.enable();
        self.watchdog.start()?;

        info!("Echo profiler enabled (session {})", self.session.read().id);
        Ok(())
    }

    /// Stop profiling, drop every open span and stop the watchdog
    ///
    /// Returns the number of orphaned spans. Safe to call at any time.
    pub fn disable(&self) -> usize {
        let orphaned = self.profiler.disable();
        self.scripts.tracker().drain_all();
        self.watchdog.stop();
        info!("Echo profiler disabled");
        orphaned
    }

    pub fn is_enabled(&self) -> bool {
        self.profiler.is_enabled()
    }

    /// Clear all session data and start a new session
    pub fn reset(&self) {
        self.profiler.reset();
        self.scripts.reset();
        self.watchdog.reset();
        self.heartbeats.store(0, Ordering::Relaxed);
        self.fallback_heartbeat.store(false, Ordering::Relaxed);
        *self.signals.lock() = HostSignals::default();
        *self.session.write() = Session::begin(wall_clock_millis(), self.clock.now_nanos());
        info!("Echo session reset");
    }

    pub fn set_script_profiling(&self, enabled: bool) {
        self.profiler.set_script_profiling(enabled);
    }

    pub fn session(&self) -> SessionInfo {
        self.session.read().info(self.clock.now_nanos())
    }

    // ========================================================================
    // Ticks and spans
    // ========================================================================

    /// Liveness signal from the primary thread's tick hook
    pub fn heartbeat(&self) {
        self.heartbeats.fetch_add(1, Ordering::Relaxed);
        self.watchdog.heartbeat();
    }

    /// Liveness signal from a degraded source; lowers the quality score
    pub fn fallback_heartbeat(&self) {
        if !self.fallback_heartbeat.swap(true, Ordering::Relaxed) {
            info!("Fallback heartbeat in use");
        }
        self.heartbeat();
    }

    /// Heartbeat and open the tick span
    pub fn begin_tick(&self) -> Option<SpanId> {
        self.heartbeat();
        self.profiler.push(MeasurementPoint::Tick, None)
    }

    /// Close the tick span and advance the script frame
    ///
    /// A tick slower than the spike threshold requests a detailed window.
    pub fn end_tick(&self) -> Option<CompletedSpan> {
        let completed = self.profiler.pop(MeasurementPoint::Tick);
        self.on_tick_boundary();

        if let Some(tick) = &completed {
            let elapsed_ms = tick.elapsed_nanos as f64 / 1_000_000.0;
            if elapsed_ms > self.config.spike_threshold_ms() {
                debug!("Slow tick: {:.2}ms", elapsed_ms);
                self.scripts.window().trigger(TriggerReason::SlowTick);
            }
        }
        completed
    }

    pub fn on_tick_boundary(&self) -> u64 {
        self.scripts.on_tick_boundary()
    }

    pub fn push(&self, point: MeasurementPoint, label: Option<&str>) -> Option<SpanId> {
        self.profiler.push(point, label)
    }

    pub fn pop(&self, point: MeasurementPoint) -> Option<CompletedSpan> {
        self.profiler.pop(point)
    }

    pub fn scope(&self, point: MeasurementPoint) -> ScopeGuard<'_> {
        self.profiler.scope(point)
    }

    pub fn scope_labeled(&self, point: MeasurementPoint, label: &str) -> ScopeGuard<'_> {
        self.profiler.scope_labeled(point, label)
    }

    // ========================================================================
    // Detailed windows and script calls
    // ========================================================================

    pub fn trigger(&self, reason: TriggerReason) -> bool {
        self.scripts.window().trigger(reason)
    }

    pub fn start_manual_capture(&self, duration_ms: u64) {
        self.scripts.window().start_manual_capture(duration_ms);
    }

    pub fn window_status(&self) -> WindowStatus {
        self.scripts.window().status()
    }

    fn script_calls_accepted(&self) -> bool {
        self.profiler.is_enabled() && self.profiler.is_script_profiling_enabled()
    }

    /// A script call is starting; returns whether it is tracked
    pub fn script_call_start(&self, name: &str) -> bool {
        self.script_calls_accepted()
            && self.scripts.record_call_start(name, self.clock.now_nanos())
    }

    /// A script call ended; tracked calls also feed the point statistics
    pub fn script_call_end(&self) -> Option<CallResult> {
        if !self.script_calls_accepted() {
            return None;
        }
        let result = self.scripts.record_call_end(self.clock.now_nanos())?;
        self.aggregator().record(
            MeasurementPoint::ScriptFunction,
            result.elapsed_micros,
            result.self_micros,
            Some(&*result.name),
        );
        Some(result)
    }

    pub fn script_counters(&self) -> ScriptCounters {
        self.scripts.counters()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Points ranked by total time, `top_n` entries
    pub fn top_points(&self) -> Vec<PointSnapshot> {
        self.aggregator().top_by_total_time(self.config.top_n())
    }

    /// Script functions ranked by total time, `top_n` entries
    pub fn top_functions(&self) -> Vec<FunctionSummary> {
        self.scripts.top_functions_by_time(self.config.top_n())
    }

    pub fn freeze_history(&self) -> Vec<FreezeSnapshot> {
        self.watchdog.history()
    }

    // ========================================================================
    // Quality
    // ========================================================================

    /// Override the hook status instead of deriving it from heartbeats
    pub fn set_hook_status(&self, status: Option<HookStatus>) {
        self.signals.lock().hook_status = status;
    }

    /// Add samples measured by host-side profilers
    pub fn record_external_samples(&self, phase_samples: u64, sub_timing_entries: u64) {
        let mut signals = self.signals.lock();
        signals.phase_samples += phase_samples;
        signals.sub_timing_entries += sub_timing_entries;
    }

    pub fn host_signals(&self) -> HostSignals {
        HostSignals {
            heartbeat_count: self.heartbeats.load(Ordering::Relaxed),
            used_fallback_heartbeat: self.fallback_heartbeat.load(Ordering::Relaxed),
            ..*self.signals.lock()
        }
    }

    pub fn quality_inputs(&self) -> QualityInputs {
        let aggregator = self.aggregator();
        let signals = self.host_signals();
        QualityInputs {
            tick_samples: aggregator.tick_samples(),
            session_duration_ms: self.session().duration_ms,
            deep_analysis_enabled: self.config.deep_analysis_enabled(),
            phase_samples: aggregator.phase_samples() + signals.phase_samples,
            sub_timing_entries: aggregator.sub_timing_entries() as u64
                + signals.sub_timing_entries,
            hook_status: signals.effective_hook_status(),
            watchdog_active: self.watchdog.is_running() && self.watchdog.ticks_received() > 0,
            used_fallback_heartbeat: signals.used_fallback_heartbeat,
        }
    }

    pub fn quality(&self) -> QualityResult {
        self.scorer.score(&self.quality_inputs())
    }

    pub fn save_policy(&self) -> SavePolicy {
        self.save_policy
    }

    /// Current score and where a report with it should be saved
    pub fn save_location(&self) -> (QualityResult, SaveLocation) {
        let quality = self.quality();
        let location = self.save_policy.save_location(quality.score);
        (quality, location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echo_types::ManualClock;

    fn component(config: EchoConfig) -> (Arc<ManualClock>, EchoComponent) {
        let clock = ManualClock::shared();
        let echo = EchoComponent::with_clock(config, clock.clone()).unwrap();
        (clock, echo)
    }

    #[test]
    fn test_starts_disabled_by_default() {
        let (_clock, echo) = component(EchoConfig::default());
        assert!(!echo.is_enabled());
        assert!(!echo.watchdog().is_running());
        assert!(echo.push(MeasurementPoint::Tick, None).is_none());
    }

    #[test]
    fn test_enabled_config_starts_profiling() {
        let (_clock, echo) = component(EchoConfig::builder().enabled(true).build());
        assert!(echo.is_enabled());
        assert!(echo.watchdog().is_running());
        assert!(echo.profiler().is_primary_thread());
        echo.disable();
        assert!(!echo.watchdog().is_running());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let clock = ManualClock::shared();
        let config = EchoConfig::builder().top_n(0).build();
        assert!(EchoComponent::with_clock(config, clock).is_err());
    }

    #[test]
    fn test_slow_tick_opens_window() {
        let (clock, echo) = component(EchoConfig::default());
        echo.enable(true).unwrap();

        echo.begin_tick();
        clock.advance_millis(16);
        echo.end_tick();
        assert!(!echo.window_status().active);

        echo.begin_tick();
        clock.advance_millis(40);
        echo.end_tick();
        let status = echo.window_status();
        assert!(status.active);
        assert_eq!(status.context_tag, "SLOW_TICK");
        echo.disable();
    }

    #[test]
    fn test_script_calls_gated_by_script_profiling() {
        let (clock, echo) = component(EchoConfig::default());
        echo.enable(true).unwrap();
        echo.start_manual_capture(1_000);

        assert!(!echo.script_call_start("OnTick"));
        assert!(echo.script_call_end().is_none());

        echo.set_script_profiling(true);
        assert!(echo.script_call_start("OnTick"));
        clock.advance_millis(3);
        let result = echo.script_call_end().unwrap();
        assert_eq!(result.elapsed_micros, 3_000);

        let stats = echo.aggregator().point(MeasurementPoint::ScriptFunction);
        assert_eq!(stats.call_count(), 1);
        assert_eq!(stats.label_count(), 1);
        echo.disable();
    }

    #[test]
    fn test_reset_starts_new_session() {
        let (clock, echo) = component(EchoConfig::default());
        let first = echo.session();
        clock.advance_millis(2_000);
        assert_eq!(echo.session().duration_ms, 2_000);

        echo.reset();
        let second = echo.session();
        assert_ne!(first.id, second.id);
        assert_eq!(second.duration_ms, 0);
    }

    #[test]
    fn test_host_signals_merge() {
        let (_clock, echo) = component(EchoConfig::default());
        echo.enable(true).unwrap();
        echo.heartbeat();
        echo.fallback_heartbeat();
        echo.record_external_samples(4, 2);

        let signals = echo.host_signals();
        assert_eq!(signals.heartbeat_count, 2);
        assert!(signals.used_fallback_heartbeat);
        assert_eq!(signals.phase_samples, 4);
        assert_eq!(signals.effective_hook_status(), HookStatus::Partial);

        echo.set_hook_status(Some(HookStatus::Ok));
        assert_eq!(echo.host_signals().effective_hook_status(), HookStatus::Ok);
        echo.disable();
    }
}
