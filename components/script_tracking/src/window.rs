//! Detailed sampling window state machine
//!
//! CLOSED -> OPEN(expiry, rate, tag) -> CLOSED. A trigger opens a window for
//! a fixed duration; the last trigger wins and windows never stack. A
//! compare-and-swap on the last trigger time lets at most one trigger through
//! per cooldown period.

use echo_types::constants::TRIGGER_COOLDOWN_MS;
use echo_types::{SharedClock, TriggerConfig, TriggerReason};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// `last_trigger_ms` value before the first trigger
const NEVER: u64 = u64::MAX;

/// Context tag used by manual captures
pub const MANUAL_CAPTURE_TAG: &str = "MANUAL_COMMAND";

/// Context tag before any window has opened
pub const DEFAULT_CONTEXT_TAG: &str = "Unknown";

/// Point-in-time view of the window manager
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WindowStatus {
    pub active: bool,
    pub windows_opened: u64,
    pub total_active_ms: u64,
    pub sample_rate: u32,
    pub context_tag: String,
    pub remaining_ms: u64,
    pub cooldown_ms: u64,
    /// `None` before the first trigger
    pub since_last_trigger_ms: Option<u64>,
}

/// Opens rate-limited high resolution sampling windows on demand
#[derive(Debug)]
pub struct DetailedWindowManager {
    clock: SharedClock,
    table: TriggerConfig,
    cooldown_ms: u64,
    last_trigger_ms: AtomicU64,
    expiry_nanos: AtomicU64,
    sample_rate: AtomicU32,
    context_tag: RwLock<Arc<str>>,
    /// Open time of the window whose active time is not yet folded
    last_open_nanos: Mutex<Option<u64>>,
    windows_opened: AtomicU64,
    total_active_nanos: AtomicU64,
}

impl DetailedWindowManager {
    /// Manager with the default trigger table and cooldown
    pub fn new(clock: SharedClock) -> Self {
        Self::with_config(clock, TriggerConfig::default(), TRIGGER_COOLDOWN_MS)
    }

    pub fn with_config(clock: SharedClock, table: TriggerConfig, cooldown_ms: u64) -> Self {
        Self {
            clock,
            table,
            cooldown_ms,
            last_trigger_ms: AtomicU64::new(NEVER),
            expiry_nanos: AtomicU64::new(0),
            sample_rate: AtomicU32::new(1),
            context_tag: RwLock::new(Arc::from(DEFAULT_CONTEXT_TAG)),
            last_open_nanos: Mutex::new(None),
            windows_opened: AtomicU64::new(0),
            total_active_nanos: AtomicU64::new(0),
        }
    }

    /// Request a window for `reason`
    ///
    /// Returns `true` only if this call opened a window. Calls inside the
    /// cooldown, calls that lose the race to a concurrent trigger, and
    /// reasons missing from the table are no-ops.
    pub fn trigger(&self, reason: TriggerReason) -> bool {
        let now_ms = self.clock.now_millis();
        let last = self.last_trigger_ms.load(Ordering::Acquire);
        if last != NEVER && now_ms.saturating_sub(last) < self.cooldown_ms {
            debug!("Trigger {} ignored: cooling down", reason);
            return false;
        }

        if self
            .last_trigger_ms
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let Some(window) = self.table.lookup(reason) else {
            warn!("Unknown trigger type: {}", reason);
            return false;
        };

        info!(
            "Detailed window triggered: {} ({}ms, 1/{} sample, context={})",
            reason, window.duration_ms, window.sample_rate, window.context_tag
        );
        self.open_window(window.duration_ms, window.sample_rate, &window.context_tag);
        true
    }

    /// Open a window sampling every call; bypasses the cooldown
    pub fn start_manual_capture(&self, duration_ms: u64) {
        info!("Manual capture started: {}ms", duration_ms);
        self.open_window(duration_ms, 1, MANUAL_CAPTURE_TAG);
    }

    /// Overwrite the window state, folding any unfolded active time first
    pub fn open_window(&self, duration_ms: u64, sample_rate: u32, context_tag: &str) {
        let now = self.clock.now_nanos();
        let mut last_open = self.last_open_nanos.lock();

        if let Some(opened) = *last_open {
            let end = now.min(self.expiry_nanos.load(Ordering::Acquire));
            self.total_active_nanos
                .fetch_add(end.saturating_sub(opened), Ordering::Relaxed);
        }

        *self.context_tag.write() = Arc::from(context_tag);
        self.sample_rate.store(sample_rate.max(1), Ordering::Release);
        self.expiry_nanos
            .store(now.saturating_add(duration_ms.saturating_mul(1_000_000)), Ordering::Release);
        *last_open = Some(now);
        self.windows_opened.fetch_add(1, Ordering::Relaxed);

        debug!(
            "Detailed window opened: {}ms, rate=1/{}, context={}",
            duration_ms, sample_rate, context_tag
        );
    }

    /// Fold the active time of a window that has expired since the last check
    ///
    /// Idempotent: a folded window is not folded again.
    pub fn on_tick_boundary(&self) {
        let now = self.clock.now_nanos();
        let mut last_open = self.last_open_nanos.lock();
        let Some(opened) = *last_open else {
            return;
        };

        let expiry = self.expiry_nanos.load(Ordering::Acquire);
        if now >= expiry {
            self.total_active_nanos
                .fetch_add(expiry.saturating_sub(opened), Ordering::Relaxed);
            *last_open = None;
        }
    }

    pub fn is_active(&self) -> bool {
        self.clock.now_nanos() < self.expiry_nanos.load(Ordering::Acquire)
    }

    /// Whether the `sample`-th call attempt falls on the sampling grid
    pub fn should_sample(&self, sample: u64) -> bool {
        self.is_active() && sample % u64::from(self.sample_rate()) == 0
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Acquire)
    }

    pub fn context_tag(&self) -> Arc<str> {
        self.context_tag.read().clone()
    }

    /// Override the tag stamped on subsequent tracked calls
    pub fn set_context_tag(&self, tag: Option<&str>) {
        *self.context_tag.write() = Arc::from(tag.unwrap_or(DEFAULT_CONTEXT_TAG));
    }

    /// Windows opened this session (one per open)
    pub fn windows_opened(&self) -> u64 {
        self.windows_opened.load(Ordering::Relaxed)
    }

    /// Folded active time in milliseconds
    pub fn total_active_ms(&self) -> u64 {
        self.total_active_nanos.load(Ordering::Relaxed) / 1_000_000
    }

    pub fn cooldown_ms(&self) -> u64 {
        self.cooldown_ms
    }

    pub fn status(&self) -> WindowStatus {
        let now = self.clock.now_nanos();
        let expiry = self.expiry_nanos.load(Ordering::Acquire);
        let last = self.last_trigger_ms.load(Ordering::Acquire);
        WindowStatus {
            active: now < expiry,
            windows_opened: self.windows_opened(),
            total_active_ms: self.total_active_ms(),
            sample_rate: self.sample_rate(),
            context_tag: self.context_tag().to_string(),
            remaining_ms: expiry.saturating_sub(now) / 1_000_000,
            cooldown_ms: self.cooldown_ms,
            since_last_trigger_ms: (last != NEVER)
                .then(|| (now / 1_000_000).saturating_sub(last)),
        }
    }

    /// Close any window and clear counters and cooldown
    pub fn reset(&self) {
        let mut last_open = self.last_open_nanos.lock();
        *last_open = None;
        self.expiry_nanos.store(0, Ordering::Release);
        self.sample_rate.store(1, Ordering::Release);
        *self.context_tag.write() = Arc::from(DEFAULT_CONTEXT_TAG);
        self.last_trigger_ms.store(NEVER, Ordering::Release);
        self.windows_opened.store(0, Ordering::Relaxed);
        self.total_active_nanos.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echo_types::{ManualClock, WindowConfig};

    fn manager() -> (Arc<ManualClock>, DetailedWindowManager) {
        let clock = ManualClock::shared();
        let manager = DetailedWindowManager::new(clock.clone());
        (clock, manager)
    }

    #[test]
    fn test_first_trigger_opens_window() {
        let (_clock, manager) = manager();
        assert!(!manager.is_active());
        assert!(manager.trigger(TriggerReason::ContextMenu));

        assert!(manager.is_active());
        assert_eq!(manager.sample_rate(), 2);
        assert_eq!(&*manager.context_tag(), "CONTEXT_MENU");
        assert_eq!(manager.windows_opened(), 1);
    }

    #[test]
    fn test_cooldown_blocks_retrigger() {
        let (clock, manager) = manager();
        assert!(manager.trigger(TriggerReason::SlowTick));
        clock.advance_millis(999);
        assert!(!manager.trigger(TriggerReason::UiBurst));
        clock.advance_millis(1);
        assert!(manager.trigger(TriggerReason::UiBurst));
        assert_eq!(&*manager.context_tag(), "UI_BURST");
    }

    #[test]
    fn test_window_expires() {
        let (clock, manager) = manager();
        manager.trigger(TriggerReason::UiBurst);
        clock.advance_millis(199);
        assert!(manager.is_active());
        clock.advance_millis(1);
        assert!(!manager.is_active());
    }

    #[test]
    fn test_unknown_reason_is_noop() {
        let clock = ManualClock::shared();
        let table = TriggerConfig::empty()
            .with(TriggerReason::SlowTick, WindowConfig::new(300, 4, "SLOW_TICK"));
        let manager = DetailedWindowManager::with_config(clock, table, 1000);

        assert!(!manager.trigger(TriggerReason::ContextMenu));
        assert!(!manager.is_active());
        assert_eq!(manager.windows_opened(), 0);
    }

    #[test]
    fn test_reopen_folds_unexpired_window() {
        let (clock, manager) = manager();
        manager.start_manual_capture(2_000);
        clock.advance_millis(500);
        manager.start_manual_capture(2_000);

        assert_eq!(manager.total_active_ms(), 500);
        assert_eq!(manager.windows_opened(), 2);
        assert_eq!(&*manager.context_tag(), MANUAL_CAPTURE_TAG);
    }

    #[test]
    fn test_tick_boundary_fold_is_idempotent() {
        let (clock, manager) = manager();
        manager.trigger(TriggerReason::SlowTick);

        clock.advance_millis(100);
        manager.on_tick_boundary();
        assert_eq!(manager.total_active_ms(), 0);

        clock.advance_millis(400);
        manager.on_tick_boundary();
        manager.on_tick_boundary();
        assert_eq!(manager.total_active_ms(), 300);

        // Already folded; a later open must not count it twice
        clock.advance_millis(1_000);
        manager.trigger(TriggerReason::SlowTick);
        assert_eq!(manager.total_active_ms(), 300);
    }

    #[test]
    fn test_sampling_grid() {
        let (_clock, manager) = manager();
        assert!(!manager.should_sample(4));

        manager.trigger(TriggerReason::SlowTick);
        assert!(!manager.should_sample(1));
        assert!(manager.should_sample(4));
        assert!(manager.should_sample(8));
    }

    #[test]
    fn test_status_and_reset() {
        let (clock, manager) = manager();
        assert_eq!(manager.status().since_last_trigger_ms, None);

        manager.trigger(TriggerReason::SlowTick);
        clock.advance_millis(100);

        let status = manager.status();
        assert!(status.active);
        assert_eq!(status.remaining_ms, 200);
        assert_eq!(status.since_last_trigger_ms, Some(100));
        assert_eq!(status.cooldown_ms, 1000);

        manager.reset();
        let status = manager.status();
        assert!(!status.active);
        assert_eq!(status.windows_opened, 0);
        assert_eq!(status.context_tag, DEFAULT_CONTEXT_TAG);
        assert!(manager.trigger(TriggerReason::SlowTick));
    }

    #[test]
    fn test_set_context_tag() {
        let (_clock, manager) = manager();
        manager.set_context_tag(Some("INVENTORY"));
        assert_eq!(&*manager.context_tag(), "INVENTORY");
        manager.set_context_tag(None);
        assert_eq!(&*manager.context_tag(), DEFAULT_CONTEXT_TAG);
    }
}
