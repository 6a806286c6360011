//! Engine-wide limits and defaults

/// Maximum number of open spans on one stack
pub const MAX_STACK_DEPTH: usize = 128;

/// Age after which an open frame is assumed to have lost its matching end
pub const FRAME_TTL_NANOS: u64 = 5_000_000_000;

/// Reusable scope handles kept per thread
pub const SCOPE_POOL_SIZE: usize = 16;

/// Minimum spacing between two triggered detailed windows
pub const TRIGGER_COOLDOWN_MS: u64 = 1_000;

/// Lifetime of a cached top-N ranking
pub const RANKING_CACHE_TTL_MS: u64 = 1_000;

/// Rolling statistics horizons
pub const ROLLING_WINDOW_1S_MS: u64 = 1_000;
pub const ROLLING_WINDOW_5S_MS: u64 = 5_000;
pub const ROLLING_WINDOW_60S_MS: u64 = 60_000;

/// Tick histogram bucket lower bounds, in milliseconds
pub const DEFAULT_HISTOGRAM_BUCKETS_MS: [f64; 9] = [0.0, 5.0, 10.0, 16.67, 20.0, 33.33, 50.0, 100.0, 200.0];

/// Recent tick samples kept for exact percentiles
pub const HISTOGRAM_SAMPLE_BUFFER: usize = 1_000;

/// Frame budget thresholds used for jank accounting
pub const JANK_THRESHOLD_60FPS_MICROS: u64 = 16_667;
pub const JANK_THRESHOLD_30FPS_MICROS: u64 = 33_333;

/// Default spike threshold (two frames at 60 fps)
pub const DEFAULT_SPIKE_THRESHOLD_MS: f64 = 33.33;

/// Spike entries retained
pub const SPIKE_LOG_MAX_ENTRIES: usize = 100;

/// Heartbeat staleness that counts as a freeze
pub const FREEZE_THRESHOLD_MS: u64 = 500;

/// Watchdog polling period
pub const WATCHDOG_POLL_INTERVAL_MS: u64 = 100;

/// Re-check period while waiting for a frozen heartbeat to advance
pub const WATCHDOG_RECHECK_INTERVAL_MS: u64 = 1_000;

/// Freeze snapshots retained
pub const MAX_FREEZE_HISTORY: usize = 10;

/// Logical stack frames kept in a freeze snapshot
pub const FREEZE_STACK_LIMIT: usize = 32;

/// Heavy functions attached to a freeze snapshot
pub const FREEZE_HEAVY_FUNCTIONS: usize = 5;

/// Default number of entries in top-N reports
pub const DEFAULT_TOP_N: usize = 10;
