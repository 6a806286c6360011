//! Monotonic time sources
//!
//! Every span, window and heartbeat timestamp in Echo comes from a [`Clock`].
//! Production code uses [`MonotonicClock`]; tests and replay tools drive a
//! [`ManualClock`] by hand.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic nanosecond time source
pub trait Clock: Send + Sync + fmt::Debug {
    /// Nanoseconds since an arbitrary, fixed origin
    fn now_nanos(&self) -> u64;

    /// Milliseconds since the same origin
    fn now_millis(&self) -> u64 {
        self.now_nanos() / 1_000_000
    }
}

/// Clock shared between components
pub type SharedClock = Arc<dyn Clock>;

/// [`Instant`]-backed clock anchored at construction time
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Create a clock whose origin is "now"
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Create a shared handle to a fresh monotonic clock
    pub fn shared() -> SharedClock {
        Arc::new(Self::new())
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_nanos(&self) -> u64 {
        // Offset by one so that no reading is ever zero; zero is reserved by
        // callers as "never happened".
        self.origin.elapsed().as_nanos() as u64 + 1
    }
}

/// Hand-driven clock
///
/// Starts at zero and only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    /// Create a manual clock at t=0
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shared manual clock at t=0
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Jump to an absolute time in nanoseconds
    pub fn set_nanos(&self, nanos: u64) {
        self.nanos.store(nanos, Ordering::SeqCst);
    }

    /// Jump to an absolute time in milliseconds
    pub fn set_millis(&self, millis: u64) {
        self.set_nanos(millis * 1_000_000);
    }

    /// Move forward by a duration
    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Move forward by whole milliseconds
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }
}

impl Clock for ManualClock {
    fn now_nanos(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst)
    }
}
