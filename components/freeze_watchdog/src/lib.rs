//! Freeze watchdog for the Echo profiler
//!
//! A polling loop on its own thread watches the primary thread's heartbeat.
//! When the heartbeat goes stale it captures one [`FreezeSnapshot`] per
//! stall and keeps the most recent ones in a bounded history.
//!
//! [`FreezeSnapshot`]: echo_types::FreezeSnapshot

mod config;
mod error;
mod source;
mod watchdog;

pub use config::WatchdogConfig;
pub use error::{Result, WatchdogError};
pub use source::{EmptySnapshotSource, MemoryProbe, NullMemoryProbe, SnapshotSource};
pub use watchdog::FreezeWatchdog;
