//! Echo profiler component
//!
//! The explicit context object for the Echo profiler. An [`EchoComponent`]
//! is built once from an [`EchoConfig`] and owns every profiling module:
//!
//! - the span engine (push/pop, scopes, per-thread stacks)
//! - the statistics aggregator (rolling windows, histogram, spikes, rankings)
//! - the script profiler and its detailed sampling windows
//! - the freeze watchdog
//! - the session quality scorer and save policy

mod component;
mod config;
mod error;
mod session;
mod snapshot_source;

pub use component::EchoComponent;
pub use config::{EchoConfig, EchoConfigBuilder};
pub use error::{EchoError, Result};
pub use session::{HostSignals, SessionInfo};
pub use snapshot_source::ProfilerSnapshotSource;

pub use echo_types;
pub use freeze_watchdog;
pub use quality_scorer;
pub use script_tracking;
pub use span_engine;
pub use timing_aggregate;
