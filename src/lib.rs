//! Echo: a low-overhead hierarchical runtime profiler
//!
//! Re-exports the [`EchoComponent`] context and every profiler module. See
//! the `echo_component` crate for the wiring.

pub use echo_component::*;
