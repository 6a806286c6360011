//! Session quality scoring for the Echo profiler
//!
//! Turns a snapshot of session counters into a 0-100 score with a list of
//! issues, and decides whether and where a report should be saved.

mod policy;
mod scorer;

pub use policy::{SaveLocation, SavePolicy};
pub use scorer::{QualityInputs, QualityScorer};
