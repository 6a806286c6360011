//! Error types for the freeze watchdog

use thiserror::Error;

/// Errors that can occur starting or configuring the watchdog
#[derive(Error, Debug)]
pub enum WatchdogError {
    /// Invalid configuration
    #[error("Invalid watchdog configuration: {0}")]
    InvalidConfiguration(String),

    /// The watchdog thread could not be spawned
    #[error("Failed to spawn watchdog thread: {0}")]
    SpawnFailed(#[from] std::io::Error),
}

/// Result type for watchdog operations
pub type Result<T> = std::result::Result<T, WatchdogError>;
