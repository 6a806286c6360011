//! Error types for the Echo component

use thiserror::Error;

/// Errors that can occur configuring or starting the profiler
#[derive(Error, Debug)]
pub enum EchoError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Configuration could not be parsed or written
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Freeze watchdog error
    #[error("Watchdog error: {0}")]
    Watchdog(#[from] freeze_watchdog::WatchdogError),
}

/// Result type for Echo operations
pub type Result<T> = std::result::Result<T, EchoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EchoError::InvalidConfiguration("top_n must be > 0".to_string());
        assert_eq!(err.to_string(), "Invalid configuration: top_n must be > 0");

        let err = EchoError::from(freeze_watchdog::WatchdogError::InvalidConfiguration(
            "threshold_ms must be > 0".to_string(),
        ));
        assert_eq!(
            err.to_string(),
            "Watchdog error: Invalid watchdog configuration: threshold_ms must be > 0"
        );
    }

    #[test]
    fn test_json_error_converts() {
        let parse: std::result::Result<u32, _> = serde_json::from_str("not json");
        let err: EchoError = parse.unwrap_err().into();
        assert!(err.to_string().starts_with("Serialization error:"));
    }
}
