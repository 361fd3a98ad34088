//! Error types for the reporter.

use thiserror::Error;

/// Errors raised while configuring or running a reporter.
///
/// Nothing here escapes a poll tick: the poll loop logs every error and
/// carries on with the next metric or the next tick.
#[derive(Error, Debug)]
pub enum ReporterError {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Exclusion pattern failed to compile
    #[error("Invalid metric filter pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Document serialization failed
    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    /// Sampling a metric failed
    #[error("Registry error: {0}")]
    Registry(String),

    /// HTTP client failure
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Poll task failed to join
    #[error("Async task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// No node accepted the batch
    #[error("All endpoints failed after {attempts} attempts")]
    AllEndpointsFailed { attempts: usize },
}

/// Result type alias for reporter operations
pub type Result<T> = std::result::Result<T, ReporterError>;

impl ReporterError {
    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new registry error
    pub fn registry<S: Into<String>>(msg: S) -> Self {
        Self::Registry(msg.into())
    }

    /// Returns true if the next poll cycle may succeed where this one failed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Io(_) | Self::AllEndpointsFailed { .. } => true,
            Self::Registry(_) => true,
            _ => false,
        }
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::InvalidPattern(_) => "config",
            Self::Encode(_) => "encoding",
            Self::Registry(_) => "registry",
            Self::Transport(_) | Self::AllEndpointsFailed { .. } => "transport",
            Self::Io(_) => "io",
            Self::Join(_) => "async",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ReporterError::config("nodes must not be empty");
        assert_eq!(err.to_string(), "Configuration error: nodes must not be empty");
        assert_eq!(err.category(), "config");
    }

    #[test]
    fn test_error_recoverability() {
        assert!(ReporterError::AllEndpointsFailed { attempts: 3 }.is_recoverable());
        assert!(ReporterError::registry("gauge callback panicked").is_recoverable());
        assert!(!ReporterError::config("invalid config").is_recoverable());
    }

    #[test]
    fn test_invalid_pattern_converts() {
        let err: ReporterError = regex::Regex::new("(unclosed").unwrap_err().into();
        assert_eq!(err.category(), "config");
        assert!(err.to_string().starts_with("Invalid metric filter pattern"));
    }

    #[test]
    fn test_all_endpoints_failed_message() {
        let err = ReporterError::AllEndpointsFailed { attempts: 2 };
        assert_eq!(err.to_string(), "All endpoints failed after 2 attempts");
        assert_eq!(err.category(), "transport");
    }
}
