//! Result and error types for the network simulator.

use crate::network::AbortReason;
use thiserror::Error;

/// Result type for simulator operations
pub type NetsimResult<T> = Result<T, NetsimError>;

/// Errors that can occur while simulating network conditions
#[derive(Debug, Error)]
pub enum NetsimError {
    /// The request was aborted by a route handler or by the context
    #[error("Request to {url} aborted: {}", reason.message())]
    RequestAborted {
        /// URL of the aborted request
        url: String,
        /// Abort reason
        reason: AbortReason,
    },

    /// The waiting side of a route is gone (context closed or request dropped)
    #[error("Route for {url} is already closed")]
    RouteClosed {
        /// URL of the route
        url: String,
    },

    /// A route handler returned without continuing, fulfilling or aborting
    #[error("Route for {url} was dropped without being resolved")]
    RouteUnresolved {
        /// URL of the route
        url: String,
    },

    /// The browsing context has been closed
    #[error("Browser context {id} is closed")]
    ContextClosed {
        /// Context ID
        id: String,
    },

    /// A strategy is already installed on the simulator
    #[error("Cannot install '{requested}': '{active}' is still active, call reset() first")]
    StrategyActive {
        /// Currently active condition
        active: String,
        /// Condition that was refused
        requested: String,
    },

    /// Unknown network condition name
    #[error("Unknown network condition '{name}' (expected one of: {expected})")]
    InvalidCondition {
        /// Name that failed to parse
        name: String,
        /// Accepted names
        expected: String,
    },

    /// Invalid strategy parameter
    #[error("Invalid parameter: {message}")]
    InvalidParameter {
        /// Error message
        message: String,
    },

    /// Invalid URL pattern
    #[error("Invalid URL pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Upstream fetch failed
    #[error("Upstream fetch of {url} failed: {message}")]
    Upstream {
        /// Requested URL
        url: String,
        /// Error message
        message: String,
    },

    /// Assertion failed
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl NetsimError {
    /// Create an invalid parameter error
    #[must_use]
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    /// The abort reason, if this error is an aborted request
    #[must_use]
    pub const fn abort_reason(&self) -> Option<AbortReason> {
        match self {
            Self::RequestAborted { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_request_aborted_message() {
        let err = NetsimError::RequestAborted {
            url: "https://cockpit.test/api/widgets".to_string(),
            reason: AbortReason::TimedOut,
        };
        let msg = err.to_string();
        assert!(msg.contains("/api/widgets"));
        assert!(msg.contains("net::ERR_TIMED_OUT"));
        assert_eq!(err.abort_reason(), Some(AbortReason::TimedOut));
    }

    #[test]
    fn test_strategy_active_message() {
        let err = NetsimError::StrategyActive {
            active: "flaky".to_string(),
            requested: "slow".to_string(),
        };
        assert!(err.to_string().contains("reset()"));
        assert!(err.abort_reason().is_none());
    }

    #[test]
    fn test_invalid_pattern_from_regex() {
        let regex_err = regex::Regex::new("(unclosed").unwrap_err();
        let err: NetsimError = regex_err.into();
        assert!(err.to_string().contains("Invalid URL pattern"));
    }

    #[test]
    fn test_invalid_parameter() {
        let err = NetsimError::invalid_parameter("failure_rate must be within [0, 1]");
        assert!(err.to_string().contains("failure_rate"));
    }
}
