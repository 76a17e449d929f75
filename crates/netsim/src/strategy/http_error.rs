//! HTTP error injection: canned 4xx/5xx responses

use super::{Counter, StrategyStats};
use crate::network::{FulfillResponse, UrlPattern};
use crate::result::{NetsimError, NetsimResult};
use crate::route::{Route, RouteHandler};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// HTTP error parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpErrorConfig {
    /// Status to answer with
    pub status: u16,
    /// Requests to fail
    pub pattern: UrlPattern,
}

impl Default for HttpErrorConfig {
    fn default() -> Self {
        Self {
            status: 503,
            pattern: UrlPattern::contains("/api/"),
        }
    }
}

impl HttpErrorConfig {
    /// Default pattern with the given status
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Set the pattern
    #[must_use]
    pub fn with_pattern(mut self, pattern: UrlPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Status must be a client or server error
    pub fn validate(&self) -> NetsimResult<()> {
        if (400..600).contains(&self.status) {
            Ok(())
        } else {
            Err(NetsimError::invalid_parameter(format!(
                "status must be 4xx or 5xx, got {}",
                self.status
            )))
        }
    }
}

/// Canned message for an error status
#[must_use]
pub const fn status_message(status: u16) -> &'static str {
    match status {
        400 => "Bad Request - Invalid request parameters",
        401 => "Unauthorized - Authentication required",
        403 => "Forbidden - Access denied",
        404 => "Not Found - Resource does not exist",
        429 => "Too Many Requests - Rate limit exceeded",
        500 => "Internal Server Error - Something went wrong",
        503 => "Service Unavailable - Server is temporarily down",
        504 => "Gateway Timeout - Upstream server did not respond",
        _ => "Unknown Error",
    }
}

/// JSON body served for `status`
#[must_use]
pub fn error_body(status: u16) -> serde_json::Value {
    serde_json::json!({
        "error": format!("HTTP {status}"),
        "message": status_message(status),
    })
}

/// Counters of an installed HTTP error strategy
#[derive(Debug, Clone, Default)]
pub struct HttpErrorHandle {
    errors: Counter,
}

impl HttpErrorHandle {
    /// Errors served so far
    #[must_use]
    pub fn error_count(&self) -> u64 {
        self.errors.get()
    }

    /// Zero the counters
    pub fn reset(&self) {
        self.errors.reset();
    }

    /// Counter snapshot
    #[must_use]
    pub fn stats(&self) -> StrategyStats {
        StrategyStats::new("http-error").with("error_count", self.error_count())
    }
}

/// Answers matched requests with an error status
#[derive(Debug)]
pub struct HttpErrorInjection {
    config: HttpErrorConfig,
    response: FulfillResponse,
    handle: HttpErrorHandle,
}

impl HttpErrorInjection {
    /// Build a validated strategy
    pub fn new(config: HttpErrorConfig) -> NetsimResult<Self> {
        config.validate()?;
        let response = FulfillResponse::json(&error_body(config.status))?.with_status(config.status);
        Ok(Self {
            config,
            response,
            handle: HttpErrorHandle::default(),
        })
    }

    /// Shared counters
    #[must_use]
    pub fn handle(&self) -> HttpErrorHandle {
        self.handle.clone()
    }
}

#[async_trait]
impl RouteHandler for HttpErrorInjection {
    fn name(&self) -> &'static str {
        "http-error"
    }

    async fn handle(&self, route: Route) -> NetsimResult<()> {
        if !self.config.pattern.matches(route.url()) {
            return route.continue_request();
        }
        let errors = self.handle.errors.incr();
        debug!(url = route.url(), status = self.config.status, errors, "http-error: injecting status");
        route.fulfill(self.response.clone())
    }
}
