//! Timeout: matched requests hang, then abort with `timedout`

use super::{Counter, StrategyStats};
use crate::network::{AbortReason, UrlPattern};
use crate::result::NetsimResult;
use crate::route::{Route, RouteHandler};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Timeout parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// How long a matched request hangs before aborting (ms)
    pub timeout_ms: u64,
    /// Requests that hang
    pub pattern: UrlPattern,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            pattern: UrlPattern::contains_any(["/sse", "/metric"]),
        }
    }
}

impl TimeoutConfig {
    /// Default pattern with the given timeout
    #[must_use]
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            ..Self::default()
        }
    }

    /// Set the pattern
    #[must_use]
    pub fn with_pattern(mut self, pattern: UrlPattern) -> Self {
        self.pattern = pattern;
        self
    }
}

/// Counters of an installed timeout strategy
#[derive(Debug, Clone, Default)]
pub struct TimeoutHandle {
    timeouts: Counter,
}

impl TimeoutHandle {
    /// Requests timed out so far
    #[must_use]
    pub fn timeout_count(&self) -> u64 {
        self.timeouts.get()
    }

    /// Zero the counters
    pub fn reset(&self) {
        self.timeouts.reset();
    }

    /// Counter snapshot
    #[must_use]
    pub fn stats(&self) -> StrategyStats {
        StrategyStats::new("timeout").with("timeout_count", self.timeout_count())
    }
}

/// Holds matched requests until they time out
#[derive(Debug)]
pub struct TimeoutNetwork {
    config: TimeoutConfig,
    handle: TimeoutHandle,
}

impl TimeoutNetwork {
    /// Build the strategy
    #[must_use]
    pub fn new(config: TimeoutConfig) -> Self {
        Self {
            config,
            handle: TimeoutHandle::default(),
        }
    }

    /// Shared counters
    #[must_use]
    pub fn handle(&self) -> TimeoutHandle {
        self.handle.clone()
    }
}

#[async_trait]
impl RouteHandler for TimeoutNetwork {
    fn name(&self) -> &'static str {
        "timeout"
    }

    async fn handle(&self, route: Route) -> NetsimResult<()> {
        if !self.config.pattern.matches(route.url()) {
            return route.continue_request();
        }
        tokio::time::sleep(Duration::from_millis(self.config.timeout_ms)).await;

        let url = route.url().to_string();
        match route.abort(AbortReason::TimedOut) {
            Ok(()) => {
                let timeouts = self.handle.timeouts.incr();
                debug!(url = %url, timeouts, "timeout: request timed out");
            }
            Err(err) => debug!(url = %url, error = %err, "timeout: route already finished"),
        }
        Ok(())
    }
}
