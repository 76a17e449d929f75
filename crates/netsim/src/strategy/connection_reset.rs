//! Connection reset: half of the matched requests drop mid-flight

use super::{Counter, SharedRng, StrategyStats};
use crate::network::{AbortReason, UrlPattern};
use crate::result::NetsimResult;
use crate::route::{Route, RouteHandler};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Connection reset parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionResetConfig {
    /// Requests subject to resets
    pub pattern: UrlPattern,
}

impl Default for ConnectionResetConfig {
    fn default() -> Self {
        Self {
            pattern: UrlPattern::contains("/api/"),
        }
    }
}

/// Counters of an installed connection reset strategy
#[derive(Debug, Clone, Default)]
pub struct ConnectionResetHandle {
    resets: Counter,
}

impl ConnectionResetHandle {
    /// Resets so far
    #[must_use]
    pub fn reset_count(&self) -> u64 {
        self.resets.get()
    }

    /// Zero the counters
    pub fn reset(&self) {
        self.resets.reset();
    }

    /// Counter snapshot
    #[must_use]
    pub fn stats(&self) -> StrategyStats {
        StrategyStats::new("connection-reset").with("reset_count", self.reset_count())
    }
}

/// Flips a coin per matched request
#[derive(Debug)]
pub struct ConnectionReset {
    config: ConnectionResetConfig,
    rng: SharedRng,
    handle: ConnectionResetHandle,
}

impl ConnectionReset {
    /// Build the strategy
    #[must_use]
    pub fn new(config: ConnectionResetConfig, rng: SharedRng) -> Self {
        Self {
            config,
            rng,
            handle: ConnectionResetHandle::default(),
        }
    }

    /// Shared counters
    #[must_use]
    pub fn handle(&self) -> ConnectionResetHandle {
        self.handle.clone()
    }
}

#[async_trait]
impl RouteHandler for ConnectionReset {
    fn name(&self) -> &'static str {
        "connection-reset"
    }

    async fn handle(&self, route: Route) -> NetsimResult<()> {
        if !self.config.pattern.matches(route.url()) || self.rng.coin() {
            return route.continue_request();
        }
        let resets = self.handle.resets.incr();
        debug!(url = route.url(), resets, "connection-reset: dropping request");
        // reported as a generic failure, not ERR_CONNECTION_RESET
        route.abort(AbortReason::Failed)
    }
}
