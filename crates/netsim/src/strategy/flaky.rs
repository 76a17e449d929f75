//! Flaky network: random outages on API and stream traffic

use super::{Counter, SharedRng, StrategyStats};
use crate::network::{AbortReason, UrlPattern};
use crate::result::{NetsimError, NetsimResult};
use crate::route::{Route, RouteHandler};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Flaky network parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlakyConfig {
    /// Probability in `[0, 1]` that an eligible request fails
    pub failure_rate: f64,
    /// Shortest simulated outage before the abort (ms)
    pub min_delay_ms: u64,
    /// Longest simulated outage before the abort (ms)
    pub max_delay_ms: u64,
    /// Requests eligible for failure; everything else passes
    pub scope: UrlPattern,
}

impl Default for FlakyConfig {
    fn default() -> Self {
        Self {
            failure_rate: 0.5,
            min_delay_ms: 1000,
            max_delay_ms: 3000,
            scope: UrlPattern::contains_any(["/api/", "/sse"]),
        }
    }
}

impl FlakyConfig {
    /// Config with the given failure rate and default delays
    #[must_use]
    pub fn new(failure_rate: f64) -> Self {
        Self {
            failure_rate,
            ..Self::default()
        }
    }

    /// Set the outage range
    #[must_use]
    pub const fn with_delay(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.min_delay_ms = min_ms;
        self.max_delay_ms = max_ms;
        self
    }

    /// Set the eligibility pattern
    #[must_use]
    pub fn with_scope(mut self, scope: UrlPattern) -> Self {
        self.scope = scope;
        self
    }

    /// Reject rates outside `[0, 1]` and inverted delay ranges
    pub fn validate(&self) -> NetsimResult<()> {
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return Err(NetsimError::invalid_parameter(format!(
                "failure_rate must be within [0, 1], got {}",
                self.failure_rate
            )));
        }
        if self.min_delay_ms > self.max_delay_ms {
            return Err(NetsimError::invalid_parameter(format!(
                "min_delay_ms ({}) exceeds max_delay_ms ({})",
                self.min_delay_ms, self.max_delay_ms
            )));
        }
        Ok(())
    }
}

/// Counters of an installed flaky strategy
#[derive(Debug, Clone, Default)]
pub struct FlakyHandle {
    aborts: Counter,
}

impl FlakyHandle {
    /// Simulated failures so far
    #[must_use]
    pub fn abort_count(&self) -> u64 {
        self.aborts.get()
    }

    /// Zero the counters
    pub fn reset(&self) {
        self.aborts.reset();
    }

    /// Counter snapshot
    #[must_use]
    pub fn stats(&self) -> StrategyStats {
        StrategyStats::new("flaky").with("abort_count", self.abort_count())
    }
}

/// Randomly fails eligible requests after a simulated outage
#[derive(Debug)]
pub struct FlakyNetwork {
    config: FlakyConfig,
    rng: SharedRng,
    handle: FlakyHandle,
}

impl FlakyNetwork {
    /// Build a validated strategy
    pub fn new(config: FlakyConfig, rng: SharedRng) -> NetsimResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            rng,
            handle: FlakyHandle::default(),
        })
    }

    /// Shared counters
    #[must_use]
    pub fn handle(&self) -> FlakyHandle {
        self.handle.clone()
    }
}

#[async_trait]
impl RouteHandler for FlakyNetwork {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn handle(&self, route: Route) -> NetsimResult<()> {
        if !self.config.scope.matches(route.url()) {
            return route.continue_request();
        }
        if !self.rng.chance(self.config.failure_rate) {
            return route.continue_request();
        }

        let failures = self.handle.aborts.incr();
        let outage = self
            .rng
            .delay_between(self.config.min_delay_ms, self.config.max_delay_ms);
        debug!(url = route.url(), failures, outage_ms = outage.as_millis() as u64, "flaky: failing request");
        tokio::time::sleep(outage).await;
        route.abort(AbortReason::Failed)
    }
}
