//! Gradual recovery: a failing service that heals over repeated attempts
//!
//! Attempt `k` out of `R` recovery steps succeeds with probability
//! `min(k / R, 1)`. Authentication paths are exempt so a test can still sign in.

use super::{Counter, SharedRng, StrategyStats};
use crate::network::{AbortReason, UrlPattern};
use crate::result::{NetsimError, NetsimResult};
use crate::route::{Route, RouteHandler};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Gradual recovery parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GradualRecoveryConfig {
    /// Attempts until the service is fully healthy
    pub recovery_steps: u32,
    /// Requests subject to recovery
    pub pattern: UrlPattern,
    /// Requests that always pass and are not counted
    pub bypass: UrlPattern,
}

impl Default for GradualRecoveryConfig {
    fn default() -> Self {
        Self {
            recovery_steps: 5,
            pattern: UrlPattern::Any,
            bypass: UrlPattern::contains_any(["/login", "/auth"]),
        }
    }
}

impl GradualRecoveryConfig {
    /// Default patterns with the given step count
    #[must_use]
    pub fn new(recovery_steps: u32) -> Self {
        Self {
            recovery_steps,
            ..Self::default()
        }
    }

    /// Set the pattern
    #[must_use]
    pub fn with_pattern(mut self, pattern: UrlPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Step count must be positive
    pub fn validate(&self) -> NetsimResult<()> {
        if self.recovery_steps == 0 {
            return Err(NetsimError::invalid_parameter(
                "recovery_steps must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Success probability of attempt `attempt` out of `steps`
#[must_use]
pub fn success_probability(attempt: u64, steps: u32) -> f64 {
    if steps == 0 {
        return 1.0;
    }
    (attempt as f64 / f64::from(steps)).min(1.0)
}

/// Counters of an installed gradual recovery strategy
#[derive(Debug, Clone, Default)]
pub struct GradualRecoveryHandle {
    attempts: Counter,
}

impl GradualRecoveryHandle {
    /// Counted attempts so far
    #[must_use]
    pub fn attempt_count(&self) -> u64 {
        self.attempts.get()
    }

    /// Zero the counters, restarting the recovery
    pub fn reset(&self) {
        self.attempts.reset();
    }

    /// Counter snapshot
    #[must_use]
    pub fn stats(&self) -> StrategyStats {
        StrategyStats::new("gradual-recovery").with("attempt_count", self.attempt_count())
    }
}

/// Fails early attempts, recovering step by step
#[derive(Debug)]
pub struct GradualRecovery {
    config: GradualRecoveryConfig,
    rng: SharedRng,
    handle: GradualRecoveryHandle,
}

impl GradualRecovery {
    /// Build a validated strategy
    pub fn new(config: GradualRecoveryConfig, rng: SharedRng) -> NetsimResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            rng,
            handle: GradualRecoveryHandle::default(),
        })
    }

    /// Shared counters
    #[must_use]
    pub fn handle(&self) -> GradualRecoveryHandle {
        self.handle.clone()
    }
}

#[async_trait]
impl RouteHandler for GradualRecovery {
    fn name(&self) -> &'static str {
        "gradual-recovery"
    }

    async fn handle(&self, route: Route) -> NetsimResult<()> {
        let url = route.url();
        if self.config.bypass.matches(url) || !self.config.pattern.matches(url) {
            return route.continue_request();
        }
        let attempt = self.handle.attempts.incr();
        let probability = success_probability(attempt, self.config.recovery_steps);
        if self.rng.chance(probability) {
            debug!(url, attempt, probability, "gradual-recovery: passing");
            route.continue_request()
        } else {
            debug!(url, attempt, probability, "gradual-recovery: failing");
            route.abort(AbortReason::Failed)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::strategy::test_support::routed;
    use std::sync::Arc;

    #[test]
    fn test_success_probability() {
        assert!((success_probability(1, 4) - 0.25).abs() < f64::EPSILON);
        assert!((success_probability(4, 4) - 1.0).abs() < f64::EPSILON);
        assert!((success_probability(9, 4) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_steps_rejected() {
        assert!(GradualRecovery::new(GradualRecoveryConfig::new(0), SharedRng::seeded(0)).is_err());
    }

    #[tokio::test]
    async fn test_fully_recovered_after_steps() {
        let strategy =
            GradualRecovery::new(GradualRecoveryConfig::new(3), SharedRng::seeded(5)).unwrap();
        let handle = strategy.handle();
        let (ctx, _upstream) = routed(Arc::new(strategy));

        for _ in 0..3 {
            let _ = ctx.get("https://x.test/api/status").await;
        }
        for _ in 0..20 {
            ctx.get("https://x.test/api/status").await.unwrap();
        }
        assert_eq!(handle.attempt_count(), 23);
    }

    #[tokio::test]
    async fn test_auth_paths_bypass() {
        let strategy =
            GradualRecovery::new(GradualRecoveryConfig::new(1000), SharedRng::seeded(5)).unwrap();
        let handle = strategy.handle();
        let (ctx, _upstream) = routed(Arc::new(strategy));

        for _ in 0..10 {
            ctx.get("https://x.test/login").await.unwrap();
            ctx.get("https://x.test/auth/token").await.unwrap();
        }
        assert_eq!(handle.attempt_count(), 0);
    }

    #[tokio::test]
    async fn test_reset_restarts_recovery() {
        let strategy =
            GradualRecovery::new(GradualRecoveryConfig::new(2), SharedRng::seeded(5)).unwrap();
        let handle = strategy.handle();
        let (ctx, _upstream) = routed(Arc::new(strategy));

        let _ = ctx.get("https://x.test/api/a").await;
        let _ = ctx.get("https://x.test/api/a").await;
        handle.reset();
        assert_eq!(handle.stats().get("attempt_count"), 0);
    }
}
