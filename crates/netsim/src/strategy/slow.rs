//! Slow network: fixed latency plus optional bandwidth throttling

use super::{Counter, StrategyStats};
use crate::network::{AbortReason, UrlPattern};
use crate::result::{NetsimError, NetsimResult};
use crate::route::{Route, RouteHandler};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Slow network parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlowConfig {
    /// Latency added to every matched request (ms)
    pub delay_ms: u64,
    /// Throughput cap in kilobits per second
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandwidth_kbps: Option<f64>,
    /// Requests to slow down
    pub pattern: UrlPattern,
}

impl Default for SlowConfig {
    fn default() -> Self {
        Self {
            delay_ms: 2000,
            bandwidth_kbps: None,
            pattern: UrlPattern::Any,
        }
    }
}

impl SlowConfig {
    /// Latency only
    #[must_use]
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            ..Self::default()
        }
    }

    /// Add a bandwidth cap
    #[must_use]
    pub const fn with_bandwidth(mut self, kbps: f64) -> Self {
        self.bandwidth_kbps = Some(kbps);
        self
    }

    /// Restrict to matching requests
    #[must_use]
    pub fn with_pattern(mut self, pattern: UrlPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Bandwidth must be positive when set
    pub fn validate(&self) -> NetsimResult<()> {
        match self.bandwidth_kbps {
            Some(kbps) if !(kbps.is_finite() && kbps > 0.0) => Err(
                NetsimError::invalid_parameter(format!("bandwidth_kbps must be positive, got {kbps}")),
            ),
            _ => Ok(()),
        }
    }
}

/// Transfer time of `bytes` at `kbps` (1 kbps = 1024 bytes/s).
///
/// Zero for a non-positive or non-finite rate; saturates at `Duration::MAX`.
#[must_use]
pub fn bandwidth_delay(bytes: u64, kbps: f64) -> Duration {
    if !(kbps.is_finite() && kbps > 0.0) {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(bytes as f64 / (kbps * 1024.0)).unwrap_or(Duration::MAX)
}

/// Counters of an installed slow strategy
#[derive(Debug, Clone, Default)]
pub struct SlowHandle {
    requests: Counter,
}

impl SlowHandle {
    /// Requests slowed so far
    #[must_use]
    pub fn request_count(&self) -> u64 {
        self.requests.get()
    }

    /// Zero the counters
    pub fn reset(&self) {
        self.requests.reset();
    }

    /// Counter snapshot
    #[must_use]
    pub fn stats(&self) -> StrategyStats {
        StrategyStats::new("slow").with("request_count", self.request_count())
    }
}

/// Delays matched requests
#[derive(Debug)]
pub struct SlowNetwork {
    config: SlowConfig,
    handle: SlowHandle,
}

impl SlowNetwork {
    /// Build a validated strategy
    pub fn new(config: SlowConfig) -> NetsimResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            handle: SlowHandle::default(),
        })
    }

    /// Shared counters
    #[must_use]
    pub fn handle(&self) -> SlowHandle {
        self.handle.clone()
    }
}

#[async_trait]
impl RouteHandler for SlowNetwork {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn handle(&self, route: Route) -> NetsimResult<()> {
        if !self.config.pattern.matches(route.url()) {
            return route.continue_request();
        }
        let seen = self.handle.requests.incr();
        debug!(url = route.url(), seen, delay_ms = self.config.delay_ms, "slow: delaying request");
        tokio::time::sleep(Duration::from_millis(self.config.delay_ms)).await;

        let Some(kbps) = self.config.bandwidth_kbps else {
            return route.continue_request();
        };

        let response = match route.fetch().await {
            Ok(response) => response,
            Err(err) => {
                debug!(url = route.url(), error = %err, "slow: upstream fetch failed");
                return route.abort(AbortReason::Failed);
            }
        };
        let bytes = response.content_length().unwrap_or_else(|| response.payload_len());
        let transfer = bandwidth_delay(bytes, kbps);
        debug!(url = route.url(), bytes, transfer_ms = transfer.as_millis() as u64, "slow: throttling body");
        tokio::time::sleep(transfer).await;
        route.fulfill(response)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::network::FulfillResponse;
    use crate::strategy::test_support::routed;
    use std::sync::Arc;
    use tokio::time::Instant;

    #[test]
    fn test_bandwidth_delay() {
        assert_eq!(bandwidth_delay(1024, 1.0), Duration::from_secs(1));
        assert_eq!(bandwidth_delay(2048, 2.0), Duration::from_secs(1));
        assert_eq!(bandwidth_delay(100, 0.0), Duration::ZERO);
    }

    #[test]
    fn test_bandwidth_delay_extreme_inputs() {
        assert_eq!(bandwidth_delay(100, f64::NAN), Duration::ZERO);
        assert_eq!(bandwidth_delay(100, f64::INFINITY), Duration::ZERO);
        assert_eq!(bandwidth_delay(100, -f64::INFINITY), Duration::ZERO);
        assert_eq!(bandwidth_delay(u64::MAX, 1e-6), Duration::MAX);
        assert_eq!(bandwidth_delay(u64::MAX, f64::MIN_POSITIVE), Duration::MAX);
        assert_eq!(bandwidth_delay(0, 1e-6), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_transfer_keeps_route_pending() {
        let slow = SlowNetwork::new(SlowConfig::new(0).with_bandwidth(1e-6)).unwrap();
        let (ctx, upstream) = routed(Arc::new(slow));
        upstream.get(
            "/huge",
            FulfillResponse::text("x").with_header("Content-Length", "100000000000000000"),
        );

        let pending =
            tokio::time::timeout(Duration::from_secs(3600), ctx.get("https://x.test/huge")).await;
        assert!(pending.is_err(), "handler resolved early: {pending:?}");
    }

    #[test]
    fn test_validate_rejects_non_positive_bandwidth() {
        assert!(SlowConfig::new(10).with_bandwidth(0.0).validate().is_err());
        assert!(SlowConfig::new(10).with_bandwidth(1.6).validate().is_ok());
        assert!(SlowNetwork::new(SlowConfig::new(10).with_bandwidth(-1.0)).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_applied_to_every_request() {
        let slow = SlowNetwork::new(SlowConfig::new(400)).unwrap();
        let handle = slow.handle();
        let (ctx, upstream) = routed(Arc::new(slow));

        for _ in 0..3 {
            let started = Instant::now();
            ctx.get("https://x.test/api/data").await.unwrap();
            assert!(started.elapsed() >= Duration::from_millis(400));
        }
        assert_eq!(handle.request_count(), 3);
        assert_eq!(upstream.fetch_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bandwidth_uses_content_length() {
        let slow = SlowNetwork::new(SlowConfig::new(100).with_bandwidth(1.0)).unwrap();
        let (ctx, upstream) = routed(Arc::new(slow));
        upstream.get(
            "/big",
            FulfillResponse::text("x").with_header("Content-Length", "2048"),
        );

        let started = Instant::now();
        let resp = ctx.get("https://x.test/big").await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(2100));
        assert_eq!(resp.body_string(), "x");
        // the pre-fetched response is fulfilled, not fetched twice
        assert_eq!(upstream.fetch_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bandwidth_falls_back_to_body_length() {
        let slow = SlowNetwork::new(SlowConfig::new(0).with_bandwidth(1.0)).unwrap();
        let (ctx, upstream) = routed(Arc::new(slow));
        upstream.get("/blob", FulfillResponse::text(&"a".repeat(512)));

        let started = Instant::now();
        ctx.get("https://x.test/blob").await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pattern_limits_scope() {
        let slow = SlowNetwork::new(
            SlowConfig::new(1000).with_pattern(UrlPattern::contains("/api/")),
        )
        .unwrap();
        let handle = slow.handle();
        let (ctx, _upstream) = routed(Arc::new(slow));

        let started = Instant::now();
        ctx.get("https://x.test/index.html").await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(1000));
        assert_eq!(handle.request_count(), 0);
    }
}
