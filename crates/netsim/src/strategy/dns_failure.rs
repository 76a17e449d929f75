//! DNS failure: no host resolves

use super::{Counter, StrategyStats};
use crate::network::AbortReason;
use crate::result::NetsimResult;
use crate::route::{Route, RouteHandler};
use async_trait::async_trait;
use tracing::debug;

/// Counters of an installed DNS failure strategy
#[derive(Debug, Clone, Default)]
pub struct DnsFailureHandle {
    aborts: Counter,
}

impl DnsFailureHandle {
    /// Requests failed so far
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
        StrategyStats::new("dns-failure").with("abort_count", self.abort_count())
    }
}

/// Aborts every request with `namenotresolved`
#[derive(Debug, Default)]
pub struct DnsFailure {
    handle: DnsFailureHandle,
}

impl DnsFailure {
    /// Build the strategy
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared counters
    #[must_use]
    pub fn handle(&self) -> DnsFailureHandle {
        self.handle.clone()
    }
}

#[async_trait]
impl RouteHandler for DnsFailure {
    fn name(&self) -> &'static str {
        "dns-failure"
    }

    async fn handle(&self, route: Route) -> NetsimResult<()> {
        let aborts = self.handle.aborts.incr();
        debug!(url = route.url(), aborts, "dns-failure: name not resolved");
        route.abort(AbortReason::NameNotResolved)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::strategy::test_support::routed;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_every_request_fails() {
        let dns = DnsFailure::new();
        let handle = dns.handle();
        let (ctx, upstream) = routed(Arc::new(dns));

        for url in ["https://x.test/", "https://cdn.x.test/app.js", "https://x.test/api/a"] {
            let err = ctx.get(url).await.unwrap_err();
            assert_eq!(err.abort_reason(), Some(AbortReason::NameNotResolved));
        }
        assert_eq!(handle.abort_count(), 3);
        assert_eq!(upstream.fetch_count(), 0);

        handle.reset();
        assert_eq!(handle.stats().get("abort_count"), 0);
    }
}
