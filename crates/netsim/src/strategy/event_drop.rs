//! Event drop: a stream endpoint that goes silent after N events
//!
//! Stream detection needs the response headers, so every matched request is
//! fetched first. Event-stream responses are forwarded as fetched; other hits
//! count as events until the limit, after which everything matched is dropped.

use super::{Counter, StrategyStats};
use crate::network::{AbortReason, UrlPattern};
use crate::result::NetsimResult;
use crate::route::{Route, RouteHandler};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Event drop parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventDropConfig {
    /// Events delivered before the stream drops
    pub event_count: u64,
    /// Stream requests
    pub pattern: UrlPattern,
}

impl Default for EventDropConfig {
    fn default() -> Self {
        Self {
            event_count: 5,
            pattern: UrlPattern::contains("/sse"),
        }
    }
}

impl EventDropConfig {
    /// Default pattern with the given event count
    #[must_use]
    pub fn new(event_count: u64) -> Self {
        Self {
            event_count,
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

/// Counters of an installed event drop strategy
#[derive(Debug, Clone, Default)]
pub struct EventDropHandle {
    received: Counter,
    dropped: Arc<AtomicBool>,
}

impl EventDropHandle {
    /// Events seen so far
    #[must_use]
    pub fn received_events(&self) -> u64 {
        self.received.get()
    }

    /// Whether the stream has been dropped
    #[must_use]
    pub fn is_dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }

    /// Zero the counters and reopen the stream
    pub fn reset(&self) {
        self.received.reset();
        self.dropped.store(false, Ordering::SeqCst);
    }

    /// Counter snapshot
    #[must_use]
    pub fn stats(&self) -> StrategyStats {
        let mut stats =
            StrategyStats::new("event-drop").with("received_events", self.received_events());
        stats.dropped = Some(self.is_dropped());
        stats
    }
}

/// Drops a stream after a fixed number of events
#[derive(Debug)]
pub struct EventDrop {
    config: EventDropConfig,
    handle: EventDropHandle,
}

impl EventDrop {
    /// Build the strategy
    #[must_use]
    pub fn new(config: EventDropConfig) -> Self {
        Self {
            config,
            handle: EventDropHandle::default(),
        }
    }

    /// Shared counters
    #[must_use]
    pub fn handle(&self) -> EventDropHandle {
        self.handle.clone()
    }
}

#[async_trait]
impl RouteHandler for EventDrop {
    fn name(&self) -> &'static str {
        "event-drop"
    }

    async fn handle(&self, route: Route) -> NetsimResult<()> {
        if !self.config.pattern.matches(route.url()) {
            return route.continue_request();
        }
        if self.handle.is_dropped() {
            return route.abort(AbortReason::Failed);
        }

        let response = match route.fetch().await {
            Ok(response) => response,
            Err(err) => {
                debug!(url = route.url(), error = %err, "event-drop: upstream fetch failed");
                return route.abort(AbortReason::Failed);
            }
        };
        if response.is_event_stream() {
            return route.fulfill(response);
        }

        let received = self.handle.received.incr();
        if received > self.config.event_count {
            if !self.handle.dropped.swap(true, Ordering::SeqCst) {
                info!(url = route.url(), received, "event-drop: stream dropped");
            }
            return route.abort(AbortReason::Failed);
        }
        debug!(url = route.url(), received, "event-drop: event delivered");
        route.fulfill(response)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::network::FulfillResponse;
    use crate::strategy::test_support::routed;

    #[tokio::test]
    async fn test_drops_after_limit() {
        let strategy = EventDrop::new(EventDropConfig::new(2));
        let handle = strategy.handle();
        let (ctx, upstream) = routed(Arc::new(strategy));
        upstream.get("/sse/poll", FulfillResponse::text("data: tick"));

        ctx.get("https://x.test/sse/poll").await.unwrap();
        ctx.get("https://x.test/sse/poll").await.unwrap();
        assert!(!handle.is_dropped());

        let err = ctx.get("https://x.test/sse/poll").await.unwrap_err();
        assert_eq!(err.abort_reason(), Some(AbortReason::Failed));
        assert!(handle.is_dropped());
        assert_eq!(handle.received_events(), 3);

        // terminal: aborted without another fetch
        let fetched = upstream.fetch_count();
        assert!(ctx.get("https://x.test/sse/poll").await.is_err());
        assert_eq!(upstream.fetch_count(), fetched);
    }

    #[tokio::test]
    async fn test_event_stream_responses_pass() {
        let strategy = EventDrop::new(EventDropConfig::new(0));
        let handle = strategy.handle();
        let (ctx, upstream) = routed(Arc::new(strategy));
        upstream.event_stream("/sse/live", "data: hello\n\n");

        for _ in 0..5 {
            let resp = ctx.get("https://x.test/sse/live").await.unwrap();
            assert!(resp.is_event_stream());
        }
        assert_eq!(handle.received_events(), 0);
        assert!(!handle.is_dropped());
    }

    #[tokio::test]
    async fn test_reset_reopens_stream() {
        let strategy = EventDrop::new(EventDropConfig::new(0));
        let handle = strategy.handle();
        let (ctx, _upstream) = routed(Arc::new(strategy));

        assert!(ctx.get("https://x.test/sse").await.is_err());
        assert_eq!(handle.stats().dropped, Some(true));
        handle.reset();
        assert!(!handle.is_dropped());
        assert_eq!(handle.received_events(), 0);
    }
}
