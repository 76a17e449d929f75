//! Route Interception
//!
//! A [`Route`] is one intercepted request waiting for its handler's verdict.
//! The three resolution methods consume the route, so a request can only be
//! continued, fulfilled or aborted once. Dropping a route without resolving it
//! fails the waiting request with [`NetsimError::RouteUnresolved`].

use crate::network::{AbortReason, FulfillResponse, InterceptedRequest};
use crate::result::{NetsimError, NetsimResult};
use crate::upstream::Upstream;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Verdict a handler reached for a route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RouteOutcome {
    /// Let the request proceed to the upstream
    Continue,
    /// Answer with a synthetic (or pre-fetched) response
    Fulfill(FulfillResponse),
    /// Terminate the request
    Abort(AbortReason),
}

impl Default for RouteOutcome {
    fn default() -> Self {
        Self::Continue
    }
}

/// An intercepted request awaiting resolution
#[derive(Debug)]
pub struct Route {
    request: InterceptedRequest,
    upstream: Arc<dyn Upstream>,
    resolver: oneshot::Sender<RouteOutcome>,
}

impl Route {
    /// Create a route and the receiver its outcome is delivered to
    #[must_use]
    pub fn channel(
        request: InterceptedRequest,
        upstream: Arc<dyn Upstream>,
    ) -> (Self, oneshot::Receiver<RouteOutcome>) {
        let (resolver, receiver) = oneshot::channel();
        (
            Self {
                request,
                upstream,
                resolver,
            },
            receiver,
        )
    }

    /// The intercepted request
    #[must_use]
    pub const fn request(&self) -> &InterceptedRequest {
        &self.request
    }

    /// Request URL
    #[must_use]
    pub fn url(&self) -> &str {
        &self.request.url
    }

    /// Whether the waiting side is gone (context closed or request dropped)
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.resolver.is_closed()
    }

    /// Perform the real request against the upstream without resolving the route
    pub async fn fetch(&self) -> NetsimResult<FulfillResponse> {
        self.upstream.fetch(&self.request).await
    }

    /// Let the request proceed unmodified
    pub fn continue_request(self) -> NetsimResult<()> {
        self.resolve(RouteOutcome::Continue)
    }

    /// Answer the request with `response`
    pub fn fulfill(self, response: FulfillResponse) -> NetsimResult<()> {
        self.resolve(RouteOutcome::Fulfill(response))
    }

    /// Terminate the request with `reason`
    pub fn abort(self, reason: AbortReason) -> NetsimResult<()> {
        self.resolve(RouteOutcome::Abort(reason))
    }

    fn resolve(self, outcome: RouteOutcome) -> NetsimResult<()> {
        let url = self.request.url;
        self.resolver
            .send(outcome)
            .map_err(|_| NetsimError::RouteClosed { url })
    }
}

/// A route handler decides the fate of every request in a browsing context
#[async_trait]
pub trait RouteHandler: Send + Sync + std::fmt::Debug {
    /// Short name used in logs and reports
    fn name(&self) -> &'static str;

    /// Resolve `route` by continuing, fulfilling or aborting it
    async fn handle(&self, route: Route) -> NetsimResult<()>;
}
