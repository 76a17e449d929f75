//! Upstream Networks
//!
//! The network a continued route reaches. [`MockUpstream`] serves canned
//! responses from an ordered route table and records every request it sees;
//! `HttpUpstream` (feature `http`) forwards to a real server.

use crate::network::{FulfillResponse, HttpMethod, InterceptedRequest, UrlPattern};
use crate::result::{NetsimError, NetsimResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Something that can answer an intercepted request for real
#[async_trait]
pub trait Upstream: Send + Sync + std::fmt::Debug {
    /// Fetch the response for `request`
    async fn fetch(&self, request: &InterceptedRequest) -> NetsimResult<FulfillResponse>;
}

/// A canned response entry in a [`MockUpstream`]
#[derive(Debug, Clone)]
pub struct UpstreamRoute {
    /// URL pattern to match
    pub pattern: UrlPattern,
    /// HTTP method to match
    pub method: HttpMethod,
    /// Response to return
    pub response: FulfillResponse,
    /// Number of times this route should be used (None = unlimited)
    pub times: Option<usize>,
    /// Number of times this route has been matched
    pub match_count: usize,
}

impl UpstreamRoute {
    /// Create a new route
    #[must_use]
    pub fn new(pattern: UrlPattern, method: HttpMethod, response: FulfillResponse) -> Self {
        Self {
            pattern,
            method,
            response,
            times: None,
            match_count: 0,
        }
    }

    /// Set how many times this route should match
    #[must_use]
    pub const fn times(mut self, n: usize) -> Self {
        self.times = Some(n);
        self
    }

    /// Check if this route matches a request
    #[must_use]
    pub fn matches(&self, url: &str, method: &HttpMethod) -> bool {
        !self.is_exhausted() && self.pattern.matches(url) && self.method.matches(method)
    }

    /// Check if route is exhausted
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.times.is_some_and(|max| self.match_count >= max)
    }
}

/// Scriptable in-memory upstream
#[derive(Debug)]
pub struct MockUpstream {
    routes: Mutex<Vec<UpstreamRoute>>,
    captured: Mutex<Vec<InterceptedRequest>>,
    default_response: FulfillResponse,
    fetches: AtomicU64,
}

impl Default for MockUpstream {
    fn default() -> Self {
        Self::new()
    }
}

impl MockUpstream {
    /// Create an upstream answering `200 {}` to everything
    #[must_use]
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(Vec::new()),
            captured: Mutex::new(Vec::new()),
            default_response: FulfillResponse::new().with_body(b"{}".to_vec()),
            fetches: AtomicU64::new(0),
        }
    }

    /// Replace the response used when no route matches
    #[must_use]
    pub fn with_default(mut self, response: FulfillResponse) -> Self {
        self.default_response = response;
        self
    }

    /// Add a route
    pub fn route(&self, route: UpstreamRoute) {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(route);
    }

    /// Add a GET route matching a URL substring
    pub fn get(&self, pattern: &str, response: FulfillResponse) {
        self.route(UpstreamRoute::new(
            UrlPattern::contains(pattern),
            HttpMethod::Get,
            response,
        ));
    }

    /// Add a POST route matching a URL substring
    pub fn post(&self, pattern: &str, response: FulfillResponse) {
        self.route(UpstreamRoute::new(
            UrlPattern::contains(pattern),
            HttpMethod::Post,
            response,
        ));
    }

    /// Serve `text/event-stream` for any method on URLs containing `pattern`
    pub fn event_stream(&self, pattern: &str, events: &str) {
        self.route(UpstreamRoute::new(
            UrlPattern::contains(pattern),
            HttpMethod::Any,
            FulfillResponse::event_stream(events),
        ));
    }

    /// Get route count
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Clear all routes
    pub fn clear_routes(&self) {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of fetches served
    #[must_use]
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    /// All requests that reached this upstream
    #[must_use]
    pub fn captured_requests(&self) -> Vec<InterceptedRequest> {
        self.captured
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Requests that reached this upstream matching a URL pattern
    #[must_use]
    pub fn requests_matching(&self, pattern: &UrlPattern) -> Vec<InterceptedRequest> {
        self.captured_requests()
            .into_iter()
            .filter(|r| pattern.matches(&r.url))
            .collect()
    }

    /// Assert a request reached the upstream
    pub fn assert_requested(&self, pattern: &UrlPattern) -> NetsimResult<()> {
        if self.requests_matching(pattern).is_empty() {
            return Err(NetsimError::AssertionFailed {
                message: format!("Expected request matching {}, but none found", pattern),
            });
        }
        Ok(())
    }

    /// Assert a request reached the upstream exactly N times
    pub fn assert_requested_times(&self, pattern: &UrlPattern, times: usize) -> NetsimResult<()> {
        let found = self.requests_matching(pattern).len();
        if found != times {
            return Err(NetsimError::AssertionFailed {
                message: format!(
                    "Expected {} requests matching {}, but found {}",
                    times, pattern, found
                ),
            });
        }
        Ok(())
    }

    /// Assert no request matching a pattern reached the upstream
    pub fn assert_not_requested(&self, pattern: &UrlPattern) -> NetsimResult<()> {
        let found = self.requests_matching(pattern).len();
        if found != 0 {
            return Err(NetsimError::AssertionFailed {
                message: format!(
                    "Expected no requests matching {}, but found {}",
                    pattern, found
                ),
            });
        }
        Ok(())
    }

    /// Clear captured requests
    pub fn clear_captured(&self) {
        self.captured
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn respond(&self, request: &InterceptedRequest) -> FulfillResponse {
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        for route in routes.iter_mut() {
            if route.matches(&request.url, &request.method) {
                route.match_count += 1;
                return route.response.clone();
            }
        }
        self.default_response.clone()
    }
}

#[async_trait]
impl Upstream for MockUpstream {
    async fn fetch(&self, request: &InterceptedRequest) -> NetsimResult<FulfillResponse> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.captured
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        Ok(self.respond(request))
    }
}

/// Upstream that performs real HTTP requests.
///
/// Event-stream bodies never end on their own, so they are read for at most
/// [`HttpUpstream::stream_window`] and returned with whatever arrived.
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    stream_window: std::time::Duration,
}

#[cfg(feature = "http")]
impl Default for HttpUpstream {
    fn default() -> Self {
        Self::with_client(reqwest::Client::new())
    }
}

#[cfg(feature = "http")]
impl HttpUpstream {
    /// Default read window for event-stream bodies
    pub const DEFAULT_STREAM_WINDOW: std::time::Duration = std::time::Duration::from_secs(1);

    /// Create an upstream with a default client
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an upstream from an existing client
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            stream_window: Self::DEFAULT_STREAM_WINDOW,
        }
    }

    /// Set how long event-stream bodies are read
    #[must_use]
    pub const fn with_stream_window(mut self, window: std::time::Duration) -> Self {
        self.stream_window = window;
        self
    }

    /// Read window for event-stream bodies
    #[must_use]
    pub const fn stream_window(&self) -> std::time::Duration {
        self.stream_window
    }

    async fn read_stream(&self, mut response: reqwest::Response) -> reqwest::Result<Vec<u8>> {
        let deadline = tokio::time::Instant::now() + self.stream_window;
        let mut body = Vec::new();
        loop {
            match tokio::time::timeout_at(deadline, response.chunk()).await {
                Ok(Ok(Some(chunk))) => body.extend_from_slice(&chunk),
                Ok(Ok(None)) | Err(_) => return Ok(body),
                Ok(Err(e)) => return Err(e),
            }
        }
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl Upstream for HttpUpstream {
    async fn fetch(&self, request: &InterceptedRequest) -> NetsimResult<FulfillResponse> {
        let upstream_err = |e: reqwest::Error| NetsimError::Upstream {
            url: request.url.clone(),
            message: e.to_string(),
        };

        let method = match request.method {
            HttpMethod::Get | HttpMethod::Any => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        };

        let mut builder = self.client.request(method, &request.url);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(upstream_err)?;
        let status = response.status().as_u16();
        let headers: std::collections::HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let content_type = headers
            .get("content-type")
            .cloned()
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let body = if content_type
            .to_ascii_lowercase()
            .starts_with("text/event-stream")
        {
            self.read_stream(response).await.map_err(upstream_err)?
        } else {
            response.bytes().await.map_err(upstream_err)?.to_vec()
        };
        tracing::debug!(url = %request.url, status, bytes = body.len(), "upstream response");

        Ok(FulfillResponse {
            status,
            headers,
            body,
            content_type,
        })
    }
}
