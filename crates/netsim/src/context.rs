//! Browser Context
//!
//! An isolated browsing context owning the single route handler every
//! outbound request passes through, the native offline toggle, and the
//! upstream network continued routes reach.
//!
//! ## Toyota Way Application
//!
//! - **Jidoka**: A handler that forgets to resolve a route fails the request
//!   instead of hanging the test
//! - **Mieruka**: Every request is recorded with its outcome and latency

use crate::network::{AbortReason, FulfillResponse, HttpMethod, InterceptedRequest};
use crate::result::{NetsimError, NetsimResult};
use crate::route::{Route, RouteHandler, RouteOutcome};
use crate::upstream::Upstream;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Browser context state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextState {
    /// Context is accepting requests
    Ready,
    /// Context is closed
    Closed,
}

/// Configuration for a browser context
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Context name
    pub name: String,
    /// Start in offline mode
    pub offline: bool,
    /// Extra HTTP headers added to every request
    pub extra_headers: HashMap<String, String>,
    /// Keep a log of every request and its outcome
    pub record_requests: bool,
    /// Most recent requests kept in the log; older entries are dropped
    pub request_log_limit: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            offline: false,
            extra_headers: HashMap::new(),
            record_requests: true,
            request_log_limit: Self::DEFAULT_REQUEST_LOG_LIMIT,
        }
    }
}

impl ContextConfig {
    /// Default request log capacity
    pub const DEFAULT_REQUEST_LOG_LIMIT: usize = 1000;

    /// Create a new context config
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Start offline
    #[must_use]
    pub const fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    /// Add extra header
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.extra_headers
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Disable the request log
    #[must_use]
    pub const fn without_request_log(mut self) -> Self {
        self.record_requests = false;
        self
    }

    /// Keep at most `limit` requests in the log
    #[must_use]
    pub const fn with_request_log_limit(mut self, limit: usize) -> Self {
        self.request_log_limit = limit;
        self
    }
}

/// How a recorded request ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordedOutcome {
    /// A response was delivered (from upstream or fulfilled by a handler)
    Response {
        /// HTTP status
        status: u16,
    },
    /// The request was aborted
    Aborted {
        /// Abort reason
        reason: AbortReason,
    },
    /// The request failed for another reason
    Failed {
        /// Error message
        message: String,
    },
}

/// One entry of the context's request log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRecord {
    /// Request URL
    pub url: String,
    /// HTTP method
    pub method: HttpMethod,
    /// Outcome
    pub outcome: RecordedOutcome,
    /// Time from dispatch to outcome
    pub elapsed_ms: u64,
}

/// A browser context instance
#[derive(Debug)]
pub struct BrowserContext {
    id: String,
    config: ContextConfig,
    state: Mutex<ContextState>,
    offline: AtomicBool,
    handler: RwLock<Option<Arc<dyn RouteHandler>>>,
    upstream: Arc<dyn Upstream>,
    closed: watch::Sender<bool>,
    log: Mutex<VecDeque<RequestRecord>>,
    condition_owner: Mutex<Option<String>>,
}

impl BrowserContext {
    /// Create a new context in front of `upstream`
    #[must_use]
    pub fn new(config: ContextConfig, upstream: Arc<dyn Upstream>) -> Self {
        let id = format!("ctx_{}", uuid::Uuid::new_v4());
        let (closed, _) = watch::channel(false);
        Self {
            offline: AtomicBool::new(config.offline),
            id,
            config,
            state: Mutex::new(ContextState::Ready),
            handler: RwLock::new(None),
            upstream,
            closed,
            log: Mutex::new(VecDeque::new()),
            condition_owner: Mutex::new(None),
        }
    }

    /// Context ID
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Configuration
    #[must_use]
    pub const fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> ContextState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check if context is closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state() == ContextState::Closed
    }

    /// Toggle the native offline mode
    pub fn set_offline(&self, offline: bool) {
        let previous = self.offline.swap(offline, Ordering::SeqCst);
        if previous != offline {
            info!(context = %self.id, offline, "offline mode changed");
        }
    }

    /// Check if offline mode is on
    #[must_use]
    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    /// Install the route handler, replacing any previous one
    pub fn route(&self, handler: Arc<dyn RouteHandler>) -> NetsimResult<()> {
        if self.is_closed() {
            return Err(NetsimError::ContextClosed {
                id: self.id.clone(),
            });
        }
        let mut slot = self.handler.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.as_ref() {
            warn!(
                context = %self.id,
                previous = previous.name(),
                next = handler.name(),
                "replacing active route handler"
            );
        }
        debug!(context = %self.id, handler = handler.name(), "route handler installed");
        *slot = Some(handler);
        Ok(())
    }

    /// Remove the route handler
    pub fn unroute_all(&self) {
        let removed = self
            .handler
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handler) = removed {
            debug!(context = %self.id, handler = handler.name(), "route handler removed");
        }
    }

    /// Check if a route handler is installed
    #[must_use]
    pub fn has_route(&self) -> bool {
        self.route_name().is_some()
    }

    /// Name of the installed route handler
    #[must_use]
    pub fn route_name(&self) -> Option<&'static str> {
        self.handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|h| h.name())
    }

    /// Active condition: the installed route handler, else `"offline"`
    #[must_use]
    pub fn condition(&self) -> Option<String> {
        self.route_name()
            .or_else(|| self.is_offline().then_some("offline"))
            .map(str::to_string)
    }

    /// Simulator that installed the active condition
    #[must_use]
    pub fn condition_owner(&self) -> Option<String> {
        self.condition()?;
        self.lock_owner().clone()
    }

    /// Install a named condition for `owner`: `handler` routes every request,
    /// `None` switches to offline mode. Refused while another condition is
    /// active unless `replace` is set.
    pub(crate) fn install_condition(
        &self,
        owner: &str,
        name: &str,
        handler: Option<Arc<dyn RouteHandler>>,
        replace: bool,
    ) -> NetsimResult<()> {
        let mut slot = self.lock_owner();
        if self.is_closed() {
            return Err(NetsimError::ContextClosed {
                id: self.id.clone(),
            });
        }
        if let Some(active) = self.condition() {
            if !replace {
                warn!(
                    context = %self.id,
                    active = %active,
                    requested = name,
                    "refusing to install condition without reset()"
                );
                return Err(NetsimError::StrategyActive {
                    active,
                    requested: name.to_string(),
                });
            }
            warn!(context = %self.id, active = %active, requested = name, "replacing active condition");
            self.unroute_all();
            self.set_offline(false);
        }
        match handler {
            Some(handler) => self.route(handler)?,
            None => self.set_offline(true),
        }
        *slot = Some(owner.to_string());
        Ok(())
    }

    /// Remove routing, go back online and forget the condition owner.
    /// Returns the condition that was active.
    pub(crate) fn clear_condition(&self) -> Option<String> {
        let mut slot = self.lock_owner();
        let previous = self.condition();
        self.unroute_all();
        self.set_offline(false);
        *slot = None;
        previous
    }

    fn lock_owner(&self) -> MutexGuard<'_, Option<String>> {
        self.condition_owner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Close the context, failing any request still waiting on a handler
    pub fn close(&self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = ContextState::Closed;
        self.unroute_all();
        self.closed.send_replace(true);
        info!(context = %self.id, "context closed");
    }

    /// Issue a GET request
    pub async fn get(&self, url: &str) -> NetsimResult<FulfillResponse> {
        self.request(InterceptedRequest::get(url)).await
    }

    /// Issue a request through the route handler
    pub async fn request(&self, request: InterceptedRequest) -> NetsimResult<FulfillResponse> {
        let started = Instant::now();
        let url = request.url.clone();
        let method = request.method;

        let result = self.dispatch(request).await;

        if self.config.record_requests && self.config.request_log_limit > 0 {
            let outcome = match &result {
                Ok(response) => RecordedOutcome::Response {
                    status: response.status,
                },
                Err(NetsimError::RequestAborted { reason, .. }) => {
                    RecordedOutcome::Aborted { reason: *reason }
                }
                Err(err) => RecordedOutcome::Failed {
                    message: err.to_string(),
                },
            };
            let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
            while log.len() >= self.config.request_log_limit {
                log.pop_front();
            }
            log.push_back(RequestRecord {
                url,
                method,
                outcome,
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }

        result
    }

    async fn dispatch(&self, mut request: InterceptedRequest) -> NetsimResult<FulfillResponse> {
        if self.is_closed() {
            return Err(NetsimError::ContextClosed {
                id: self.id.clone(),
            });
        }

        for (key, value) in &self.config.extra_headers {
            request
                .headers
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        if self.is_offline() {
            return Err(NetsimError::RequestAborted {
                url: request.url,
                reason: AbortReason::InternetDisconnected,
            });
        }

        let handler = self
            .handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(handler) = handler else {
            return self.upstream.fetch(&request).await;
        };

        let url = request.url.clone();
        let (route, outcome) = Route::channel(request.clone(), Arc::clone(&self.upstream));
        let task_url = url.clone();
        tokio::spawn(async move {
            if let Err(err) = handler.handle(route).await {
                warn!(url = %task_url, handler = handler.name(), error = %err, "route handler failed");
            }
        });

        let mut closed = self.closed.subscribe();
        let outcome = tokio::select! {
            outcome = outcome => outcome,
            _ = closed.wait_for(|closed| *closed) => {
                return Err(NetsimError::ContextClosed { id: self.id.clone() });
            }
        };

        match outcome {
            Ok(RouteOutcome::Continue) => self.upstream.fetch(&request).await,
            Ok(RouteOutcome::Fulfill(response)) => Ok(response),
            Ok(RouteOutcome::Abort(reason)) => Err(NetsimError::RequestAborted { url, reason }),
            Err(_) => Err(NetsimError::RouteUnresolved { url }),
        }
    }

    /// Request log, oldest first
    #[must_use]
    pub fn requests(&self) -> Vec<RequestRecord> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Clear the request log
    pub fn clear_requests(&self) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
