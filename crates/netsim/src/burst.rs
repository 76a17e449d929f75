//! Concurrent request bursts

use crate::context::BrowserContext;
use crate::network::{HttpMethod, InterceptedRequest};
use crate::result::{NetsimError, NetsimResult};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::debug;

/// Burst parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BurstConfig {
    /// Target URL
    pub url: String,
    /// Number of concurrent requests
    pub count: usize,
    /// Request method
    pub method: HttpMethod,
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            url: "https://app.test/api/test".to_string(),
            count: 50,
            method: HttpMethod::Get,
        }
    }
}

impl BurstConfig {
    /// GET burst of `count` requests to `url`
    #[must_use]
    pub fn new(url: &str, count: usize) -> Self {
        Self {
            url: url.to_string(),
            count,
            method: HttpMethod::Get,
        }
    }

    /// Set the method
    #[must_use]
    pub const fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }
}

/// Summary of a burst
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BurstReport {
    /// Requests issued
    pub total: usize,
    /// Responses by status code
    pub statuses: BTreeMap<u16, usize>,
    /// Aborts by reason code
    pub aborts: BTreeMap<String, usize>,
    /// Failures that were neither responses nor aborts
    pub errors: Vec<String>,
    /// Fastest request (ms)
    pub min_latency_ms: u64,
    /// Slowest request (ms)
    pub max_latency_ms: u64,
    /// Mean latency (ms)
    pub mean_latency_ms: f64,
}

impl BurstReport {
    /// Requests answered with a response
    #[must_use]
    pub fn responded(&self) -> usize {
        self.statuses.values().sum()
    }

    /// Requests aborted
    #[must_use]
    pub fn aborted(&self) -> usize {
        self.aborts.values().sum()
    }

    /// Aborts with the given reason code (e.g. `"failed"`)
    #[must_use]
    pub fn aborted_with(&self, code: &str) -> usize {
        self.aborts.get(code).copied().unwrap_or(0)
    }

    /// Every request reached an outcome
    #[must_use]
    pub fn all_resolved(&self) -> bool {
        self.responded() + self.aborted() + self.errors.len() == self.total
    }

    fn record(&mut self, outcome: &NetsimResult<u16>) {
        match outcome {
            Ok(status) => *self.statuses.entry(*status).or_default() += 1,
            Err(NetsimError::RequestAborted { reason, .. }) => {
                *self.aborts.entry(reason.code().to_string()).or_default() += 1;
            }
            Err(err) => self.errors.push(err.to_string()),
        }
    }
}

/// Fire `config.count` concurrent requests and summarise their outcomes
pub async fn fire_burst(context: Arc<BrowserContext>, config: &BurstConfig) -> BurstReport {
    debug!(url = %config.url, count = config.count, "firing burst");
    let requests = (0..config.count).map(|_| {
        let context = Arc::clone(&context);
        let request = InterceptedRequest::new(config.method, config.url.clone());
        async move {
            let started = Instant::now();
            let outcome = context.request(request).await.map(|resp| resp.status);
            (outcome, started.elapsed().as_millis() as u64)
        }
    });
    let results = join_all(requests).await;

    let mut report = BurstReport {
        total: config.count,
        ..BurstReport::default()
    };
    let mut latencies = Vec::with_capacity(results.len());
    for (outcome, latency) in &results {
        report.record(outcome);
        latencies.push(*latency);
    }
    if !latencies.is_empty() {
        report.min_latency_ms = latencies.iter().copied().min().unwrap_or(0);
        report.max_latency_ms = latencies.iter().copied().max().unwrap_or(0);
        report.mean_latency_ms = latencies.iter().sum::<u64>() as f64 / latencies.len() as f64;
    }
    report
}
