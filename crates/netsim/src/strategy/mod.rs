//! Network Condition Strategies
//!
//! Each strategy is a [`RouteHandler`](crate::route::RouteHandler) that
//! perturbs matched requests one way, plus a cloneable handle exposing its
//! counters to the test that installed it.
//!
//! | Strategy | Effect on matched requests |
//! |----------|----------------------------|
//! | [`FlakyNetwork`] | abort with probability `p` after a random outage |
//! | [`SlowNetwork`] | fixed latency, optional bandwidth throttling |
//! | [`TimeoutNetwork`] | never answer, abort after `timeout_ms` |
//! | [`HttpErrorInjection`] | fulfill with a canned 4xx/5xx JSON body |
//! | [`ConnectionReset`] | coin flip between continue and abort |
//! | [`DnsFailure`] | abort every request |
//! | [`GradualRecovery`] | success probability rises with each attempt |
//! | [`EventDrop`] | let N non-stream hits through, then drop everything |

mod connection_reset;
mod dns_failure;
mod event_drop;
mod flaky;
mod gradual_recovery;
mod http_error;
mod slow;
mod timeout;

pub use connection_reset::{ConnectionReset, ConnectionResetConfig, ConnectionResetHandle};
pub use dns_failure::{DnsFailure, DnsFailureHandle};
pub use event_drop::{EventDrop, EventDropConfig, EventDropHandle};
pub use flaky::{FlakyConfig, FlakyHandle, FlakyNetwork};
pub use gradual_recovery::{
    success_probability, GradualRecovery, GradualRecoveryConfig, GradualRecoveryHandle,
};
pub use http_error::{error_body, status_message, HttpErrorConfig, HttpErrorHandle, HttpErrorInjection};
pub use slow::{bandwidth_delay, SlowConfig, SlowHandle, SlowNetwork};
pub use timeout::{TimeoutConfig, TimeoutHandle, TimeoutNetwork};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// A shared, resettable event counter
#[derive(Debug, Clone, Default)]
pub struct Counter(Arc<AtomicU64>);

impl Counter {
    /// Create a counter at zero
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value
    #[must_use]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Increment, returning the new value
    pub fn incr(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Back to zero
    pub fn reset(&self) {
        self.0.store(0, Ordering::SeqCst);
    }
}

/// Random source shared by every strategy of one simulator
///
/// Seeded simulators replay the same sequence of draws, which makes
/// probabilistic strategies reproducible across runs.
#[derive(Debug, Clone)]
pub struct SharedRng(Arc<Mutex<StdRng>>);

impl SharedRng {
    /// Deterministic source
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self(Arc::new(Mutex::new(StdRng::seed_from_u64(seed))))
    }

    /// Source seeded from the OS
    #[must_use]
    pub fn from_entropy() -> Self {
        Self(Arc::new(Mutex::new(StdRng::from_entropy())))
    }

    /// Seeded when `seed` is given, OS entropy otherwise
    #[must_use]
    pub fn from_seed(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::seeded)
    }

    /// Uniform draw in `[0, 1)`
    #[must_use]
    pub fn unit(&self) -> f64 {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen::<f64>()
    }

    /// `true` with probability `p` (clamped to `[0, 1]`)
    #[must_use]
    pub fn chance(&self, p: f64) -> bool {
        if p <= 0.0 {
            return false;
        }
        if p >= 1.0 {
            return true;
        }
        self.unit() < p
    }

    /// Unbiased coin flip
    #[must_use]
    pub fn coin(&self) -> bool {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_bool(0.5)
    }

    /// Uniform duration in `[min_ms, max_ms]`
    #[must_use]
    pub fn delay_between(&self, min_ms: u64, max_ms: u64) -> Duration {
        if min_ms >= max_ms {
            return Duration::from_millis(min_ms);
        }
        let ms = self
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_range(min_ms..=max_ms);
        Duration::from_millis(ms)
    }
}

impl Default for SharedRng {
    fn default() -> Self {
        Self::from_entropy()
    }
}

/// Point-in-time copy of a strategy's counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyStats {
    /// Strategy name
    pub strategy: String,
    /// Named counters
    pub counters: BTreeMap<String, u64>,
    /// Terminal drop flag (event-drop only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dropped: Option<bool>,
}

impl StrategyStats {
    /// Empty stats for `strategy`
    #[must_use]
    pub fn new(strategy: &str) -> Self {
        Self {
            strategy: strategy.to_string(),
            counters: BTreeMap::new(),
            dropped: None,
        }
    }

    /// Add a counter
    #[must_use]
    pub fn with(mut self, name: &str, value: u64) -> Self {
        self.counters.insert(name.to_string(), value);
        self
    }

    /// Counter value, zero when absent
    #[must_use]
    pub fn get(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }
}


#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod counter_tests {
        use super::*;

        #[test]
        fn test_incr_and_reset() {
            let counter = Counter::new();
            assert_eq!(counter.incr(), 1);
            assert_eq!(counter.incr(), 2);
            let shared = counter.clone();
            assert_eq!(shared.get(), 2);
            shared.reset();
            assert_eq!(counter.get(), 0);
        }
    }

    mod rng_tests {
        use super::*;

        #[test]
        fn test_seeded_is_reproducible() {
            let a = SharedRng::seeded(42);
            let b = SharedRng::seeded(42);
            let draws_a: Vec<f64> = (0..8).map(|_| a.unit()).collect();
            let draws_b: Vec<f64> = (0..8).map(|_| b.unit()).collect();
            assert_eq!(draws_a, draws_b);
        }

        #[test]
        fn test_chance_extremes() {
            let rng = SharedRng::seeded(7);
            assert!((0..100).all(|_| rng.chance(1.0)));
            assert!((0..100).all(|_| !rng.chance(0.0)));
        }

        #[test]
        fn test_coin_hits_both_sides() {
            let rng = SharedRng::seeded(3);
            let heads = (0..200).filter(|_| rng.coin()).count();
            assert!(heads > 50 && heads < 150, "heads = {}", heads);
        }

        #[test]
        fn test_delay_between_bounds() {
            let rng = SharedRng::seeded(11);
            for _ in 0..100 {
                let d = rng.delay_between(500, 2000);
                assert!(d >= Duration::from_millis(500));
                assert!(d <= Duration::from_millis(2000));
            }
            assert_eq!(rng.delay_between(300, 300), Duration::from_millis(300));
        }
    }

    mod stats_tests {
        use super::*;

        #[test]
        fn test_get_defaults_to_zero() {
            let stats = StrategyStats::new("flaky").with("aborts", 3);
            assert_eq!(stats.get("aborts"), 3);
            assert_eq!(stats.get("timeouts"), 0);
        }

        #[test]
        fn test_json_omits_dropped_when_unset() {
            let json = serde_json::to_string(&StrategyStats::new("slow")).unwrap();
            assert!(!json.contains("dropped"));
        }
    }
}
