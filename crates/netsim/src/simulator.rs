//! Network Simulator
//!
//! Installs one network condition at a time on a [`BrowserContext`] and hands
//! back typed handles to the installed strategy's counters.
//!
//! ## Toyota Way Application
//!
//! - **Poka-Yoke**: Switching conditions without `reset()` is refused instead
//!   of silently replacing the active route handler
//! - **Mieruka**: Every strategy exposes its counters through a handle
//!
//! ## Example
//!
//! ```ignore
//! let sim = NetworkSimulator::with_seed(context, 42);
//! let flaky = sim.simulate_flaky_network(FlakyConfig::new(0.3))?;
//! // ... drive the page ...
//! assert!(flaky.abort_count() > 0);
//! sim.reset();
//! ```

use crate::config::{ConditionProfile, SimulatorConfig};
use crate::context::BrowserContext;
use crate::network::UrlPattern;
use crate::result::NetsimResult;
use crate::route::RouteHandler;
use crate::strategy::{
    ConnectionReset, ConnectionResetConfig, ConnectionResetHandle, DnsFailure, DnsFailureHandle,
    EventDrop, EventDropConfig, EventDropHandle, FlakyConfig, FlakyHandle, FlakyNetwork,
    GradualRecovery, GradualRecoveryConfig, GradualRecoveryHandle, HttpErrorConfig,
    HttpErrorHandle, HttpErrorInjection, SharedRng, SlowConfig, SlowHandle, SlowNetwork,
    StrategyStats, TimeoutConfig, TimeoutHandle, TimeoutNetwork,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

/// Which condition the simulator currently applies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulatorState {
    /// No routing, online
    Idle,
    /// A condition is installed
    Active(String),
}

/// Handle to whichever strategy a profile installed
#[derive(Debug, Clone)]
pub enum StrategyHandle {
    /// Flaky network
    Flaky(FlakyHandle),
    /// Slow network
    Slow(SlowHandle),
    /// Timeouts
    Timeout(TimeoutHandle),
    /// HTTP errors
    HttpError(HttpErrorHandle),
    /// Connection resets
    ConnectionReset(ConnectionResetHandle),
    /// DNS failure
    DnsFailure(DnsFailureHandle),
    /// Gradual recovery
    GradualRecovery(GradualRecoveryHandle),
    /// Event drop
    EventDrop(EventDropHandle),
    /// Native offline mode
    Offline,
    /// Nothing installed
    Good,
}

impl StrategyHandle {
    /// Condition kind
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Flaky(_) => "flaky",
            Self::Slow(_) => "slow",
            Self::Timeout(_) => "timeout",
            Self::HttpError(_) => "http-error",
            Self::ConnectionReset(_) => "connection-reset",
            Self::DnsFailure(_) => "dns-failure",
            Self::GradualRecovery(_) => "gradual-recovery",
            Self::EventDrop(_) => "event-drop",
            Self::Offline => "offline",
            Self::Good => "good",
        }
    }

    /// Counter snapshot
    #[must_use]
    pub fn stats(&self) -> StrategyStats {
        match self {
            Self::Flaky(h) => h.stats(),
            Self::Slow(h) => h.stats(),
            Self::Timeout(h) => h.stats(),
            Self::HttpError(h) => h.stats(),
            Self::ConnectionReset(h) => h.stats(),
            Self::DnsFailure(h) => h.stats(),
            Self::GradualRecovery(h) => h.stats(),
            Self::EventDrop(h) => h.stats(),
            Self::Offline | Self::Good => StrategyStats::new(self.name()),
        }
    }

    /// Zero the counters
    pub fn reset(&self) {
        match self {
            Self::Flaky(h) => h.reset(),
            Self::Slow(h) => h.reset(),
            Self::Timeout(h) => h.reset(),
            Self::HttpError(h) => h.reset(),
            Self::ConnectionReset(h) => h.reset(),
            Self::DnsFailure(h) => h.reset(),
            Self::GradualRecovery(h) => h.reset(),
            Self::EventDrop(h) => h.reset(),
            Self::Offline | Self::Good => {}
        }
    }

    /// Flaky counters, if this is a flaky handle
    #[must_use]
    pub const fn as_flaky(&self) -> Option<&FlakyHandle> {
        match self {
            Self::Flaky(h) => Some(h),
            _ => None,
        }
    }

    /// Slow counters, if this is a slow handle
    #[must_use]
    pub const fn as_slow(&self) -> Option<&SlowHandle> {
        match self {
            Self::Slow(h) => Some(h),
            _ => None,
        }
    }

    /// Event drop counters, if this is an event drop handle
    #[must_use]
    pub const fn as_event_drop(&self) -> Option<&EventDropHandle> {
        match self {
            Self::EventDrop(h) => Some(h),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Installed {
    condition: String,
    handle: StrategyHandle,
}

/// Applies network conditions to a browsing context
///
/// The active condition is recorded on the context, so any number of
/// simulators over one context share a single condition slot.
#[derive(Debug)]
pub struct NetworkSimulator {
    id: String,
    context: Arc<BrowserContext>,
    config: SimulatorConfig,
    rng: SharedRng,
    active: Mutex<Option<Installed>>,
}

impl NetworkSimulator {
    /// Simulator with default config (entropy-seeded)
    #[must_use]
    pub fn new(context: Arc<BrowserContext>) -> Self {
        Self::with_config(context, SimulatorConfig::default())
    }

    /// Simulator with a fixed RNG seed
    #[must_use]
    pub fn with_seed(context: Arc<BrowserContext>, seed: u64) -> Self {
        Self::with_config(context, SimulatorConfig::new().with_seed(seed))
    }

    /// Simulator with explicit config
    #[must_use]
    pub fn with_config(context: Arc<BrowserContext>, config: SimulatorConfig) -> Self {
        Self {
            id: format!("sim_{}", uuid::Uuid::new_v4()),
            rng: SharedRng::from_seed(config.seed),
            context,
            config,
            active: Mutex::new(None),
        }
    }

    /// The controlled context
    #[must_use]
    pub const fn context(&self) -> &Arc<BrowserContext> {
        &self.context
    }

    /// Simulator config
    #[must_use]
    pub const fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Simulator ID
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Idle, or the condition active on the context
    #[must_use]
    pub fn state(&self) -> SimulatorState {
        self.active()
            .map_or(SimulatorState::Idle, SimulatorState::Active)
    }

    /// Name of the condition active on the context
    #[must_use]
    pub fn active(&self) -> Option<String> {
        self.context.condition()
    }

    /// Handle of the active condition, if this simulator installed it
    #[must_use]
    pub fn handle(&self) -> Option<StrategyHandle> {
        let active = self.lock_active();
        let installed = active.as_ref()?;
        let owned = self.context.condition_owner().as_deref() == Some(self.id.as_str())
            && self.context.condition().as_deref() == Some(installed.condition.as_str());
        owned.then(|| installed.handle.clone())
    }

    /// Randomly fail API and stream requests
    pub fn simulate_flaky_network(&self, config: FlakyConfig) -> NetsimResult<FlakyHandle> {
        let strategy = FlakyNetwork::new(config, self.rng.clone())?;
        let handle = strategy.handle();
        self.install("flaky", Arc::new(strategy), StrategyHandle::Flaky(handle.clone()))?;
        Ok(handle)
    }

    /// Add latency and optionally cap bandwidth
    pub fn simulate_slow_network(&self, config: SlowConfig) -> NetsimResult<SlowHandle> {
        let strategy = SlowNetwork::new(config)?;
        let handle = strategy.handle();
        self.install("slow", Arc::new(strategy), StrategyHandle::Slow(handle.clone()))?;
        Ok(handle)
    }

    /// Hang matching requests until they time out
    pub fn simulate_timeout(&self, config: TimeoutConfig) -> NetsimResult<TimeoutHandle> {
        let strategy = TimeoutNetwork::new(config);
        let handle = strategy.handle();
        self.install("timeout", Arc::new(strategy), StrategyHandle::Timeout(handle.clone()))?;
        Ok(handle)
    }

    /// Answer matching requests with an error status
    pub fn simulate_http_error(&self, config: HttpErrorConfig) -> NetsimResult<HttpErrorHandle> {
        let strategy = HttpErrorInjection::new(config)?;
        let handle = strategy.handle();
        self.install("http-error", Arc::new(strategy), StrategyHandle::HttpError(handle.clone()))?;
        Ok(handle)
    }

    /// 503 on matching requests
    pub fn simulate_service_unavailable(&self, pattern: UrlPattern) -> NetsimResult<HttpErrorHandle> {
        self.simulate_http_error(HttpErrorConfig::new(503).with_pattern(pattern))
    }

    /// 429 on matching requests
    pub fn simulate_rate_limited(&self, pattern: UrlPattern) -> NetsimResult<HttpErrorHandle> {
        self.simulate_http_error(HttpErrorConfig::new(429).with_pattern(pattern))
    }

    /// 401 on matching requests
    pub fn simulate_unauthorized(&self, pattern: UrlPattern) -> NetsimResult<HttpErrorHandle> {
        self.simulate_http_error(HttpErrorConfig::new(401).with_pattern(pattern))
    }

    /// Randomly reset matching connections
    pub fn simulate_connection_reset(
        &self,
        config: ConnectionResetConfig,
    ) -> NetsimResult<ConnectionResetHandle> {
        let strategy = ConnectionReset::new(config, self.rng.clone());
        let handle = strategy.handle();
        self.install(
            "connection-reset",
            Arc::new(strategy),
            StrategyHandle::ConnectionReset(handle.clone()),
        )?;
        Ok(handle)
    }

    /// Fail name resolution for every request
    pub fn simulate_dns_failure(&self) -> NetsimResult<DnsFailureHandle> {
        let strategy = DnsFailure::new();
        let handle = strategy.handle();
        self.install("dns-failure", Arc::new(strategy), StrategyHandle::DnsFailure(handle.clone()))?;
        Ok(handle)
    }

    /// Fail early attempts, recovering gradually
    pub fn simulate_gradual_recovery(
        &self,
        config: GradualRecoveryConfig,
    ) -> NetsimResult<GradualRecoveryHandle> {
        let strategy = GradualRecovery::new(config, self.rng.clone())?;
        let handle = strategy.handle();
        self.install(
            "gradual-recovery",
            Arc::new(strategy),
            StrategyHandle::GradualRecovery(handle.clone()),
        )?;
        Ok(handle)
    }

    /// Drop a stream after a number of events
    pub fn simulate_event_drop(&self, config: EventDropConfig) -> NetsimResult<EventDropHandle> {
        let strategy = EventDrop::new(config);
        let handle = strategy.handle();
        self.install("event-drop", Arc::new(strategy), StrategyHandle::EventDrop(handle.clone()))?;
        Ok(handle)
    }

    /// Switch the context to native offline mode
    pub fn go_offline(&self) -> NetsimResult<()> {
        self.install_with("offline", None, StrategyHandle::Offline)
    }

    /// Leave offline mode; other conditions are untouched
    pub fn go_online(&self) {
        let mut active = self.lock_active();
        self.context.set_offline(false);
        if matches!(active.as_ref(), Some(installed) if matches!(installed.handle, StrategyHandle::Offline)) {
            *active = None;
        }
    }

    /// Install any condition profile
    pub fn apply(&self, profile: &ConditionProfile) -> NetsimResult<StrategyHandle> {
        Ok(match profile.clone() {
            ConditionProfile::Flaky(c) => StrategyHandle::Flaky(self.simulate_flaky_network(c)?),
            ConditionProfile::Slow(c) => StrategyHandle::Slow(self.simulate_slow_network(c)?),
            ConditionProfile::Timeout(c) => StrategyHandle::Timeout(self.simulate_timeout(c)?),
            ConditionProfile::HttpError(c) => {
                StrategyHandle::HttpError(self.simulate_http_error(c)?)
            }
            ConditionProfile::ConnectionReset(c) => {
                StrategyHandle::ConnectionReset(self.simulate_connection_reset(c)?)
            }
            ConditionProfile::DnsFailure => StrategyHandle::DnsFailure(self.simulate_dns_failure()?),
            ConditionProfile::GradualRecovery(c) => {
                StrategyHandle::GradualRecovery(self.simulate_gradual_recovery(c)?)
            }
            ConditionProfile::EventDrop(c) => {
                StrategyHandle::EventDrop(self.simulate_event_drop(c)?)
            }
            ConditionProfile::Offline => {
                self.go_offline()?;
                StrategyHandle::Offline
            }
            ConditionProfile::Good => StrategyHandle::Good,
        })
    }

    /// Remove all routing, go back online and return to idle
    pub fn reset(&self) {
        let mut active = self.lock_active();
        if let Some(previous) = self.context.clear_condition() {
            info!(context = self.context.id(), condition = %previous, "network condition reset");
        }
        *active = None;
    }

    fn install(
        &self,
        condition: &str,
        handler: Arc<dyn RouteHandler>,
        handle: StrategyHandle,
    ) -> NetsimResult<()> {
        self.install_with(condition, Some(handler), handle)
    }

    fn install_with(
        &self,
        condition: &str,
        handler: Option<Arc<dyn RouteHandler>>,
        handle: StrategyHandle,
    ) -> NetsimResult<()> {
        let mut active = self.lock_active();
        self.context.install_condition(
            &self.id,
            condition,
            handler,
            !self.config.strict_registration,
        )?;
        *active = Some(Installed {
            condition: condition.to_string(),
            handle,
        });
        info!(context = self.context.id(), simulator = %self.id, condition, "network condition installed");
        Ok(())
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<Installed>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
