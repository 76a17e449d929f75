//! Cockpit Netsim: Network Fault Injection for Browser Tests
//!
//! Sits between a test's browsing context and the network, intercepting every
//! outbound request and perturbing it to model adverse conditions: random
//! outages, latency, timeouts, error statuses, dropped connections, DNS
//! failure, slow recovery and streams that go silent.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     NETSIM Architecture                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Browser    │    │ Route      │    │ Upstream   │            │
//! │   │ Context    │───►│ Handler    │───►│ (mock or   │            │
//! │   │            │    │ (strategy) │    │  reqwest)  │            │
//! │   └────────────┘    └────────────┘    └────────────┘            │
//! │         ▲                 ▲                                      │
//! │         │          ┌────────────┐                                │
//! │         └──────────│ Network    │◄── presets / YAML profiles     │
//! │                    │ Simulator  │                                │
//! │                    └────────────┘                                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use cockpit_netsim::prelude::*;
//!
//! let context = Arc::new(BrowserContext::new(
//!     ContextConfig::new("resilience"),
//!     Arc::new(MockUpstream::new()),
//! ));
//! let sim = setup_network_condition(context.clone(), NetworkCondition::Flaky)?;
//! let report = fire_burst(context, &BurstConfig::new("https://app.test/api/test", 50)).await;
//! assert!(report.all_resolved());
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod burst;
mod conditions;
mod config;
mod context;
mod network;
mod result;
mod route;
mod simulator;
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod strategy;
mod upstream;

pub use burst::{fire_burst, BurstConfig, BurstReport};
pub use conditions::{setup_network_condition, NetworkCondition};
pub use config::{ConditionProfile, ScenarioFile, SimulatorConfig};
pub use context::{
    BrowserContext, ContextConfig, ContextState, RecordedOutcome, RequestRecord,
};
pub use network::{
    AbortReason, FulfillResponse, HttpMethod, InterceptedRequest, PatternSpec, UrlPattern,
};
pub use result::{NetsimError, NetsimResult};
pub use route::{Route, RouteHandler, RouteOutcome};
pub use simulator::{NetworkSimulator, SimulatorState, StrategyHandle};
#[cfg(feature = "http")]
pub use upstream::HttpUpstream;
pub use upstream::{MockUpstream, Upstream, UpstreamRoute};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::strategy::{
        ConnectionResetConfig, EventDropConfig, FlakyConfig, GradualRecoveryConfig,
        HttpErrorConfig, SlowConfig, StrategyStats, TimeoutConfig,
    };
    pub use super::{
        fire_burst, setup_network_condition, AbortReason, BrowserContext, BurstConfig,
        BurstReport, ConditionProfile, ContextConfig, FulfillResponse, HttpMethod,
        InterceptedRequest, MockUpstream, NetsimError, NetsimResult, NetworkCondition,
        NetworkSimulator, Route, RouteHandler, ScenarioFile, SimulatorConfig, StrategyHandle,
        Upstream, UrlPattern,
    };
    pub use std::sync::Arc;
}
