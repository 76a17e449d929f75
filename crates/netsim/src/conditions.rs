//! Named network condition presets

use crate::config::ConditionProfile;
use crate::context::BrowserContext;
use crate::result::{NetsimError, NetsimResult};
use crate::simulator::NetworkSimulator;
use crate::strategy::{FlakyConfig, SlowConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A preset network condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkCondition {
    /// No perturbation
    Good,
    /// 400 ms latency at 1 kbps
    #[serde(rename = "slow-4g")]
    Slow4g,
    /// 560 ms latency at 1.6 kbps
    #[serde(rename = "fast-3g")]
    Fast3g,
    /// 2 s latency
    Slow,
    /// 30 % failures with a 0.5-2 s outage
    Flaky,
    /// Context offline
    Offline,
}

impl NetworkCondition {
    /// Every preset
    pub const ALL: [Self; 6] = [
        Self::Good,
        Self::Slow4g,
        Self::Fast3g,
        Self::Slow,
        Self::Flaky,
        Self::Offline,
    ];

    /// Preset name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Slow4g => "slow-4g",
            Self::Fast3g => "fast-3g",
            Self::Slow => "slow",
            Self::Flaky => "flaky",
            Self::Offline => "offline",
        }
    }

    /// One-line description of the parameters
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Good => "no perturbation",
            Self::Slow4g => "400 ms latency, 1 kbps",
            Self::Fast3g => "560 ms latency, 1.6 kbps",
            Self::Slow => "2000 ms latency, no bandwidth cap",
            Self::Flaky => "30% failure rate on /api/ and /sse, 500-2000 ms outage",
            Self::Offline => "native offline mode",
        }
    }

    /// Profile this preset installs
    #[must_use]
    pub fn profile(&self) -> ConditionProfile {
        match self {
            Self::Good => ConditionProfile::Good,
            Self::Slow4g => ConditionProfile::Slow(SlowConfig::new(400).with_bandwidth(1.0)),
            Self::Fast3g => ConditionProfile::Slow(SlowConfig::new(560).with_bandwidth(1.6)),
            Self::Slow => ConditionProfile::Slow(SlowConfig::new(2000)),
            Self::Flaky => ConditionProfile::Flaky(FlakyConfig::new(0.3).with_delay(500, 2000)),
            Self::Offline => ConditionProfile::Offline,
        }
    }

    fn expected() -> String {
        Self::ALL.map(|c| c.as_str()).join(", ")
    }
}

impl FromStr for NetworkCondition {
    type Err = NetsimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| NetsimError::InvalidCondition {
                name: s.to_string(),
                expected: Self::expected(),
            })
    }
}

impl fmt::Display for NetworkCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install a preset on `context` and return the simulator controlling it
pub fn setup_network_condition(
    context: Arc<BrowserContext>,
    condition: NetworkCondition,
) -> NetsimResult<NetworkSimulator> {
    let simulator = NetworkSimulator::new(context);
    simulator.apply(&condition.profile())?;
    Ok(simulator)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::context::ContextConfig;
    use crate::simulator::SimulatorState;
    use crate::upstream::MockUpstream;

    fn context() -> Arc<BrowserContext> {
        Arc::new(BrowserContext::new(
            ContextConfig::new("preset"),
            Arc::new(MockUpstream::new()),
        ))
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn test_parse_all_names() {
            for condition in NetworkCondition::ALL {
                assert_eq!(condition.as_str().parse::<NetworkCondition>().unwrap(), condition);
                assert_eq!(condition.to_string(), condition.as_str());
            }
        }

        #[test]
        fn test_unknown_name_rejected() {
            let err = "3g".parse::<NetworkCondition>().unwrap_err();
            assert!(matches!(err, NetsimError::InvalidCondition { .. }));
            assert!(err.to_string().contains("slow-4g"));
        }

        #[test]
        fn test_serde_names_match_display() {
            let json = serde_json::to_string(&NetworkCondition::Fast3g).unwrap();
            assert_eq!(json, "\"fast-3g\"");
        }
    }

    mod profile_tests {
        use super::*;

        #[test]
        fn test_slow_4g_parameters() {
            match NetworkCondition::Slow4g.profile() {
                ConditionProfile::Slow(config) => {
                    assert_eq!(config.delay_ms, 400);
                    assert_eq!(config.bandwidth_kbps, Some(1.0));
                }
                other => panic!("Expected Slow, got {:?}", other),
            }
        }

        #[test]
        fn test_flaky_parameters() {
            match NetworkCondition::Flaky.profile() {
                ConditionProfile::Flaky(config) => {
                    assert!((config.failure_rate - 0.3).abs() < f64::EPSILON);
                    assert_eq!((config.min_delay_ms, config.max_delay_ms), (500, 2000));
                }
                other => panic!("Expected Flaky, got {:?}", other),
            }
        }

        #[test]
        fn test_every_preset_validates() {
            for condition in NetworkCondition::ALL {
                condition.profile().validate().unwrap();
            }
        }
    }

    mod setup_tests {
        use super::*;

        #[test]
        fn test_good_is_noop() {
            let sim = setup_network_condition(context(), NetworkCondition::Good).unwrap();
            assert_eq!(sim.state(), SimulatorState::Idle);
            assert!(!sim.context().has_route());
        }

        #[test]
        fn test_offline_toggles_context() {
            let sim = setup_network_condition(context(), NetworkCondition::Offline).unwrap();
            assert!(sim.context().is_offline());
            assert!(!sim.context().has_route());
        }

        #[test]
        fn test_slow_installs_route() {
            let sim = setup_network_condition(context(), NetworkCondition::Slow).unwrap();
            assert_eq!(sim.context().route_name(), Some("slow"));
            assert_eq!(sim.active().as_deref(), Some("slow"));
        }

        #[test]
        fn test_second_preset_on_same_context_refused() {
            let ctx = context();
            let first = setup_network_condition(Arc::clone(&ctx), NetworkCondition::Flaky).unwrap();
            let err = setup_network_condition(Arc::clone(&ctx), NetworkCondition::Slow).unwrap_err();
            assert!(matches!(err, NetsimError::StrategyActive { .. }));
            assert_eq!(ctx.route_name(), Some("flaky"));
            assert_eq!(first.state(), SimulatorState::Active("flaky".to_string()));

            first.reset();
            let second = setup_network_condition(Arc::clone(&ctx), NetworkCondition::Offline).unwrap();
            assert!(ctx.is_offline());
            assert!(matches!(
                setup_network_condition(Arc::clone(&ctx), NetworkCondition::Slow4g),
                Err(NetsimError::StrategyActive { .. })
            ));
            second.reset();
            assert_eq!(first.state(), SimulatorState::Idle);
        }
    }
}
