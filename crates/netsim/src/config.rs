//! Simulator configuration, condition profiles and scenario files
//!
//! A scenario file is a YAML document naming reusable condition profiles:
//!
//! ```yaml
//! seed: 42
//! conditions:
//!   checkout-outage:
//!     kind: http-error
//!     status: 503
//!   dashboard-lag:
//!     kind: slow
//!     delay_ms: 1500
//!     bandwidth_kbps: 8.0
//! ```

use crate::result::{NetsimError, NetsimResult};
use crate::strategy::{
    ConnectionResetConfig, EventDropConfig, FlakyConfig, GradualRecoveryConfig, HttpErrorConfig,
    SlowConfig, TimeoutConfig,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Simulator-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// RNG seed; `None` draws from OS entropy
    pub seed: Option<u64>,
    /// Refuse to install a strategy while another is active
    pub strict_registration: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: None,
            strict_registration: true,
        }
    }
}

impl SimulatorConfig {
    /// Create default config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the RNG seed
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Replace active strategies (with a warning) instead of refusing
    #[must_use]
    pub const fn replacing(mut self) -> Self {
        self.strict_registration = false;
        self
    }
}

/// A network condition with its parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ConditionProfile {
    /// Random outages
    Flaky(FlakyConfig),
    /// Latency and bandwidth cap
    Slow(SlowConfig),
    /// Hanging requests
    Timeout(TimeoutConfig),
    /// Canned error statuses
    HttpError(HttpErrorConfig),
    /// Random dropped connections
    ConnectionReset(ConnectionResetConfig),
    /// Nothing resolves
    DnsFailure,
    /// Failure rate decreasing per attempt
    GradualRecovery(GradualRecoveryConfig),
    /// Stream dropped after N events
    EventDrop(EventDropConfig),
    /// Context offline
    Offline,
    /// Unperturbed network
    Good,
}

impl ConditionProfile {
    /// Kind name as written in scenario files
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Flaky(_) => "flaky",
            Self::Slow(_) => "slow",
            Self::Timeout(_) => "timeout",
            Self::HttpError(_) => "http-error",
            Self::ConnectionReset(_) => "connection-reset",
            Self::DnsFailure => "dns-failure",
            Self::GradualRecovery(_) => "gradual-recovery",
            Self::EventDrop(_) => "event-drop",
            Self::Offline => "offline",
            Self::Good => "good",
        }
    }

    /// Check parameters without installing anything
    pub fn validate(&self) -> NetsimResult<()> {
        match self {
            Self::Flaky(config) => config.validate(),
            Self::Slow(config) => config.validate(),
            Self::HttpError(config) => config.validate(),
            Self::GradualRecovery(config) => config.validate(),
            Self::Timeout(_)
            | Self::ConnectionReset(_)
            | Self::DnsFailure
            | Self::EventDrop(_)
            | Self::Offline
            | Self::Good => Ok(()),
        }
    }
}

/// A set of named condition profiles
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioFile {
    /// RNG seed shared by every profile
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Profiles by name
    pub conditions: BTreeMap<String, ConditionProfile>,
}

impl ScenarioFile {
    /// Parse and validate a YAML scenario
    pub fn from_yaml_str(yaml: &str) -> NetsimResult<Self> {
        let scenario: Self = serde_yaml_ng::from_str(yaml)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Load and validate a YAML scenario file
    pub fn load(path: impl AsRef<Path>) -> NetsimResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Serialize back to YAML
    pub fn to_yaml(&self) -> NetsimResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Validate every profile, naming the first invalid one
    pub fn validate(&self) -> NetsimResult<()> {
        for (name, profile) in &self.conditions {
            profile.validate().map_err(|err| {
                NetsimError::invalid_parameter(format!("condition '{name}': {err}"))
            })?;
        }
        Ok(())
    }

    /// Look up a profile by name
    pub fn profile(&self, name: &str) -> NetsimResult<&ConditionProfile> {
        self.conditions
            .get(name)
            .ok_or_else(|| NetsimError::InvalidCondition {
                name: name.to_string(),
                expected: self.names().join(", "),
            })
    }

    /// Profile names in order
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.conditions.keys().cloned().collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
seed: 42
conditions:
  outage:
    kind: http-error
    status: 503
  lag:
    kind: slow
    delay_ms: 1500
    bandwidth_kbps: 8.0
  unstable:
    kind: flaky
    failure_rate: 0.25
    scope:
      contains: /graphql
  dark:
    kind: offline
"#;

    mod simulator_config_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let config = SimulatorConfig::new();
            assert_eq!(config.seed, None);
            assert!(config.strict_registration);
        }

        #[test]
        fn test_builders() {
            let config = SimulatorConfig::new().with_seed(7).replacing();
            assert_eq!(config.seed, Some(7));
            assert!(!config.strict_registration);
        }
    }

    mod profile_tests {
        use super::*;

        #[test]
        fn test_minimal_profile_uses_defaults() {
            let profile: ConditionProfile = serde_yaml_ng::from_str("kind: timeout\n").unwrap();
            match profile {
                ConditionProfile::Timeout(config) => assert_eq!(config.timeout_ms, 30_000),
                other => panic!("Expected Timeout, got {:?}", other),
            }
        }

        #[test]
        fn test_unit_kinds() {
            let profile: ConditionProfile = serde_yaml_ng::from_str("kind: dns-failure\n").unwrap();
            assert_eq!(profile.kind(), "dns-failure");
        }

        #[test]
        fn test_unknown_kind_rejected() {
            let result: Result<ConditionProfile, _> = serde_yaml_ng::from_str("kind: meteor\n");
            assert!(result.is_err());
        }

        #[test]
        fn test_validate_catches_bad_rate() {
            let profile = ConditionProfile::Flaky(FlakyConfig::new(2.0));
            assert!(profile.validate().is_err());
        }
    }

    mod scenario_tests {
        use super::*;

        #[test]
        fn test_parse() {
            let scenario = ScenarioFile::from_yaml_str(SCENARIO).unwrap();
            assert_eq!(scenario.seed, Some(42));
            assert_eq!(scenario.names(), vec!["dark", "lag", "outage", "unstable"]);

            match scenario.profile("unstable").unwrap() {
                ConditionProfile::Flaky(config) => {
                    assert!(config.scope.matches("https://x.test/graphql"));
                    assert!(!config.scope.matches("https://x.test/api/"));
                }
                other => panic!("Expected Flaky, got {:?}", other),
            }
        }

        #[test]
        fn test_unknown_profile_lists_names() {
            let scenario = ScenarioFile::from_yaml_str(SCENARIO).unwrap();
            let err = scenario.profile("missing").unwrap_err();
            assert!(err.to_string().contains("outage"));
        }

        #[test]
        fn test_invalid_profile_rejected() {
            let yaml = "conditions:\n  broken:\n    kind: gradual-recovery\n    recovery_steps: 0\n";
            let err = ScenarioFile::from_yaml_str(yaml).unwrap_err();
            assert!(err.to_string().contains("broken"));
        }

        #[test]
        fn test_yaml_roundtrip() {
            let scenario = ScenarioFile::from_yaml_str(SCENARIO).unwrap();
            let again = ScenarioFile::from_yaml_str(&scenario.to_yaml().unwrap()).unwrap();
            assert_eq!(again.names(), scenario.names());
            assert_eq!(again.profile("outage").unwrap().kind(), "http-error");
        }

        #[test]
        fn test_load_from_disk() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("scenario.yaml");
            std::fs::write(&path, SCENARIO).unwrap();
            let scenario = ScenarioFile::load(&path).unwrap();
            assert_eq!(scenario.conditions.len(), 4);
        }

        #[test]
        fn test_load_missing_file() {
            let err = ScenarioFile::load("/nonexistent/scenario.yaml").unwrap_err();
            assert!(matches!(err, NetsimError::Io(_)));
        }
    }
}
