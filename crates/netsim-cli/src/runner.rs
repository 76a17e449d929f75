//! Command execution against a mock or live upstream

use crate::commands::RunArgs;
use crate::error::{CliError, CliResult};
use cockpit_netsim::strategy::StrategyStats;
use cockpit_netsim::{
    fire_burst, BrowserContext, BurstConfig, BurstReport, ConditionProfile, ContextConfig,
    FulfillResponse, MockUpstream, NetworkCondition, NetworkSimulator, ScenarioFile,
    SimulatorConfig, Upstream,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// A preset and its parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionInfo {
    /// Preset name
    pub name: String,
    /// Parameters in words
    pub description: String,
}

/// Every preset
#[must_use]
pub fn list_conditions() -> Vec<ConditionInfo> {
    NetworkCondition::ALL
        .iter()
        .map(|condition| ConditionInfo {
            name: condition.to_string(),
            description: condition.description().to_string(),
        })
        .collect()
}

/// Outcome of validating a scenario file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    /// File validated
    pub path: String,
    /// Seed, if the file sets one
    pub seed: Option<u64>,
    /// Profile kinds by name
    pub conditions: BTreeMap<String, String>,
}

/// Load and validate a scenario file
pub fn validate_scenario(path: &Path) -> CliResult<ScenarioSummary> {
    let scenario = load_scenario(path)?;
    Ok(ScenarioSummary {
        path: path.display().to_string(),
        seed: scenario.seed,
        conditions: scenario
            .conditions
            .iter()
            .map(|(name, profile)| (name.clone(), profile.kind().to_string()))
            .collect(),
    })
}

fn load_scenario(path: &Path) -> CliResult<ScenarioFile> {
    if !path.exists() {
        return Err(CliError::config(format!(
            "scenario file not found: {}",
            path.display()
        )));
    }
    Ok(ScenarioFile::load(path)?)
}

/// What a run installs
#[derive(Debug, Clone)]
pub struct RunPlan {
    /// Preset or profile name
    pub label: String,
    /// Profile to apply
    pub profile: ConditionProfile,
    /// Effective RNG seed
    pub seed: Option<u64>,
}

/// Resolve `--condition` or `--scenario`/`--profile` into a plan
pub fn resolve_plan(args: &RunArgs) -> CliResult<RunPlan> {
    match (&args.condition, &args.scenario, &args.profile) {
        (Some(name), None, None) => {
            let condition: NetworkCondition = name.parse()?;
            Ok(RunPlan {
                label: condition.to_string(),
                profile: condition.profile(),
                seed: args.seed,
            })
        }
        (None, Some(path), Some(profile)) => {
            let scenario = load_scenario(path)?;
            Ok(RunPlan {
                label: profile.clone(),
                profile: scenario.profile(profile)?.clone(),
                seed: args.seed.or(scenario.seed),
            })
        }
        (None, None, None) => Err(CliError::invalid_argument(
            "either --condition or --scenario with --profile is required",
        )),
        _ => Err(CliError::invalid_argument(
            "--condition cannot be combined with --scenario/--profile",
        )),
    }
}

/// Upstream continued requests reach: the real server with `--live`,
/// otherwise a mock serving `--status` and `--content-type`
fn upstream(args: &RunArgs) -> Arc<dyn Upstream> {
    #[cfg(feature = "http")]
    if args.live {
        return Arc::new(cockpit_netsim::HttpUpstream::new());
    }
    Arc::new(
        MockUpstream::new().with_default(
            FulfillResponse::new()
                .with_status(args.status)
                .with_content_type(&args.content_type)
                .with_body(b"{}".to_vec()),
        ),
    )
}

/// Result of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Preset or profile name
    pub condition: String,
    /// Profile kind
    pub kind: String,
    /// Effective RNG seed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Target URL
    pub url: String,
    /// Burst outcome
    pub report: BurstReport,
    /// Strategy counters after the burst
    pub stats: StrategyStats,
}

/// Apply the plan to a fresh context and fire the burst
pub async fn execute(plan: &RunPlan, args: &RunArgs) -> CliResult<RunSummary> {
    if args.requests == 0 {
        return Err(CliError::invalid_argument("--requests must be at least 1"));
    }
    let context = Arc::new(BrowserContext::new(
        ContextConfig::new("netsim-cli").without_request_log(),
        upstream(args),
    ));
    let config = SimulatorConfig {
        seed: plan.seed,
        ..SimulatorConfig::default()
    };
    let simulator = NetworkSimulator::with_config(Arc::clone(&context), config);
    let handle = simulator.apply(&plan.profile)?;
    info!(condition = %plan.label, kind = plan.profile.kind(), requests = args.requests, "running burst");

    let report = fire_burst(
        Arc::clone(&context),
        &BurstConfig::new(&args.url, args.requests),
    )
    .await;
    simulator.reset();
    context.close();

    Ok(RunSummary {
        condition: plan.label.clone(),
        kind: plan.profile.kind().to_string(),
        seed: plan.seed,
        url: args.url.clone(),
        report,
        stats: handle.stats(),
    })
}
