//! Netsim CLI Library
//!
//! Command-line front end for `cockpit-netsim`: list presets, validate
//! scenario files and fire request bursts under a network condition.

#![warn(missing_docs)]

mod commands;
mod config;
mod error;
mod output;
mod runner;

pub use commands::{Cli, ColorArg, Commands, ConditionsArgs, FormatArg, RunArgs, ValidateArgs};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{
    render_conditions, render_json, render_run, render_scenario, OutputFormat, ProgressReporter,
};
pub use runner::{
    execute, list_conditions, resolve_plan, validate_scenario, ConditionInfo, RunPlan,
    RunSummary, ScenarioSummary,
};
