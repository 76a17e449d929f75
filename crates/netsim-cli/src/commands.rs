//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Netsim: network fault injection for browser end-to-end tests
#[derive(Parser, Debug)]
#[command(name = "netsim")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, value_enum, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the preset network conditions
    Conditions(ConditionsArgs),

    /// Parse and validate a scenario file
    Validate(ValidateArgs),

    /// Fire a burst of requests under a network condition
    Run(RunArgs),
}

/// Arguments for the conditions command
#[derive(Parser, Debug)]
pub struct ConditionsArgs {
    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: FormatArg,
}

/// Arguments for the validate command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Scenario YAML file
    pub scenario: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: FormatArg,
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Preset condition (good, slow-4g, fast-3g, slow, flaky, offline)
    #[arg(short, long, conflicts_with = "scenario")]
    pub condition: Option<String>,

    /// Scenario YAML file holding named profiles
    #[arg(short, long, requires = "profile")]
    pub scenario: Option<PathBuf>,

    /// Profile to use from the scenario file
    #[arg(short, long, requires = "scenario")]
    pub profile: Option<String>,

    /// URL requested by every request of the burst
    #[arg(long, default_value = "https://app.test/api/test")]
    pub url: String,

    /// Number of concurrent requests
    #[arg(short = 'n', long, default_value = "50")]
    pub requests: usize,

    /// RNG seed (overrides the scenario seed)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Status served by the mock upstream
    #[arg(long, default_value = "200")]
    pub status: u16,

    /// Content type served by the mock upstream
    #[arg(long, default_value = "application/json")]
    pub content_type: String,

    /// Forward continued requests to the real server at --url
    #[cfg(feature = "http")]
    #[arg(long, conflicts_with_all = ["status", "content_type"])]
    pub live: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: FormatArg,
}

/// Output format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormatArg {
    /// Human-readable text
    #[default]
    Text,
    /// JSON
    Json,
}

impl From<FormatArg> for crate::output::OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => Self::Text,
            FormatArg::Json => Self::Json,
        }
    }
}

/// Color argument
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    mod cli_tests {
        use super::*;

        #[test]
        fn test_parse_conditions() {
            let cli = Cli::parse_from(["netsim", "conditions"]);
            assert!(matches!(cli.command, Commands::Conditions(_)));
        }

        #[test]
        fn test_global_flags() {
            let cli = Cli::parse_from(["netsim", "-vv", "--color", "never", "conditions"]);
            assert_eq!(cli.verbose, 2);
            assert!(matches!(cli.color, ColorArg::Never));
        }

        #[test]
        fn test_parse_validate() {
            let cli = Cli::parse_from(["netsim", "validate", "scenario.yaml", "--format", "json"]);
            if let Commands::Validate(args) = cli.command {
                assert_eq!(args.scenario, PathBuf::from("scenario.yaml"));
                assert_eq!(args.format, FormatArg::Json);
            } else {
                panic!("expected Validate command");
            }
        }
    }

    mod run_args_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let cli = Cli::parse_from(["netsim", "run", "--condition", "flaky"]);
            if let Commands::Run(args) = cli.command {
                assert_eq!(args.condition.as_deref(), Some("flaky"));
                assert_eq!(args.requests, 50);
                assert_eq!(args.status, 200);
                assert_eq!(args.url, "https://app.test/api/test");
                assert_eq!(args.seed, None);
            } else {
                panic!("expected Run command");
            }
        }

        #[test]
        fn test_scenario_requires_profile() {
            let result = Cli::try_parse_from(["netsim", "run", "--scenario", "s.yaml"]);
            assert!(result.is_err());
        }

        #[test]
        fn test_condition_conflicts_with_scenario() {
            let result = Cli::try_parse_from([
                "netsim", "run", "--condition", "slow", "--scenario", "s.yaml", "--profile", "p",
            ]);
            assert!(result.is_err());
        }

        #[test]
        fn test_scenario_and_profile() {
            let cli = Cli::parse_from([
                "netsim", "run", "--scenario", "s.yaml", "--profile", "outage", "-n", "5",
                "--seed", "9",
            ]);
            if let Commands::Run(args) = cli.command {
                assert_eq!(args.profile.as_deref(), Some("outage"));
                assert_eq!(args.requests, 5);
                assert_eq!(args.seed, Some(9));
            } else {
                panic!("expected Run command");
            }
        }
    }
}
