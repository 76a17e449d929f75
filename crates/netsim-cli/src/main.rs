//! Netsim CLI: network fault injection from the command line
//!
//! ## Usage
//!
//! ```bash
//! netsim conditions                               # List presets
//! netsim validate scenarios/outage.yaml           # Check a scenario file
//! netsim run --condition flaky -n 50 --seed 42    # Burst under a preset
//! netsim run --scenario s.yaml --profile outage   # Burst under a profile
//! ```

use clap::Parser;
use netsim_cli::{
    execute, list_conditions, render_conditions, render_json, render_run, render_scenario,
    resolve_plan, validate_scenario, Cli, CliConfig, CliError, CliResult, ColorChoice, Commands,
    ConditionsArgs, OutputFormat, ProgressReporter, RunArgs, ValidateArgs, Verbosity,
};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let config = build_config(&cli);
    init_tracing(&config);

    match cli.command {
        Commands::Conditions(args) => run_conditions(&config, &args),
        Commands::Validate(args) => run_validate(&config, &args),
        Commands::Run(args) => run_burst(&config, &args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    let color: ColorChoice = cli.color.into();
    CliConfig::new().with_verbosity(verbosity).with_color(color)
}

fn init_tracing(config: &CliConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.verbosity.log_directive()));
    // a subscriber may already be installed when embedded
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(config.color.should_color())
        .try_init();
}

fn run_conditions(config: &CliConfig, args: &ConditionsArgs) -> CliResult<()> {
    let conditions = list_conditions();
    match OutputFormat::from(args.format) {
        OutputFormat::Json => println!("{}", render_json(&conditions)?),
        OutputFormat::Text => print!("{}", render_conditions(&conditions, config.color.should_color())),
    }
    Ok(())
}

fn run_validate(config: &CliConfig, args: &ValidateArgs) -> CliResult<()> {
    let summary = validate_scenario(&args.scenario)?;
    match OutputFormat::from(args.format) {
        OutputFormat::Json => println!("{}", render_json(&summary)?),
        OutputFormat::Text => {
            if !config.verbosity.is_quiet() {
                print!("{}", render_scenario(&summary, config.color.should_color()));
            }
        }
    }
    Ok(())
}

fn run_burst(config: &CliConfig, args: &RunArgs) -> CliResult<()> {
    let plan = resolve_plan(args)?;
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::run(format!("failed to start async runtime: {e}")))?;

    let json = OutputFormat::from(args.format) == OutputFormat::Json;
    let mut progress = ProgressReporter::new(config.verbosity.is_quiet() || json);
    progress.start(&format!(
        "{} requests under '{}'",
        args.requests, plan.label
    ));
    let summary = runtime.block_on(execute(&plan, args));
    progress.finish();
    let summary = summary?;

    if json {
        println!("{}", render_json(&summary)?);
    } else if !config.verbosity.is_quiet() {
        print!("{}", render_run(&summary, config.color.should_color()));
    }
    Ok(())
}
