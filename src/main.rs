use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use infrasim::config::Config;
use infrasim::report::RunReport;
use infrasim::scenario::Scenario;
use infrasim::{telemetry, Simulation};
use itertools::Itertools;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "infrasim", version, about = "Infrastructure sector simulator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a scenario and run the simulation.
    Run {
        /// Scenario TOML file.
        #[arg(long)]
        scenario: PathBuf,
        /// Rounds to run; defaults to the scenario's own setting.
        #[arg(long)]
        iterations: Option<u32>,
        /// Write the JSON report to a file instead of stdout.
        #[arg(long)]
        report: Option<PathBuf>,
        /// Pretty-print the JSON report.
        #[arg(long)]
        pretty: bool,
    },
    /// Build a scenario and exit; fails on any configuration error.
    Validate {
        #[arg(long)]
        scenario: PathBuf,
    },
}

fn main() -> Result<()> {
    telemetry::init_tracing();
    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Command::Run {
            scenario,
            iterations,
            report,
            pretty,
        } => run(&config, &scenario, iterations, report.as_deref(), pretty),
        Command::Validate { scenario } => validate(&scenario),
    }
}

fn load(path: &Path) -> Result<Scenario> {
    Scenario::load(path).with_context(|| format!("loading scenario {}", path.display()))
}

fn run(
    config: &Config,
    path: &Path,
    iterations: Option<u32>,
    report_path: Option<&Path>,
    pretty: bool,
) -> Result<()> {
    let scenario = load(path)?;
    let world = scenario
        .build()
        .with_context(|| format!("building scenario '{}'", scenario.scenario.name))?;
    let iterations = iterations
        .or(config.run.iterations)
        .unwrap_or(scenario.scenario.iterations);
    let pretty = pretty || config.run.pretty;

    info!(
        "starting '{}': {} nodes, {} rounds",
        scenario.scenario.name,
        world.len(),
        iterations
    );

    let mut simulation = Simulation::new(world, config.solver);
    let reports = simulation.run(iterations);
    let report = RunReport::new(simulation.world(), reports);

    if report.summary.failed > 0 {
        warn!(
            "{} of {} allocations failed; levels kept from prior rounds",
            report.summary.failed,
            report.summary.failed + report.summary.solved
        );
    }
    let closing = report
        .summary
        .final_funds
        .iter()
        .map(|entry| format!("'{}' {:.2}", entry.country, entry.funds))
        .join(", ");
    info!("closing funds: {closing}");

    let payload = if pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    match report_path {
        Some(out) => {
            std::fs::write(out, payload)
                .with_context(|| format!("writing report to {}", out.display()))?;
            info!("report written to {}", out.display());
        }
        None => println!("{payload}"),
    }
    Ok(())
}

fn validate(path: &Path) -> Result<()> {
    let scenario = load(path)?;
    let world = scenario
        .build()
        .with_context(|| format!("building scenario '{}'", scenario.scenario.name))?;
    info!(
        "scenario '{}' is valid: {} nodes, {} top-level countries, {} facilities",
        scenario.scenario.name,
        world.len(),
        world.roots().len(),
        scenario.facilities.len()
    );
    Ok(())
}
