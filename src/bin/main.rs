//! Thin CLI wiring over the `finfocus` library (spec.md §1 "the CLI
//! flag/command plumbing" is an external collaborator; this binary is the
//! minimal surface the core exposes, not a full TUI). Mirrors the teacher's
//! `llm-cost-ops-cli` split: argument parsing lives here, all behavior
//! lives in the library.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use rust_decimal::Decimal;
use tracing::info;

use finfocus::config::Config;
use finfocus::domain::cost::CostResult;
use finfocus::domain::resource::ResourceDescriptor;
use finfocus::{budget, carbon};

#[derive(Parser)]
#[command(name = "finfocus")]
#[command(about = "FinOps plugin routing and cost-aggregation CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// Project-local config directory override (spec.md §4.5).
    #[arg(long, value_name = "DIR")]
    project_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a plan or state document into normalized resource descriptors.
    Ingest {
        /// Pulumi plan JSON file.
        #[arg(long, conflicts_with = "state")]
        plan: Option<PathBuf>,

        /// Pulumi state JSON file.
        #[arg(long)]
        state: Option<PathBuf>,

        /// Output format.
        #[arg(long, default_value = "json")]
        output: OutputFormat,
    },

    /// Load and semantically validate the merged configuration.
    Validate {
        /// Known plugin names, for routing-reference validation.
        #[arg(long = "plugin")]
        plugins: Vec<String>,
    },

    /// Evaluate budgets against a previously produced cost-result set.
    BudgetCheck {
        /// JSON array of `CostResult`.
        #[arg(long)]
        results: PathBuf,

        /// JSON array of `ResourceDescriptor`, for provider/tag scoping.
        #[arg(long)]
        resources: Option<PathBuf>,

        /// Evaluate using `Monthly` projections instead of `TotalCost` actuals.
        #[arg(long)]
        projection: bool,

        #[arg(long, default_value = "30")]
        period_total_days: Decimal,

        #[arg(long, default_value = "30")]
        days_elapsed: Decimal,
    },

    /// Print the carbon equivalency for a cost-result set.
    Carbon {
        /// JSON array of `CostResult`.
        #[arg(long)]
        results: PathBuf,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Table,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = finfocus::config::load(cli.project_dir.as_deref()).unwrap_or_default();
    finfocus::logging::init_from_env(config.logging.as_ref());

    match run(&cli, &config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: &Cli, config: &Config) -> Result<ExitCode> {
    match &cli.command {
        Commands::Ingest { plan, state, output } => {
            let descriptors = ingest_descriptors(plan.as_deref(), state.as_deref())?;
            info!(count = descriptors.len(), "ingested resource descriptors");
            print_descriptors(&descriptors, *output)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate { plugins } => {
            config
                .validate_semantics(plugins)
                .context("configuration validation failed")?;
            println!("configuration is valid");
            Ok(ExitCode::SUCCESS)
        }
        Commands::BudgetCheck {
            results,
            resources,
            projection,
            period_total_days,
            days_elapsed,
        } => budget_check(config, results, resources.as_deref(), *projection, *period_total_days, *days_elapsed),
        Commands::Carbon { results } => {
            let results = read_results(results)?;
            match carbon::equivalency(&results) {
                Some(text) => println!("{text}"),
                None => println!("no measurable carbon footprint (< 1 kg CO2e)"),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn ingest_descriptors(plan: Option<&std::path::Path>, state: Option<&std::path::Path>) -> Result<Vec<ResourceDescriptor>> {
    match (plan, state) {
        (Some(path), None) => finfocus::ingest::PlanDocument::from_path(path).context("failed to ingest plan document"),
        (None, Some(path)) => finfocus::ingest::StateDocument::from_path(path).context("failed to ingest state document"),
        _ => anyhow::bail!("exactly one of --plan or --state must be given"),
    }
}

fn print_descriptors(descriptors: &[ResourceDescriptor], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(descriptors)?;
            println!("{json}");
        }
        OutputFormat::Table => {
            for d in descriptors {
                println!("{:<12} {:<50} {}", d.provider, d.type_, d.id);
            }
        }
    }
    Ok(())
}

fn read_results(path: &std::path::Path) -> Result<Vec<CostResult>> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parsing cost results from {}", path.display()))
}

fn read_resources(path: &std::path::Path) -> Result<Vec<ResourceDescriptor>> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parsing resource descriptors from {}", path.display()))
}

fn budget_check(
    config: &Config,
    results_path: &std::path::Path,
    resources_path: Option<&std::path::Path>,
    projection: bool,
    period_total_days: Decimal,
    days_elapsed: Decimal,
) -> Result<ExitCode> {
    let budgets = config
        .cost
        .as_ref()
        .and_then(|c| c.budgets.as_ref())
        .context("no cost.budgets section configured")?;

    let results = read_results(results_path)?;
    let resources = match resources_path {
        Some(p) => read_resources(p)?,
        None => Vec::new(),
    };

    let report = budget::evaluate(budgets, &results, &resources, projection, period_total_days, days_elapsed);

    for scope in &report.scopes {
        for alert in &scope.alerts {
            println!(
                "{} [{}] {:?} spend {} {} ({:.1}% of {} {})",
                style("ALERT").red().bold(),
                scope.scope,
                alert.alert_type,
                alert.spend,
                alert.currency,
                alert.ratio * Decimal::from(100),
                alert.amount,
                alert.currency
            );
        }
    }
    for warning in &report.warnings {
        println!("{} {warning}", style("WARNING").yellow().bold());
    }

    match report.exit_directive() {
        Some(code) => Ok(ExitCode::from(code as u8)),
        None => Ok(ExitCode::SUCCESS),
    }
}
