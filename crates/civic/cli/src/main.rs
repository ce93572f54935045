//! civicctl - operator CLI for the civic governance core
//!
//! Replays a JSON-lines commit log through the governance kernel and
//! answers questions about the resulting authority:
//! - which decision each commit received
//! - what an authority reference resolves to at a given instant
//! - whether it holds a capability
//! - which lifecycle edges leave a state

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod output;
mod replay;

use civic_types::ObjectState;
use config::CliConfig;
use error::{CliError, CliResult};
use output::{print_error, print_output, print_success, OutputFormat};
use replay::{read_log, replay, Replay, ReplayOptions};

/// civicctl application
#[derive(Parser)]
#[command(name = "civicctl")]
#[command(about = "Civic governance core - replay and inspect commit logs", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CIVIC_CONFIG")]
    config: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, env = "CIVIC_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where to rebuild state from
#[derive(clap::Args)]
struct LogArgs {
    /// JSON-lines commit log
    #[arg(short, long)]
    log: String,

    /// Seed this custodian as the genesis authority before replaying
    #[arg(short, long)]
    genesis: Option<String>,

    /// Evaluate at this instant (unix ms); later commits are not replayed
    #[arg(long)]
    at: Option<i64>,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Replay a commit log and print the decision for every commit
    Replay {
        /// JSON-lines commit log
        log: String,

        /// Seed this custodian as the genesis authority before replaying
        #[arg(short, long)]
        genesis: Option<String>,

        /// Stop before commits stamped after this instant (unix ms)
        #[arg(long)]
        at: Option<i64>,
    },

    /// Resolve an authority reference against a replayed log
    Resolve {
        /// Authority reference, e.g. `user:bob`
        authority_ref: String,

        #[command(flatten)]
        source: LogArgs,
    },

    /// Check whether an authority holds a capability; exits 1 if not
    Check {
        /// Authority reference, e.g. `user:bob`
        authority_ref: String,

        /// Required capability, e.g. `STATE_TRANSITION:PURCHASE_ORDER:COMMIT`
        capability: String,

        /// Required scope, e.g. `site.a`
        #[arg(short, long)]
        scope: Option<String>,

        #[command(flatten)]
        source: LogArgs,
    },

    /// List the lifecycle edges leaving a state
    NextStates {
        /// DRAFT, HOLD, PROPOSE, COMMIT or REVERT
        state: String,
    },

    /// Show the effective configuration
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref())?;

    let level = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    if cli.log_json || config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .without_time()
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    match run(cli.command, &config, cli.output) {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            print_error(&e.to_string());
            std::process::exit(2)
        }
    }
}

/// Execute a command. `Ok(false)` means the answer was negative.
fn run(command: Commands, config: &CliConfig, format: OutputFormat) -> CliResult<bool> {
    match command {
        Commands::Replay { log, genesis, at } => {
            let replayed = load(&log, genesis, at, config)?;
            let rows = replayed
                .steps
                .iter()
                .map(|(line, outcome)| output::OutcomeRow::new(*line, outcome))
                .collect();
            print_output(rows, format)?;
            if matches!(format, OutputFormat::Table) {
                let applied = replayed.steps.iter().filter(|(_, o)| o.is_applied()).count();
                print_success(&format!(
                    "{applied}/{} commits applied, {} objects governed",
                    replayed.steps.len(),
                    replayed.kernel.objects().len()
                ));
            }
            Ok(true)
        }

        Commands::Resolve {
            authority_ref,
            source,
        } => {
            let replayed = load(&source.log, source.genesis, source.at, config)?;
            let resolution = replayed
                .kernel
                .resolver()
                .resolve_at(&authority_ref, replayed.now_ms())?;
            match format {
                OutputFormat::Table => {
                    print_output(vec![output::ResolutionRow::from(&resolution)], format)?
                }
                OutputFormat::Json => output::print_single(&resolution)?,
            }
            Ok(resolution.valid)
        }

        Commands::Check {
            authority_ref,
            capability,
            scope,
            source,
        } => {
            let replayed = load(&source.log, source.genesis, source.at, config)?;
            let check = replayed.kernel.resolver().has_capability_at(
                &authority_ref,
                &capability,
                scope.as_deref(),
                replayed.now_ms(),
            )?;
            match format {
                OutputFormat::Table => print_output(vec![output::CheckRow::from(&check)], format)?,
                OutputFormat::Json => output::print_single(&check)?,
            }
            Ok(check.authorized)
        }

        Commands::NextStates { state } => {
            let from: ObjectState = state
                .to_uppercase()
                .parse()
                .map_err(CliError::InvalidInput)?;
            print_output(output::edge_rows(from), format)?;
            Ok(true)
        }

        Commands::Config => {
            output::print_single(config)?;
            Ok(true)
        }
    }
}

fn load(
    path: &str,
    genesis: Option<String>,
    until_ms: Option<i64>,
    config: &CliConfig,
) -> CliResult<Replay> {
    let records = read_log(path)?;
    replay(&records, &config.governance, &ReplayOptions { genesis, until_ms })
}
