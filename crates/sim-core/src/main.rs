//! Opinion Drift Simulation
//!
//! Trains a small transformer on labelled events, then replays a timeline of
//! events against a group of agents and prints how their opinions drift.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use sim_core::{SimConfig, SimError, TraceLogger};

/// Command line arguments for the simulation
#[derive(Parser, Debug)]
#[command(name = "opinion_sim")]
#[command(about = "Opinion drift simulation driven by a small transformer")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Random seed for reproducibility (overrides the config)
    #[arg(long)]
    seed: Option<u64>,

    /// Number of training epochs (overrides the config)
    #[arg(long)]
    epochs: Option<usize>,

    /// Write the run trace as JSONL to this file
    #[arg(long)]
    trace_out: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Suppress the console trace
    #[arg(long)]
    quiet: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Simulation failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), SimError> {
    let mut config = match &args.config {
        Some(path) => SimConfig::from_file(path)?,
        None => SimConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.general.seed = seed;
    }
    if let Some(epochs) = args.epochs {
        config.trainer.epochs = epochs;
    }

    if args.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let mut logger = match &args.trace_out {
        Some(path) => TraceLogger::new(path)?,
        None => TraceLogger::console(),
    }
    .with_echo(!args.quiet);

    let summary = sim_core::run(&config, &mut logger)?;
    tracing::info!(
        agents = summary.roster.len(),
        records = logger.record_count(),
        "Trace written"
    );
    Ok(())
}
