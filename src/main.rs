use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use mathrandom_predictor::error::Result;
use mathrandom_predictor::report::{self, PredictionRequest, DEFAULT_PREDICTIONS};
use mathrandom_predictor::rng::SimulatedHost;
use mathrandom_predictor::runtime::{Host, NativeHost, Runtime, SemanticVersion};
use mathrandom_predictor::solver::SolverConfig;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Predict future Math.random() values
#[derive(Parser)]
#[command(name = "mathrandom-predictor", version)]
struct Cli {
    /// Engine that produced the sequence
    #[arg(short, long, value_enum)]
    environment: Runtime,

    /// Observed sequence, in the order Math.random() returned it
    #[arg(short, long, num_args = 1..)]
    sequence: Option<Vec<f64>>,

    /// Number of predictions
    #[arg(short, long, default_value_t = DEFAULT_PREDICTIONS, value_parser = positive)]
    predictions: usize,

    /// Node.js version to target, e.g. 22 or 22.4.1
    #[arg(short = 'v', long)]
    env_version: Option<SemanticVersion>,

    /// File to export results to. Must be a .json file, relative to the current directory
    #[arg(short = 'x', long)]
    export: Option<PathBuf>,

    /// If exporting, overwrite an existing file or create missing directories
    #[arg(short, long)]
    force: bool,

    /// Sample the sequence from a simulated engine seeded with this value
    #[arg(long, conflicts_with = "sequence")]
    simulate: Option<u64>,

    /// Solver timeout per strategy in milliseconds (0 = none)
    #[arg(long, default_value_t = 0)]
    timeout_ms: u64,

    /// Verbose output
    #[arg(long)]
    verbose: bool,
}

fn positive(s: &str) -> std::result::Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("number of predictions must be greater than 0".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Something went wrong! {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut host: Box<dyn Host> = match cli.simulate {
        Some(seed) => Box::new(SimulatedHost::seeded(cli.environment, cli.env_version, seed)),
        None => Box::new(NativeHost),
    };

    let request = PredictionRequest {
        runtime: cli.environment,
        sequence: cli.sequence,
        predictions: cli.predictions,
        engine_version: cli.env_version,
        export: cli.export,
        force: cli.force,
        solver: SolverConfig {
            timeout_ms: cli.timeout_ms,
        },
    };

    let result = report::run(&request, host.as_mut())?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    for message in &result.info {
        info!("{}", message);
    }
    for warning in &result.warnings {
        warn!("{}", warning);
    }
    Ok(())
}
