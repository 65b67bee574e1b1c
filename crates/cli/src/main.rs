//! FalconEye CLI
//!
//! Runs the flight diagnostic anomaly engine over telemetry files and
//! prints labeled verdicts.

mod commands;
mod config;
mod output;
mod telemetry;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::detect::DetectOptions;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// FalconEye flight diagnostic CLI
#[derive(Parser)]
#[command(name = "falconeye")]
#[command(author, version, about = "FalconEye flight diagnostic anomaly detection", long_about = None)]
pub struct Cli {
    /// Output format (defaults to the settings file, then table)
    #[arg(long, short, global = true)]
    pub format: Option<output::OutputFormat>,

    /// Path to a JSON settings file (default: ~/.config/falconeye/config.json)
    #[arg(long, env = "FALCONEYE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log detection stages to stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Detect anomalies in a telemetry file (CSV or JSON)
    Detect {
        /// Telemetry file
        file: PathBuf,

        /// Channel scored by the statistical detector
        #[arg(long, env = "FALCONEYE_SCORE_CHANNEL")]
        score_channel: Option<String>,

        /// Sensitivity multiplier: flag values above mean + k * std
        #[arg(long, short, env = "FALCONEYE_K")]
        k: Option<f64>,

        /// Also run the multivariate isolation-forest detector
        #[arg(long)]
        ml: bool,

        /// Feature channels for the multivariate detector (comma separated)
        #[arg(long, value_delimiter = ',')]
        features: Vec<String>,

        /// Expected anomaly fraction for the multivariate detector
        #[arg(long, env = "FALCONEYE_CONTAMINATION")]
        contamination: Option<f64>,

        /// Fixed random seed for reproducible multivariate runs
        #[arg(long, env = "FALCONEYE_SEED")]
        seed: Option<u64>,

        /// Number of isolation trees
        #[arg(long)]
        trees: Option<usize>,

        /// Only list samples flagged as anomalous
        #[arg(long)]
        anomalies_only: bool,
    },

    /// Show the channels of a telemetry file with summary statistics
    Inspect {
        /// Telemetry file
        file: PathBuf,
    },
}

fn main() {
    if let Err(err) = run() {
        output::print_error(&format!("{:#}", err));
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }

    let settings = config::Settings::load(cli.config.as_deref())?;
    let format = cli
        .format
        .or_else(|| {
            settings
                .format
                .as_deref()
                .and_then(output::OutputFormat::from_name)
        })
        .unwrap_or_default();

    match cli.command {
        Commands::Detect {
            file,
            score_channel,
            k,
            ml,
            features,
            contamination,
            seed,
            trees,
            anomalies_only,
        } => {
            let options = DetectOptions {
                file,
                score_channel,
                k,
                ml,
                features,
                contamination,
                seed,
                trees,
                anomalies_only,
            };
            commands::detect::detect(&options, &settings, format)?;
        }
        Commands::Inspect { file } => {
            commands::inspect::inspect(&file, format)?;
        }
    }

    Ok(())
}
