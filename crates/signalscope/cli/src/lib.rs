//! Signalscope CLI - command-line interface for alert metric analysis
//!
//! This CLI lets operators run the feature engine on exported metrics:
//! - Extract statistical, time-series, anomaly, pattern and correlation features
//! - Validate analysis configuration files
//! - Print the default configuration as a starting point

#![deny(unsafe_code)]

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod error;
mod output;

pub use config::load_config;
pub use error::{CliError, CliResult};
pub use output::OutputFormat;

/// Signalscope CLI application
#[derive(Parser)]
#[command(name = "signalscope")]
#[command(about = "Signalscope - feature extraction and anomaly detection for alert metrics", long_about = None)]
#[command(version)]
struct Cli {
    /// Analysis configuration file (.yaml, .yml or .json)
    #[arg(short, long, env = "SIGNALSCOPE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Extract features for a primary metric and its related metrics
    Analyze {
        /// JSON file with `primary` and optional `related` series (`-` for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output format (json, yaml)
        #[arg(short, long, value_enum, default_value = "json")]
        output: OutputFormat,
    },

    /// Check that a configuration file parses and validates
    ValidateConfig {
        /// Configuration file to check
        file: PathBuf,
    },

    /// Print the default configuration
    DefaultConfig {
        /// Output format (json, yaml)
        #[arg(short, long, value_enum, default_value = "yaml")]
        output: OutputFormat,
    },
}

/// Run using the current process arguments.
pub async fn run() -> CliResult<()> {
    run_with_args(std::env::args_os()).await
}

/// Run using the provided argument iterator.
pub async fn run_with_args<I, T>(args: I) -> CliResult<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    // Logs go to stderr; stdout carries the rendered output.
    let filter = if cli.verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .try_init();

    match cli.command {
        Commands::Analyze { input, output } => {
            let config = load_config(cli.config.as_deref())?;
            commands::analyze::execute(&input, config, output).await
        }
        Commands::ValidateConfig { file } => commands::config::validate(&file),
        Commands::DefaultConfig { output } => commands::config::print_default(output),
    }
}
