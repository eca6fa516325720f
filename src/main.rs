//! layerconf
//!
//! Loads a layered configuration (primary file, optional overrides, environment
//! variables) and prints the merged result as JSON.

use anyhow::Result;
use clap::Parser;
use layerconf::cli::{Cli, inspect};
use std::fs::OpenOptions;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn init_logging(cli: &Cli) -> Result<()> {
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    match cli.log.as_str() {
        "0" | "off" => {
            // No logging
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            // Log to file (append mode)
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)?;
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter())
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let report = inspect(&cli)?;
    info!(files = ?report.files, provenance = %report.provenance, "Loaded configuration");

    println!("{}", serde_json::to_string_pretty(&report.config)?);
    Ok(())
}
