//! dialang CLI: validate catalogs and run scripted test sessions.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod script;

#[derive(Parser)]
#[command(name = "dialang", version, about = "Adaptive language placement engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a reference catalog for missing or inconsistent data
    Validate {
        /// Catalog directory (defaults to the configured one)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Drive a scripted test session through the engine
    Run {
        /// Session script (.toml)
        #[arg(long)]
        script: PathBuf,

        /// Catalog directory (defaults to the configured one)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Append capture events to this JSON-lines file
        #[arg(long)]
        capture: Option<PathBuf>,

        /// Write the final session as JSON
        #[arg(long)]
        output: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create a starter config and session script
    Init,
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dialang=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { catalog, config } => commands::validate::execute(catalog, config),
        Commands::Run {
            script,
            catalog,
            capture,
            output,
            config,
        } => commands::run::execute(script, catalog, capture, output, config).await,
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
