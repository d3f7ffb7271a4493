//! Lumen CLI - multi-host Markdown content server.
//!
//! Provides commands for:
//! - `run`: Serve every host listed in `settings.yaml`

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use lumen_server::ACCESS_TARGET;
use tracing_subscriber::EnvFilter;

use commands::RunArgs;
use error::CliError;
use output::Output;

/// Application version from Cargo.toml.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Lumen - multi-host Markdown content server.
#[derive(Parser)]
#[command(name = "lumen", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the configured hosts.
    Run(RunArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    let verbose = matches!(&cli.command, Commands::Run(args) if args.verbose);

    // --verbose enables INFO level, otherwise RUST_LOG or WARN plus the access log
    let filter = if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("warn,{ACCESS_TARGET}=info")))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = match cli.command {
        Commands::Run(args) => run(args),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}

fn run(args: RunArgs) -> Result<(), CliError> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(args.execute(VERSION))
}
