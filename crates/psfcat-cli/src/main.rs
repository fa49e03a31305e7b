mod commands;
mod progress;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "psfcat", about = "PSF star catalog refinement and blacklisting")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a batch of detector units and blacklist flagged ones
    Run(commands::run::RunArgs),
    /// Refine a single detection catalog
    Refine(commands::refine::RefineArgs),
    /// Show FWHM statistics of detection catalogs
    Stats(commands::stats::StatsArgs),
    /// Cross-match two catalogs by position
    Match(commands::matching::MatchArgs),
    /// Star-finder diagnostics and size statistics
    Diagnose(commands::diagnose::DiagnoseArgs),
    /// Print the default run config
    Config(commands::config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::Refine(args) => commands::refine::run(args),
        Commands::Stats(args) => commands::stats::run(args),
        Commands::Match(args) => commands::matching::run(args),
        Commands::Diagnose(args) => commands::diagnose::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}
