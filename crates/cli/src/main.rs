//! exdiff CLI - Main Entry Point
//!
//! Compares interactively rendered documentation examples between two
//! deployments: discovers slugs, collects console output or screenshots from
//! both, and reports where they diverge.

use clap::{Parser, Subcommand};

mod commands;

use commands::{diff, fetch, gather, report, visual};

/// exdiff - interactive example regression comparison
#[derive(Parser)]
#[command(name = "exdiff")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover comparable slugs in a content repository
    Gather(gather::GatherArgs),

    /// Collect console output from both deployments
    Fetch(fetch::FetchArgs),

    /// Report divergences in collected console output
    Diff(diff::DiffArgs),

    /// Collect and diff screenshots from both deployments
    Visual(visual::VisualArgs),

    /// Render the HTML report for visual results
    Report(report::ReportArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Gather(args) => gather::execute(args).await?,
        Commands::Fetch(args) => fetch::execute(args).await?,
        Commands::Diff(args) => diff::execute(args).await?,
        Commands::Visual(args) => visual::execute(args).await?,
        Commands::Report(args) => report::execute(args).await?,
    }

    Ok(())
}
