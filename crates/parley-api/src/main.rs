//! Parley CLI entry point.
//!
//! Binary name: `parley`
//!
//! Parses CLI arguments, loads configuration and flows, then dispatches
//! to the appropriate command handler.

mod cli;
mod state;

use anyhow::Context;
use clap::Parser;

use cli::{Cli, Commands, MemoryCommand};
use parley_observe::tracing_setup::{init_tracing, shutdown_tracing, verbosity_filter};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(verbosity_filter(cli.verbose, cli.quiet), cli.otel)
        .context("failed to initialize tracing")?;

    let state = AppState::init(cli.config.as_deref()).await?;

    let result = match cli.command {
        Commands::Respond(args) => cli::respond::respond(&state, args, cli.json, cli.verbose).await,
        Commands::Flows => cli::flows::list_flows(&state, cli.json),
        Commands::Agents { flow } => cli::agents::list_agents(&state, flow.as_deref(), cli.json),
        Commands::Memory { command } => match command {
            MemoryCommand::Show { thread } => {
                cli::memory::show_memory(&state, &thread, cli.json).await
            }
            MemoryCommand::List => cli::memory::list_threads(&state, cli.json).await,
        },
    };

    shutdown_tracing();
    result
}
