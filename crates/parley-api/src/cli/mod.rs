//! CLI command definitions and dispatch for the `parley` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod agents;
pub mod flows;
pub mod memory;
pub mod respond;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Route a question through a team of LLM agents.
#[derive(Parser)]
#[command(name = "parley", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (default: `$PARLEY_DATA_DIR/parley.toml`).
    #[arg(long, global = true, env = "PARLEY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Answer a question with a conversation flow.
    #[command(alias = "ask")]
    Respond(RespondArgs),

    /// List configured flows and their transition graphs.
    Flows,

    /// List agents and the models they are bound to.
    Agents {
        /// Only show agents of this flow.
        #[arg(long)]
        flow: Option<String>,
    },

    /// Inspect thread memory.
    Memory {
        #[command(subcommand)]
        command: MemoryCommand,
    },
}

#[derive(Args)]
pub struct RespondArgs {
    /// Conversation flow to run.
    #[arg(long, short)]
    pub flow: String,

    /// Thread to continue; a new one is started when omitted.
    #[arg(long, short)]
    pub thread: Option<String>,

    /// Context to use instead of the thread's stored memory.
    #[arg(long)]
    pub memory: Option<String>,

    /// Send the bare question and keep memory out of the seed message.
    #[arg(long)]
    pub no_memory: bool,

    /// Event type used in audit artifact names.
    #[arg(long)]
    pub event_type: Option<String>,

    /// Topic echoed back in the response.
    #[arg(long)]
    pub topic: Option<String>,

    /// The question.
    #[arg(required = true, num_args = 1..)]
    pub prompt: Vec<String>,
}

#[derive(Subcommand)]
pub enum MemoryCommand {
    /// Print the stored memory of a thread.
    Show {
        /// Thread id.
        thread: String,
    },

    /// List threads with stored memory.
    #[command(alias = "ls")]
    List,
}
