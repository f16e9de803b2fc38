//! CLI module for Mioo
//!
//! Provides command-line interface parsing for the mioo-server binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Mioo - multi-agent orchestration server
///
/// Routes every user message through a router agent, an optional retriever
/// agent and one responder agent, keeping a durable conversation per agent.
#[derive(Parser, Debug)]
#[command(
    name = "mioo-server",
    version,
    about = "Mioo - multi-agent orchestration server",
    long_about = "Routes every user message through a router agent, an optional retriever agent\n\
                  and exactly one responder agent, keeping a durable conversation per agent.\n\n\
                  Run without arguments to start the server, or use a subcommand to operate\n\
                  on conversations directly.",
    after_help = "EXAMPLES:\n    \
                  mioo-server                                        # Start the server (requires mioo.toml)\n    \
                  mioo-server --config my.toml serve                 # Use a custom config file\n    \
                  mioo-server turn --user u1 --message \"Hi there\"    # Run one turn from the terminal\n    \
                  mioo-server reset --user u1 --agent all            # Summarize every conversation of u1\n    \
                  mioo-server delete --user u1 --agent milo          # Delete one conversation\n    \
                  mioo-server check                                  # Validate the configuration"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "mioo.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve {
        /// Override the configured host
        #[arg(long)]
        host: Option<String>,

        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Process one turn and print the result with its flow trace
    Turn {
        /// User identifier
        #[arg(short, long)]
        user: String,

        /// Message text
        #[arg(short, long)]
        message: String,

        /// Print the payload as raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize and collapse conversations
    Reset {
        /// User identifier
        #[arg(short, long)]
        user: String,

        /// Agent id or "all"
        #[arg(short, long, default_value = "all")]
        agent: String,
    },

    /// Delete conversations
    Delete {
        /// User identifier
        #[arg(short, long)]
        user: String,

        /// Agent id or "all"
        #[arg(short, long, default_value = "all")]
        agent: String,
    },

    /// Validate the configuration and list the agents it defines
    Check,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
