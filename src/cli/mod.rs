//! CLI module for Braid
//!
//! Provides command-line interface parsing for the braid-server binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Braid - multi-source search aggregation server
///
/// Combines a generated narrative with video, discussion and image
/// results into one structured answer per query.
#[derive(Parser, Debug)]
#[command(
    name = "braid-server",
    version,
    about = "Braid - multi-source search aggregation server",
    long_about = "Braid combines a generated narrative with video, discussion and image results\n\
                  into one structured answer per query.\n\n\
                  Run without arguments to start the server, or use 'search' to answer a single query.",
    after_help = "EXAMPLES:\n    \
                  braid-server                          # Start the server (reads braid.toml)\n    \
                  braid-server --config my.toml         # Use a custom config file\n    \
                  braid-server search \"rust async\"      # Answer one query in the terminal\n    \
                  braid-server search --stream \"tea\"    # Print the narrative as it arrives\n    \
                  braid-server config --validate        # Check the configuration file"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "braid.toml", global = true)]
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
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server (default when no subcommand is given)
    Serve,

    /// Run a single search and print the fused answer
    Search {
        /// The search query
        query: String,

        /// Print narrative text as it is generated
        #[arg(short, long)]
        stream: bool,

        /// Print the full response as JSON instead of formatted text
        #[arg(long)]
        json: bool,

        /// Treat the caller as not entitled to web-grounded synthesis
        #[arg(long)]
        no_web: bool,
    },

    /// Show configuration information
    Config {
        /// Show the full configuration
        #[arg(short = 'f', long)]
        full: bool,

        /// Validate the configuration file
        #[arg(long)]
        validate: bool,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
