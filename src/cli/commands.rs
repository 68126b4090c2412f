//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// HTTP client with token refresh and retries
#[derive(Parser, Debug)]
#[command(name = "resilient-http")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Client configuration file (YAML or JSON)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Token store file (JSON)
    #[arg(short, long, global = true)]
    pub store: Option<PathBuf>,

    /// Base URL, overrides the configuration file
    #[arg(short, long, global = true)]
    pub base_url: Option<String>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a request through the retry and refresh pipeline
    Request {
        /// HTTP method
        method: String,

        /// Absolute URL or path relative to the base URL
        path: String,

        /// Inline JSON body
        #[arg(short, long)]
        data: Option<String>,

        /// Extra header as `Name: value` (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
    },

    /// Inspect or edit the stored token
    Token {
        #[command(subcommand)]
        action: TokenCommand,
    },

    /// Print the effective client configuration
    Config,
}

/// Token store subcommands
#[derive(Subcommand, Debug)]
pub enum TokenCommand {
    /// Show the stored token and its expiry
    Show {
        /// Print the full token instead of a prefix
        #[arg(long)]
        reveal: bool,
    },

    /// Store a token
    Set {
        /// Token value
        token: String,

        /// Expiry as RFC 3339 or epoch milliseconds
        #[arg(long, conflicts_with = "expires_in")]
        expires_at: Option<String>,

        /// Lifetime in seconds from now
        #[arg(long)]
        expires_in: Option<i64>,
    },

    /// Remove the stored token
    Clear,

    /// Force a token refresh through the configured endpoint
    Refresh,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Compact JSON
    Json,
    /// Indented JSON
    Pretty,
    /// Raw response body
    Raw,
}
