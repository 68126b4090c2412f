//! CLI module
//!
//! Command-line interface for sending requests through the client.
//!
//! # Commands
//!
//! - `request` - Send a request with token refresh and retries
//! - `token show|set|clear|refresh` - Manage the token store
//! - `config` - Print the effective configuration

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat, TokenCommand};
pub use runner::Runner;
