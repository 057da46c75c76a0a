//! CLI definition for the `conch` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Relay Telegram chats to an OpenAI-compatible completion engine.
#[derive(Parser)]
#[command(name = "conch", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to config.toml (defaults to ./config.toml, then the user config dir).
    #[arg(short, long, env = "CONCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also export spans to stdout via OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start polling and answering chats (the default).
    Run,

    /// Load and validate the config file, then exit.
    CheckConfig,
}
