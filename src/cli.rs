use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// helmsman - leadership and peer-set reconciliation for orchestrator servers
#[derive(Parser)]
#[command(name = "helmsman")]
#[command(author = "Helmsman Team")]
#[command(version = "0.1.0")]
#[command(about = "Keeps a consensus peer set aligned with gossip membership while this server leads")]
#[command(long_about = "
helmsman runs the leader-side reconciliation between gossip membership and
the consensus voting-peer set.

Usage examples:
  helmsman check-config server.toml
  helmsman simulate --config server.toml --members members.toml
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

/// Available commands for the helmsman CLI
#[derive(Subcommand)]
pub enum Commands {
    /// Validate a server configuration file
    CheckConfig {
        /// Path to the TOML configuration
        config: PathBuf,
    },

    /// Run one leadership term against in-memory collaborators
    Simulate {
        /// Path to the TOML configuration
        #[arg(short, long)]
        config: PathBuf,

        /// TOML file with the initial `members` and later `events`
        #[arg(short, long)]
        members: PathBuf,

        /// Time given to the leader loop after each step, in milliseconds
        #[arg(long, default_value = "50")]
        settle_ms: u64,
    },
}
