//! Command-line interface for strictly_sync.

use clap::{Parser, Subcommand};
use strictly_tictactoe::Role;

/// Strictly Sync - play a polled tic-tac-toe match against a shared store
#[derive(Parser, Debug)]
#[command(name = "strictly_sync")]
#[command(about = "Client-side sync engine for two-player tic-tac-toe", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play one side of a match from the terminal
    Play {
        /// Match id shared with the opponent
        #[arg(long)]
        match_id: String,

        /// Role to play (X or O)
        #[arg(long, value_parser = parse_role)]
        role: Role,

        /// Your participant id
        #[arg(long)]
        player_id: String,

        /// Opponent's participant id
        #[arg(long)]
        opponent_id: String,

        /// Base URL of the store (overrides the config file)
        #[arg(long)]
        store_url: Option<String>,

        /// Poll interval in milliseconds (overrides the config file)
        #[arg(long)]
        poll_interval_ms: Option<u64>,

        /// Path to a TOML config file
        #[arg(short, long)]
        config: Option<std::path::PathBuf>,
    },

    /// Run two local sessions against an in-memory store until the game ends
    Demo {
        /// Poll interval in milliseconds
        #[arg(long, default_value = "250")]
        poll_interval_ms: u64,
    },
}

/// Parses `X` or `O`, case-insensitively.
fn parse_role(s: &str) -> Result<Role, String> {
    Role::from_wire(&s.to_uppercase()).ok_or_else(|| format!("Invalid role {:?} (expected X or O)", s))
}
