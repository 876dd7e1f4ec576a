use clap::{Parser, Subcommand};
use std::path::PathBuf;

use firelet_lib::command::Command as LibCommand;
use firelet_lib::socket;

/// firelet-ctl - control interface for the firelet firewall manager
#[derive(Debug, Parser)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Specify socket path
    #[arg(short, long, env = socket::ENV_VAR, default_value = socket::DEFAULT_PATH)]
    pub socket_path: PathBuf,

    /// Format output as json
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch live state from the fleet and diff it against the compiled policy
    #[command()]
    Check {},

    /// Compile, project and deliver the current policy to the fleet
    #[command()]
    Deploy {},

    /// Roll the table store back N versions, then deploy the result
    #[command()]
    Rollback {
        /// how many versions back to roll, 0 is a no-op
        n: usize,
    },

    /// Query whether the store has unsaved changes and last-known reachability
    #[command()]
    Status {},

    /// Check the daemon is reachable
    #[command()]
    Ping {},
}

impl From<Command> for LibCommand {
    fn from(val: Command) -> Self {
        match val {
            Command::Check {} => LibCommand::Check,
            Command::Deploy {} => LibCommand::Deploy,
            Command::Rollback { n } => LibCommand::Rollback(n),
            Command::Status {} => LibCommand::Status,
            Command::Ping {} => LibCommand::Ping,
        }
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}
