use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "coldvault", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(long, global = true)]
    pub dry_run: bool,
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Overrides the serial number from the config file.
    #[arg(long, global = true)]
    pub serial: Option<String>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Create or import the pool, dataset and repository on the disk.
    Setup,
    /// Back up, verify, snapshot and eject an already provisioned disk.
    Operate,
    /// Setup followed by operate, with one confirmation.
    Run,
    /// Force-export the pool left behind by a failed run.
    Recover,
    /// Print derived names and effective settings.
    Show,
}
