use std::path::PathBuf;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::args::{Cli, Command};
use crate::cli::commands::{exit_for_error, operate, recover, run as run_cmd, setup, show};
use crate::types::RunMode;

const CONFIG_FILE: &str = "/etc/coldvault.yaml";
const VERSION: &str = env!("CARGO_PKG_VERSION");
const LICENSE_NAME: &str = "GNU GPL v3 or later";

pub mod args;
pub mod commands;

pub fn run() -> Result<()> {
    let cli = parse_cli();
    init_tracing(cli.verbose);

    print_banner();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    let serial = cli.serial.as_deref();
    let run_mode = RunMode {
        dry_run: cli.dry_run,
        verbose: cli.verbose,
    };
    if run_mode.dry_run {
        println!("dry-run: no changes will be made to the disk");
    }

    let result = match cli.command {
        Command::Setup => setup::run_setup(&config_path, serial, run_mode),
        Command::Operate => operate::run_operate(&config_path, serial, run_mode),
        Command::Run => run_cmd::run_all(&config_path, serial, run_mode),
        Command::Recover => recover::run_recover(&config_path, serial, run_mode),
        Command::Show => show::run_show(&config_path, serial),
    };
    if let Err(err) = result {
        tracing::error!("{:?} failed: {}", cli.command, err);
        exit_for_error(&err);
    }
    Ok(())
}

fn parse_cli() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            if err.kind() == ErrorKind::DisplayVersion {
                print_banner();
                println!("License: {}", LICENSE_NAME);
                std::process::exit(0);
            }
            if err.kind() == ErrorKind::DisplayHelp {
                print_banner();
                print!("{}", err);
                std::process::exit(0);
            }
            if err.kind() == ErrorKind::MissingSubcommand
                || err.kind() == ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            {
                print_banner();
            }
            print!("{}", err);
            std::process::exit(2);
        }
    }
}

fn print_banner() {
    println!("Coldvault {}", VERSION);
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
