use std::path::Path;

use crate::cli::commands::load;
use crate::device::confirm::StdinConfirm;
use crate::error::Result;
use crate::pool::PoolStatus;
use crate::types::RunMode;
use crate::util::command::SystemRunner;
use crate::workflow::{self, Context, SetupReport};

pub fn run_setup(config_path: &Path, serial: Option<&str>, run_mode: RunMode) -> Result<()> {
    let cfg = load(config_path, serial)?;
    let runner = SystemRunner::new(run_mode);
    let ctx = Context {
        runner: &runner,
        confirm: &StdinConfirm,
        run_mode,
    };
    let report = workflow::setup(&ctx, &cfg)?;
    print_setup(&report);
    Ok(())
}

pub(crate) fn print_setup(report: &SetupReport) {
    let pool = match report.pool.pool {
        PoolStatus::AlreadyImported => "already imported",
        PoolStatus::Imported => "imported",
        PoolStatus::Created => "created",
        PoolStatus::Simulated => "not imported (dry-run)",
    };
    println!("device: {} ({})", report.device.path.display(), report.device.serial);
    println!("pool: {}", pool);
    println!(
        "dataset: {}",
        if report.pool.dataset_created { "created" } else { "present" }
    );
    match &report.repository {
        Some(repository) => println!(
            "repository {}: {}",
            repository.path.display(),
            if report.repository_created { "initialized" } else { "present" }
        ),
        None => println!("repository: skipped (dry-run)"),
    }
}
