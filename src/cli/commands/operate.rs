use std::path::Path;

use crate::cli::commands::load;
use crate::device::confirm::StdinConfirm;
use crate::error::Result;
use crate::types::RunMode;
use crate::util::command::SystemRunner;
use crate::workflow::{self, Context, CycleReport};

pub fn run_operate(config_path: &Path, serial: Option<&str>, run_mode: RunMode) -> Result<()> {
    let cfg = load(config_path, serial)?;
    let runner = SystemRunner::new(run_mode);
    let ctx = Context {
        runner: &runner,
        confirm: &StdinConfirm,
        run_mode,
    };
    let report = workflow::operate(&ctx, &cfg, &mut rand::thread_rng())?;
    print_cycle(&report);
    Ok(())
}

pub(crate) fn print_cycle(report: &CycleReport) {
    if let Some(sample) = &report.sample {
        println!("verified {} sha256 {}", sample.path.display(), sample.restored_digest);
    }
    match &report.snapshot {
        Some(snapshot) => {
            println!("snapshot {}", snapshot.name());
            println!("disk ejected; safe to disconnect");
        }
        None => println!("dry-run complete; nothing was snapshotted or ejected"),
    }
}
