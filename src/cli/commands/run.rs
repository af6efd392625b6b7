use std::path::Path;

use crate::cli::commands::load;
use crate::cli::commands::operate::print_cycle;
use crate::device::confirm::StdinConfirm;
use crate::error::Result;
use crate::types::RunMode;
use crate::util::command::SystemRunner;
use crate::workflow::{self, Context};

pub fn run_all(config_path: &Path, serial: Option<&str>, run_mode: RunMode) -> Result<()> {
    let cfg = load(config_path, serial)?;
    let runner = SystemRunner::new(run_mode);
    let ctx = Context {
        runner: &runner,
        confirm: &StdinConfirm,
        run_mode,
    };
    let report = workflow::setup_and_operate(&ctx, &cfg, &mut rand::thread_rng())?;
    print_cycle(&report);
    Ok(())
}
