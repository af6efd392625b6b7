use std::path::Path;

use crate::cli::commands::load;
use crate::error::Result;
use crate::pipeline::recover;
use crate::types::RunMode;
use crate::util::command::SystemRunner;

pub fn run_recover(config_path: &Path, serial: Option<&str>, run_mode: RunMode) -> Result<()> {
    let cfg = load(config_path, serial)?;
    let identity = cfg.identity();
    let runner = SystemRunner::new(run_mode);
    let report = recover(&runner, &identity, &cfg.mount_table)?;
    if report.was_imported {
        println!("pool {} exported; the disk can be powered off", identity.pool);
    } else {
        println!("pool {} was not imported", identity.pool);
    }
    Ok(())
}
