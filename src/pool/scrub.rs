use std::thread;
use std::time::Duration;

use crate::error::Result;
use crate::pool::PoolIdentity;
use crate::util::command::{run_checked, CommandSpec, Runner};

const IN_PROGRESS: &str = "scrub in progress";

pub fn scrub_in_progress(status: &str) -> bool {
    status.contains(IN_PROGRESS)
}

/// The `scan:` line of `zpool status`, if present.
pub fn scan_line(status: &str) -> Option<&str> {
    status
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("scan:"))
}

/// Starts a scrub and blocks until `zpool status` stops reporting it.
///
/// There is no timeout: scrub time grows with the amount of data on the pool.
pub fn scrub_and_wait(
    runner: &dyn Runner,
    identity: &PoolIdentity,
    interval: Duration,
) -> Result<()> {
    let pool = identity.pool.as_str();
    run_checked(runner, &CommandSpec::action("zpool", ["scrub", pool]))?;
    tracing::info!("scrub started on {}", pool);
    let status = CommandSpec::query("zpool", ["status", pool]);
    loop {
        let output = run_checked(runner, &status)?;
        if !scrub_in_progress(&output.stdout) {
            match scan_line(&output.stdout) {
                Some(line) => tracing::info!("scrub finished on {}: {}", pool, line),
                None => tracing::info!("scrub finished on {}", pool),
            }
            return Ok(());
        }
        tracing::debug!("scrub still running on {}", pool);
        thread::sleep(interval);
    }
}
