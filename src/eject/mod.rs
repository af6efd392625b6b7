use std::path::Path;

use chrono::{DateTime, TimeZone};

use crate::error::{EjectError, Result};
use crate::mount::inspect::{mounts_for_pool, read_mount_table};
use crate::pool::PoolIdentity;
use crate::util::command::{run_checked, CommandSpec, Runner};

/// Sortable, one-second resolution.
pub const SNAPSHOT_LABEL_FORMAT: &str = "%Y%m%d-%H%M%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub dataset: String,
    pub label: String,
}

impl Snapshot {
    pub fn name(&self) -> String {
        format!("{}@{}", self.dataset, self.label)
    }
}

pub fn snapshot_label<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format(SNAPSHOT_LABEL_FORMAT).to_string()
}

pub fn take_snapshot(
    runner: &dyn Runner,
    identity: &PoolIdentity,
    label: &str,
) -> Result<Snapshot> {
    let snapshot = Snapshot {
        dataset: identity.dataset_path(),
        label: label.to_string(),
    };
    run_checked(runner, &CommandSpec::action("zfs", ["snapshot".to_string(), snapshot.name()]))?;
    tracing::info!("created snapshot {}", snapshot.name());
    Ok(snapshot)
}

/// Flushes buffers and exports the pool so the kernel releases the device.
pub fn export_pool(runner: &dyn Runner, identity: &PoolIdentity) -> Result<()> {
    run_checked(runner, &CommandSpec::action("sync", Vec::<String>::new()))?;
    run_checked(runner, &CommandSpec::action("zpool", ["export", identity.pool.as_str()]))?;
    tracing::info!("exported pool {}", identity.pool);
    Ok(())
}

pub fn ensure_no_residual_mounts(mount_table: &Path, identity: &PoolIdentity) -> Result<()> {
    let contents = read_mount_table(mount_table)?;
    let residual = mounts_for_pool(&contents, &identity.pool);
    if !residual.is_empty() {
        return Err(EjectError::ResidualMount(residual.join("; ")).into());
    }
    tracing::info!("no mounts reference pool {}", identity.pool);
    Ok(())
}

pub fn power_off(runner: &dyn Runner, device: &Path) -> Result<()> {
    run_checked(
        runner,
        &CommandSpec::action(
            "udisksctl",
            [
                "power-off".to_string(),
                "-b".to_string(),
                device.to_string_lossy().to_string(),
            ],
        ),
    )?;
    tracing::info!("{} powered off; safe to unplug", device.display());
    Ok(())
}
