//! The backup cycle as an explicit state machine.
//!
//! `Idle → Imported → BackupComplete → Verified → Snapshotted → Exported →
//! Ejected`. Each step checks where the pipeline is before touching the
//! device, so a step can never run out of order. A failed step leaves the
//! state where it was; [`recover`] is the separate, operator-invoked way
//! back to an exported pool.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::Rng;

use crate::backup::{run_backup, BackupRun, WaitPolicy};
use crate::device::DeviceHandle;
use crate::eject::{self, Snapshot};
use crate::error::{Result, VaultError};
use crate::health::{self, HealthReport};
use crate::pool::scrub::scrub_and_wait;
use crate::pool::{ensure_imported, pool_imported, PoolIdentity, PoolStatus};
use crate::repo::RepositoryHandle;
use crate::types::HealthPolicy;
use crate::util::command::{run_checked, CommandSpec, Runner};
use crate::verify::{verify_latest, SampleFile, VerifySettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Imported,
    BackupComplete,
    Verified,
    Snapshotted,
    Exported,
    Ejected,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Imported => "imported",
            PipelineState::BackupComplete => "backup-complete",
            PipelineState::Verified => "verified",
            PipelineState::Snapshotted => "snapshotted",
            PipelineState::Exported => "exported",
            PipelineState::Ejected => "ejected",
        };
        f.write_str(name)
    }
}

pub struct Pipeline<'a> {
    runner: &'a dyn Runner,
    device: &'a DeviceHandle,
    identity: &'a PoolIdentity,
    state: PipelineState,
    pool: Option<PoolStatus>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        runner: &'a dyn Runner,
        device: &'a DeviceHandle,
        identity: &'a PoolIdentity,
    ) -> Self {
        Self {
            runner,
            device,
            identity,
            state: PipelineState::Idle,
            pool: None,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// False once a dry-run import was skipped: the pool cannot be queried.
    pub fn pool_live(&self) -> bool {
        !matches!(self.pool, None | Some(PoolStatus::Simulated))
    }

    fn require(&self, expected: PipelineState, next: PipelineState) -> Result<()> {
        if self.state != expected {
            return Err(VaultError::Transition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        Ok(())
    }

    fn enter(&mut self, next: PipelineState) {
        tracing::debug!("pipeline {} -> {}", self.state, next);
        self.state = next;
    }

    pub fn import(&mut self) -> Result<PoolStatus> {
        self.require(PipelineState::Idle, PipelineState::Imported)?;
        let status = ensure_imported(self.runner, self.identity)?;
        self.pool = Some(status);
        self.enter(PipelineState::Imported);
        Ok(status)
    }

    /// Disk health plus a full scrub. Only [`HealthPolicy::Block`] can fail
    /// the run on a bad health report.
    pub fn audit(&self, policy: HealthPolicy, scrub_interval: Duration) -> Result<HealthReport> {
        self.require(PipelineState::Imported, PipelineState::Imported)?;
        let report = health::audit(self.runner, &self.device.path);
        health::enforce(&report, &self.device.path, policy)?;
        if self.pool_live() {
            scrub_and_wait(self.runner, self.identity, scrub_interval)?;
        } else {
            tracing::info!("dry-run: skipping scrub of {}", self.identity.pool);
        }
        Ok(report)
    }

    pub fn backup(
        &mut self,
        repo: &RepositoryHandle,
        source: &Path,
        excludes: &[PathBuf],
        wait: WaitPolicy,
    ) -> Result<BackupRun> {
        self.require(PipelineState::Imported, PipelineState::BackupComplete)?;
        let run = run_backup(self.runner, repo, source, excludes, wait)?;
        self.enter(PipelineState::BackupComplete);
        Ok(run)
    }

    pub fn verify<R: Rng + ?Sized>(
        &mut self,
        repo: &RepositoryHandle,
        settings: &VerifySettings,
        rng: &mut R,
    ) -> Result<SampleFile> {
        self.require(PipelineState::BackupComplete, PipelineState::Verified)?;
        let sample = verify_latest(self.runner, repo, settings, rng)?;
        self.enter(PipelineState::Verified);
        Ok(sample)
    }

    pub fn snapshot(&mut self, label: &str) -> Result<Snapshot> {
        self.require(PipelineState::Verified, PipelineState::Snapshotted)?;
        let snapshot = eject::take_snapshot(self.runner, self.identity, label)?;
        self.enter(PipelineState::Snapshotted);
        Ok(snapshot)
    }

    /// Exports the pool and confirms nothing from it is still mounted.
    pub fn export(&mut self, mount_table: &Path) -> Result<()> {
        self.require(PipelineState::Snapshotted, PipelineState::Exported)?;
        eject::export_pool(self.runner, self.identity)?;
        eject::ensure_no_residual_mounts(mount_table, self.identity)?;
        self.enter(PipelineState::Exported);
        Ok(())
    }

    pub fn eject(&mut self) -> Result<()> {
        self.require(PipelineState::Exported, PipelineState::Ejected)?;
        eject::power_off(self.runner, &self.device.path)?;
        self.enter(PipelineState::Ejected);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    pub was_imported: bool,
}

/// Forces the pool out of the system from whatever state a failed run left.
///
/// Not part of any workflow; an operator runs it explicitly. Leaves the
/// device exported but powered on.
pub fn recover(
    runner: &dyn Runner,
    identity: &PoolIdentity,
    mount_table: &Path,
) -> Result<RecoveryReport> {
    if !pool_imported(runner, identity)? {
        tracing::info!("pool {} is not imported; nothing to recover", identity.pool);
        return Ok(RecoveryReport {
            was_imported: false,
        });
    }
    if let Err(err) = run_checked(runner, &CommandSpec::action("sync", Vec::<String>::new())) {
        tracing::warn!("sync: {}", err);
    }
    run_checked(
        runner,
        &CommandSpec::action("zpool", ["export", "-f", identity.pool.as_str()]),
    )?;
    eject::ensure_no_residual_mounts(mount_table, identity)?;
    tracing::info!("pool {} force-exported", identity.pool);
    Ok(RecoveryReport { was_imported: true })
}
