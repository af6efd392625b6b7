use chrono::Local;
use rand::Rng;

use crate::config::model::RuntimeConfig;
use crate::device::confirm::Confirm;
use crate::device::{self, DeviceHandle};
use crate::eject::{snapshot_label, Snapshot};
use crate::error::{Result, VaultError};
use crate::pipeline::Pipeline;
use crate::pool::{self, PoolIdentity, ProvisionReport};
use crate::repo::{self, RepositoryHandle};
use crate::types::RunMode;
use crate::util::command::Runner;
use crate::util::paths::check_credential_file;
use crate::verify::SampleFile;

/// The collaborators a workflow talks to.
pub struct Context<'a> {
    pub runner: &'a dyn Runner,
    pub confirm: &'a dyn Confirm,
    pub run_mode: RunMode,
}

#[derive(Debug, Clone)]
pub struct SetupReport {
    pub device: DeviceHandle,
    pub pool: ProvisionReport,
    /// `None` under dry-run when the dataset does not exist yet.
    pub repository: Option<RepositoryHandle>,
    pub repository_created: bool,
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub sample: Option<SampleFile>,
    pub snapshot: Option<Snapshot>,
}

fn repository_for(
    runner: &dyn Runner,
    identity: &PoolIdentity,
    cfg: &RuntimeConfig,
) -> Result<RepositoryHandle> {
    let mountpoint = pool::dataset_mountpoint(runner, identity)?;
    Ok(RepositoryHandle::new(mountpoint, cfg.credential_file.clone()))
}

/// Resolves the device and provisions pool, dataset and repository.
pub fn setup(ctx: &Context, cfg: &RuntimeConfig) -> Result<SetupReport> {
    check_credential_file(&cfg.credential_file)?;
    let device = device::resolve(ctx.runner, ctx.confirm, &cfg.serial)?;
    provision(ctx, cfg, device)
}

fn provision(ctx: &Context, cfg: &RuntimeConfig, device: DeviceHandle) -> Result<SetupReport> {
    let identity = cfg.identity();
    let pool = pool::provision(ctx.runner, &cfg.mount_table, &identity, &device.path)?;
    if !pool.live {
        tracing::info!(
            "dry-run: {} does not exist yet; skipping repository",
            identity.dataset_path()
        );
        return Ok(SetupReport {
            device,
            pool,
            repository: None,
            repository_created: false,
        });
    }
    let repository = repository_for(ctx.runner, &identity, cfg)?;
    let repository_created = repo::provision(ctx.runner, &repository)?;
    Ok(SetupReport {
        device,
        pool,
        repository: Some(repository),
        repository_created,
    })
}

fn check_operate_preconditions(cfg: &RuntimeConfig) -> Result<()> {
    check_credential_file(&cfg.credential_file)?;
    if !cfg.source.is_dir() {
        return Err(VaultError::precondition(format!(
            "source directory {} does not exist",
            cfg.source.display()
        )));
    }
    Ok(())
}

/// One backup cycle against an already provisioned device.
pub fn operate<R: Rng + ?Sized>(
    ctx: &Context,
    cfg: &RuntimeConfig,
    rng: &mut R,
) -> Result<CycleReport> {
    check_operate_preconditions(cfg)?;
    let device = device::resolve(ctx.runner, ctx.confirm, &cfg.serial)?;
    cycle(ctx, cfg, &device, rng)
}

/// Setup followed by a backup cycle, with a single device confirmation.
pub fn setup_and_operate<R: Rng + ?Sized>(
    ctx: &Context,
    cfg: &RuntimeConfig,
    rng: &mut R,
) -> Result<CycleReport> {
    check_operate_preconditions(cfg)?;
    let device = device::resolve(ctx.runner, ctx.confirm, &cfg.serial)?;
    let report = provision(ctx, cfg, device)?;
    cycle(ctx, cfg, &report.device, rng)
}

fn cycle<R: Rng + ?Sized>(
    ctx: &Context,
    cfg: &RuntimeConfig,
    device: &DeviceHandle,
    rng: &mut R,
) -> Result<CycleReport> {
    let identity = cfg.identity();
    let mut pipeline = Pipeline::new(ctx.runner, device, &identity);
    pipeline.import()?;
    pipeline.audit(cfg.health_policy, cfg.poll_interval)?;
    if !pipeline.pool_live() {
        tracing::info!("dry-run: pool {} is not imported; skipping backup", identity.pool);
        return Ok(CycleReport {
            sample: None,
            snapshot: None,
        });
    }

    let repository = repository_for(ctx.runner, &identity, cfg)?;
    if !repository.is_initialized() && !ctx.run_mode.dry_run {
        return Err(VaultError::precondition(format!(
            "no repository at {}; run setup first",
            repository.path.display()
        )));
    }
    pipeline.backup(&repository, &cfg.source, &cfg.excludes, cfg.wait_policy())?;
    if ctx.run_mode.dry_run {
        tracing::info!(
            "dry-run: stopping before verification; pool {} left imported",
            identity.pool
        );
        return Ok(CycleReport {
            sample: None,
            snapshot: None,
        });
    }

    let sample = pipeline.verify(&repository, &cfg.verify_settings(), rng)?;
    let snapshot = pipeline.snapshot(&snapshot_label(&Local::now()))?;
    pipeline.export(&cfg.mount_table)?;
    pipeline.eject()?;
    Ok(CycleReport {
        sample: Some(sample),
        snapshot: Some(snapshot),
    })
}
