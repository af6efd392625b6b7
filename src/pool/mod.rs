pub mod scrub;

use std::path::{Path, PathBuf};

use crate::error::{Result, VaultError};
use crate::mount::ops::force_unmount_device;
use crate::types::Serial;
use crate::util::command::{run_checked, CommandSpec, Runner};

pub const POOL_PREFIX: &str = "zpool_";
pub const DEFAULT_DATASET: &str = "backup";

/// Properties forced onto the dataset on every setup run.
pub const DATASET_PROPERTIES: [(&str, &str); 5] = [
    ("atime", "off"),
    ("compression", "on"),
    ("checksum", "sha256"),
    ("dedup", "off"),
    ("copies", "2"),
];

/// Pool and dataset names. A pure function of the serial, so no state file
/// is needed to find them again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolIdentity {
    pub pool: String,
    pub dataset: String,
}

impl PoolIdentity {
    pub fn derive(serial: &Serial, dataset: &str) -> Self {
        Self {
            pool: format!("{}{}", POOL_PREFIX, serial.as_str()),
            dataset: dataset.to_string(),
        }
    }

    /// `pool/dataset`, the name the volume manager knows the dataset by.
    pub fn dataset_path(&self) -> String {
        format!("{}/{}", self.pool, self.dataset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStatus {
    AlreadyImported,
    Imported,
    Created,
    /// Dry-run: the pool is not imported and the import or create was skipped.
    Simulated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    pub pool: PoolStatus,
    pub dataset_created: bool,
    /// The dataset exists on the system now. False only under dry-run, when
    /// creating the pool or dataset was skipped.
    pub live: bool,
}

pub fn pool_imported(runner: &dyn Runner, identity: &PoolIdentity) -> Result<bool> {
    let spec = CommandSpec::query("zpool", ["list", "-H", "-o", "name", identity.pool.as_str()]);
    Ok(runner.run(&spec)?.success())
}

pub fn import_pool(runner: &dyn Runner, identity: &PoolIdentity) -> Result<bool> {
    let spec = CommandSpec::action("zpool", ["import", identity.pool.as_str()]);
    Ok(runner.run(&spec)?.success())
}

/// Imports the pool unless it is already active. Does not create it.
pub fn ensure_imported(runner: &dyn Runner, identity: &PoolIdentity) -> Result<PoolStatus> {
    if pool_imported(runner, identity)? {
        return Ok(PoolStatus::AlreadyImported);
    }
    if runner.dry_run() {
        import_pool(runner, identity)?;
        tracing::info!("dry-run: pool {} is not imported", identity.pool);
        return Ok(PoolStatus::Simulated);
    }
    if import_pool(runner, identity)? {
        tracing::info!("imported pool {}", identity.pool);
        return Ok(PoolStatus::Imported);
    }
    Err(VaultError::precondition(format!(
        "pool {} is not imported and cannot be imported; run setup first",
        identity.pool
    )))
}

pub fn dataset_exists(runner: &dyn Runner, identity: &PoolIdentity) -> Result<bool> {
    let name = identity.dataset_path();
    let spec = CommandSpec::query("zfs", ["list", "-H", "-o", "name", name.as_str()]);
    Ok(runner.run(&spec)?.success())
}

pub fn apply_properties(runner: &dyn Runner, identity: &PoolIdentity) -> Result<()> {
    let name = identity.dataset_path();
    for (key, value) in DATASET_PROPERTIES {
        let spec = CommandSpec::action(
            "zfs",
            ["set".to_string(), format!("{}={}", key, value), name.clone()],
        );
        run_checked(runner, &spec)?;
    }
    tracing::info!("applied dataset properties to {}", name);
    Ok(())
}

pub fn dataset_mountpoint(runner: &dyn Runner, identity: &PoolIdentity) -> Result<PathBuf> {
    let name = identity.dataset_path();
    let spec = CommandSpec::query("zfs", ["get", "-H", "-o", "value", "mountpoint", name.as_str()]);
    let output = run_checked(runner, &spec)?;
    let value = output.stdout.trim();
    if value.is_empty() || !value.starts_with('/') {
        return Err(VaultError::message(format!(
            "dataset {} has no mountpoint (got {:?})",
            name, value
        )));
    }
    Ok(PathBuf::from(value))
}

/// Creates or imports the pool, creates the dataset if missing and
/// re-applies the dataset properties.
///
/// The device must already be confirmed blank; pool creation is forced and
/// nothing is wiped beforehand.
pub fn provision(
    runner: &dyn Runner,
    mount_table: &Path,
    identity: &PoolIdentity,
    device: &Path,
) -> Result<ProvisionReport> {
    let pool = if pool_imported(runner, identity)? {
        tracing::info!("pool {} already imported", identity.pool);
        PoolStatus::AlreadyImported
    } else if runner.dry_run() {
        tracing::info!(
            "dry-run: pool {} is not imported; it would be imported or created on {}",
            identity.pool,
            device.display()
        );
        PoolStatus::Simulated
    } else if import_pool(runner, identity)? {
        tracing::info!("imported existing pool {}", identity.pool);
        PoolStatus::Imported
    } else {
        force_unmount_device(runner, mount_table, device);
        let spec = CommandSpec::action(
            "zpool",
            [
                "create".to_string(),
                "-f".to_string(),
                identity.pool.clone(),
                device.to_string_lossy().to_string(),
            ],
        );
        run_checked(runner, &spec)?;
        tracing::info!("created pool {} on {}", identity.pool, device.display());
        PoolStatus::Created
    };

    let dataset_created = if pool == PoolStatus::Simulated {
        false
    } else if dataset_exists(runner, identity)? {
        tracing::info!("dataset {} already exists", identity.dataset_path());
        false
    } else {
        let spec = CommandSpec::action("zfs", ["create".to_string(), identity.dataset_path()]);
        run_checked(runner, &spec)?;
        tracing::info!("created dataset {}", identity.dataset_path());
        true
    };

    apply_properties(runner, identity)?;
    let live = pool != PoolStatus::Simulated && !(dataset_created && runner.dry_run());
    Ok(ProvisionReport {
        pool,
        dataset_created,
        live,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fail, ok, FakeRunner};
    use std::cell::Cell;

    fn identity() -> PoolIdentity {
        PoolIdentity::derive(&"ABC123".parse().expect("serial"), DEFAULT_DATASET)
    }

    /// Volume manager double that remembers what has been created.
    fn zfs_double() -> FakeRunner {
        let pool = Cell::new(false);
        let dataset = Cell::new(false);
        FakeRunner::new(move |spec| {
            let sub = spec.args.first().map(String::as_str).unwrap_or("");
            match (spec.program.as_str(), sub) {
                ("zpool", "list") if pool.get() => ok("zpool_ABC123\n"),
                ("zpool", "list") => fail(1),
                ("zpool", "import") => fail(1),
                ("zpool", "create") => {
                    pool.set(true);
                    ok("")
                }
                ("zfs", "list") if dataset.get() => ok("zpool_ABC123/backup\n"),
                ("zfs", "list") => fail(1),
                ("zfs", "create") => {
                    dataset.set(true);
                    ok("")
                }
                ("zfs", "set") => ok(""),
                _ => fail(127),
            }
        })
    }

    #[test]
    fn identity_is_derived_from_serial() {
        let identity = identity();
        assert_eq!(identity.pool, "zpool_ABC123");
        assert_eq!(identity.dataset_path(), "zpool_ABC123/backup");
    }

    #[test]
    fn first_run_creates_pool_and_dataset() {
        let runner = zfs_double();
        let report = provision(
            &runner,
            Path::new("/nonexistent/mounts"),
            &identity(),
            Path::new("/dev/sdb"),
        )
        .expect("provision");
        assert_eq!(report.pool, PoolStatus::Created);
        assert!(report.dataset_created);
        assert_eq!(runner.count("zpool create -f zpool_ABC123 /dev/sdb"), 1);
        assert_eq!(runner.count("zfs create zpool_ABC123/backup"), 1);
        assert_eq!(runner.count("zfs set copies=2 zpool_ABC123/backup"), 1);
        assert_eq!(runner.count("zfs set checksum=sha256 zpool_ABC123/backup"), 1);
    }

    #[test]
    fn second_run_only_sets_properties() {
        let runner = zfs_double();
        let mounts = Path::new("/nonexistent/mounts");
        provision(&runner, mounts, &identity(), Path::new("/dev/sdb")).expect("first");
        let first_sets: Vec<String> = runner
            .calls()
            .into_iter()
            .filter(|call| call.starts_with("zfs set"))
            .collect();
        let before = runner.call_count();

        let report =
            provision(&runner, mounts, &identity(), Path::new("/dev/sdb")).expect("second");
        assert_eq!(report.pool, PoolStatus::AlreadyImported);
        assert!(!report.dataset_created);

        let second: Vec<String> = runner.calls().split_off(before);
        assert!(second.iter().all(|call| !call.contains(" create ")));
        let second_sets: Vec<String> = second
            .into_iter()
            .filter(|call| call.starts_with("zfs set"))
            .collect();
        assert_eq!(first_sets, second_sets);
    }

    #[test]
    fn dry_run_on_blank_disk_queries_nothing_on_the_pool() {
        let runner = zfs_double().in_dry_run();
        let report = provision(
            &runner,
            Path::new("/nonexistent/mounts"),
            &identity(),
            Path::new("/dev/sdb"),
        )
        .expect("dry-run provision");
        assert_eq!(report.pool, PoolStatus::Simulated);
        assert!(!report.live);
        assert_eq!(runner.count("zfs list"), 0);
        assert_eq!(runner.count("zpool create"), 0);

        let status = ensure_imported(&runner, &identity()).expect("dry-run import");
        assert_eq!(status, PoolStatus::Simulated);
    }

    #[test]
    fn ensure_imported_never_creates() {
        let runner = zfs_double();
        let err = ensure_imported(&runner, &identity()).unwrap_err();
        assert!(matches!(err, VaultError::Precondition(_)));
        assert_eq!(runner.count("zpool create"), 0);
    }

    #[test]
    fn mountpoint_must_be_absolute() {
        let runner = FakeRunner::new(|_| ok("none\n"));
        assert!(dataset_mountpoint(&runner, &identity()).is_err());
        let runner = FakeRunner::new(|_| ok("/zpool_ABC123/backup\n"));
        assert_eq!(
            dataset_mountpoint(&runner, &identity()).expect("mountpoint"),
            PathBuf::from("/zpool_ABC123/backup")
        );
    }
}
