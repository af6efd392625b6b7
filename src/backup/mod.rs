use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

use crate::error::{BackupError, Result, VaultError};
use crate::repo::RepositoryHandle;
use crate::util::command::Runner;

#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy {
    pub interval: Duration,
    pub limit: Duration,
}

#[derive(Debug, Clone)]
pub struct BackupRun {
    pub source: PathBuf,
    pub excludes: Vec<PathBuf>,
    pub started: DateTime<Local>,
    pub elapsed: Duration,
}

/// Relative excludes are taken relative to `source`. Order and duplicates
/// are kept as configured.
pub fn derive_excludes(source: &Path, excludes: &[PathBuf]) -> Vec<PathBuf> {
    excludes
        .iter()
        .map(|exclude| {
            if exclude.is_absolute() {
                exclude.clone()
            } else {
                source.join(exclude)
            }
        })
        .collect()
}

/// Starts `restic backup` and polls it until it exits or `wait.limit` passes.
pub fn run_backup(
    runner: &dyn Runner,
    repo: &RepositoryHandle,
    source: &Path,
    excludes: &[PathBuf],
    wait: WaitPolicy,
) -> Result<BackupRun> {
    if !source.is_dir() {
        return Err(VaultError::precondition(format!(
            "source directory {} does not exist",
            source.display()
        )));
    }
    let excludes = derive_excludes(source, excludes);
    let started = Local::now();
    let clock = Instant::now();
    tracing::info!(
        "backing up {} ({} exclude(s)) to {}",
        source.display(),
        excludes.len(),
        repo.path.display()
    );
    let mut task = runner.spawn(&repo.backup_command(source, &excludes))?;
    let output = loop {
        if let Some(output) = task.poll()? {
            break output;
        }
        if clock.elapsed() >= wait.limit {
            tracing::warn!("backup exceeded {:?}; stopping restic", wait.limit);
            if let Err(err) = task.cancel() {
                tracing::warn!("stop restic: {}", err);
            }
            return Err(BackupError::TimedOut(wait.limit).into());
        }
        thread::sleep(wait.interval);
    };
    if !output.success() {
        return Err(BackupError::Failed(output.code).into());
    }
    let elapsed = clock.elapsed();
    tracing::info!("backup of {} finished in {}s", source.display(), elapsed.as_secs());
    Ok(BackupRun {
        source: source.to_path_buf(),
        excludes,
        started,
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fail, ok, FakeRunner};
    use tempfile::TempDir;

    fn repo() -> RepositoryHandle {
        RepositoryHandle::new(PathBuf::from("/zpool_A/backup"), PathBuf::from("/root/pw"))
    }

    fn wait() -> WaitPolicy {
        WaitPolicy {
            interval: Duration::ZERO,
            limit: Duration::from_secs(60),
        }
    }

    #[test]
    fn relative_excludes_join_source() {
        let excludes = derive_excludes(
            Path::new("/data"),
            &[PathBuf::from("tmp"), PathBuf::from("/data/cache")],
        );
        assert_eq!(
            excludes,
            vec![PathBuf::from("/data/tmp"), PathBuf::from("/data/cache")]
        );
    }

    #[test]
    fn backup_polls_until_done() {
        let source = TempDir::new().expect("tempdir");
        let runner = FakeRunner::new(|_| ok("")).with_polls(3);
        let run = run_backup(&runner, &repo(), source.path(), &[PathBuf::from("tmp")], wait())
            .expect("backup");
        assert_eq!(run.excludes, vec![source.path().join("tmp")]);
        assert_eq!(runner.count("restic"), 1);
    }

    #[test]
    fn failed_backup_is_fatal() {
        let source = TempDir::new().expect("tempdir");
        let runner = FakeRunner::new(|_| fail(3));
        let err = run_backup(&runner, &repo(), source.path(), &[], wait()).unwrap_err();
        assert!(matches!(err, VaultError::Backup(BackupError::Failed(3))));
    }

    #[test]
    fn wait_limit_is_enforced() {
        let source = TempDir::new().expect("tempdir");
        let runner = FakeRunner::new(|_| ok("")).with_polls(usize::MAX);
        let limit = WaitPolicy {
            interval: Duration::ZERO,
            limit: Duration::from_millis(300),
        };
        let err = run_backup(&runner, &repo(), source.path(), &[], limit).unwrap_err();
        assert!(matches!(err, VaultError::Backup(BackupError::TimedOut(_))));
        assert_eq!(err.to_string(), "backup did not finish within 300ms");
        assert_eq!(runner.cancelled(), 1);
    }

    #[test]
    fn missing_source_is_a_precondition() {
        let runner = FakeRunner::new(|_| ok(""));
        let err = run_backup(&runner, &repo(), Path::new("/nonexistent/source"), &[], wait())
            .unwrap_err();
        assert!(matches!(err, VaultError::Precondition(_)));
        assert_eq!(runner.call_count(), 0);
    }
}
