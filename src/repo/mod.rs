use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::util::command::{run_checked, CommandSpec, Runner};
use crate::util::paths::check_credential_file;

pub const RESTIC: &str = "restic";
/// Written by `restic init`; its presence means the repository exists.
pub const REPOSITORY_MARKER: &str = "config";
pub const LATEST: &str = "latest";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryHandle {
    pub path: PathBuf,
    pub credential_file: PathBuf,
}

impl RepositoryHandle {
    pub fn new(path: PathBuf, credential_file: PathBuf) -> Self {
        Self {
            path,
            credential_file,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.path.join(REPOSITORY_MARKER).is_file()
    }

    fn args(&self, rest: Vec<String>) -> Vec<String> {
        let mut args = vec![
            "-r".to_string(),
            self.path.to_string_lossy().to_string(),
            "--password-file".to_string(),
            self.credential_file.to_string_lossy().to_string(),
        ];
        args.extend(rest);
        args
    }

    pub fn init_command(&self) -> CommandSpec {
        CommandSpec::action(RESTIC, self.args(vec!["init".to_string()]))
    }

    /// One `--exclude` per entry, in the given order.
    pub fn backup_command(&self, source: &Path, excludes: &[PathBuf]) -> CommandSpec {
        let mut rest = vec!["backup".to_string(), source.to_string_lossy().to_string()];
        for exclude in excludes {
            rest.push("--exclude".to_string());
            rest.push(exclude.to_string_lossy().to_string());
        }
        CommandSpec::action(RESTIC, self.args(rest))
    }

    pub fn ls_command(&self) -> CommandSpec {
        CommandSpec::query(RESTIC, self.args(vec!["ls".to_string(), LATEST.to_string()]))
    }

    /// Restores exactly `include`; the path is escaped so restic does not
    /// read it as a pattern.
    pub fn restore_command(&self, target: &Path, include: &Path) -> CommandSpec {
        CommandSpec::query(
            RESTIC,
            self.args(vec![
                "restore".to_string(),
                LATEST.to_string(),
                "--target".to_string(),
                target.to_string_lossy().to_string(),
                "--include".to_string(),
                escape_pattern(&include.to_string_lossy()),
            ]),
        )
    }
}

/// Backslash-escapes the characters restic treats as pattern syntax.
pub fn escape_pattern(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for c in path.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Initializes the repository unless it already exists.
///
/// Returns `true` when `restic init` ran. The credential file is checked
/// first and a bad one aborts before anything is written.
pub fn provision(runner: &dyn Runner, repo: &RepositoryHandle) -> Result<bool> {
    check_credential_file(&repo.credential_file)?;
    if repo.is_initialized() {
        tracing::info!("repository {} already initialized", repo.path.display());
        return Ok(false);
    }
    run_checked(runner, &repo.init_command())?;
    tracing::info!("initialized repository {}", repo.path.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VaultError;
    use crate::testing::{ok, FakeRunner};
    use std::fs;
    use tempfile::TempDir;

    fn repo_in(dir: &TempDir, credential: &[u8]) -> RepositoryHandle {
        let cred = dir.path().join("password");
        fs::write(&cred, credential).expect("write credential");
        let path = dir.path().join("repo");
        fs::create_dir_all(&path).expect("mkdir repo");
        RepositoryHandle::new(path, cred)
    }

    #[test]
    fn empty_credential_never_reaches_restic() {
        let dir = TempDir::new().expect("tempdir");
        let repo = repo_in(&dir, b"");
        let runner = FakeRunner::new(|_| ok(""));
        let err = provision(&runner, &repo).unwrap_err();
        assert!(matches!(err, VaultError::Precondition(_)));
        assert_eq!(runner.call_count(), 0);
    }

    #[test]
    fn init_runs_once() {
        let dir = TempDir::new().expect("tempdir");
        let repo = repo_in(&dir, b"s3cr3t\n");
        let marker = repo.path.join(REPOSITORY_MARKER);
        let runner = FakeRunner::new(move |_| {
            fs::write(&marker, b"{}").expect("marker");
            ok("created restic repository")
        });
        assert!(provision(&runner, &repo).expect("first"));
        assert!(!provision(&runner, &repo).expect("second"));
        assert_eq!(runner.count("restic"), 1);
        assert!(runner.calls()[0].ends_with(" init"));
    }

    #[test]
    fn restore_include_is_escaped() {
        let repo = RepositoryHandle::new(PathBuf::from("/repo"), PathBuf::from("/pw"));
        let spec = repo.restore_command(Path::new("/scratch"), Path::new("/data/report[1].txt"));
        assert_eq!(
            spec.to_string(),
            "restic -r /repo --password-file /pw restore latest --target /scratch \
             --include /data/report\\[1\\].txt"
        );
        assert_eq!(escape_pattern(r"/data/a*b?c\d"), r"/data/a\*b\?c\\d");
        assert_eq!(escape_pattern("/data/plain name.txt"), "/data/plain name.txt");
    }

    #[test]
    fn backup_command_keeps_exclude_order_and_duplicates() {
        let repo =
            RepositoryHandle::new(PathBuf::from("/zpool_A/backup"), PathBuf::from("/root/pw"));
        let excludes = vec![
            PathBuf::from("/data/tmp"),
            PathBuf::from("/data/cache"),
            PathBuf::from("/data/tmp"),
        ];
        let spec = repo.backup_command(Path::new("/data"), &excludes);
        assert_eq!(
            spec.to_string(),
            "restic -r /zpool_A/backup --password-file /root/pw backup /data \
             --exclude /data/tmp --exclude /data/cache --exclude /data/tmp"
        );
        assert!(spec.mutating);
    }
}
