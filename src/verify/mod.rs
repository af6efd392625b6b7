pub mod sample;

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::{Result, VaultError, VerifyError};
use crate::repo::RepositoryHandle;
use crate::types::SamplePolicy;
use crate::util::command::{run_checked, Runner};
use crate::util::paths::{count_entries, create_scratch_dir};
use crate::verify::sample::{choose_file, parse_listing};

#[derive(Debug, Clone)]
pub struct VerifySettings {
    pub scratch_base: PathBuf,
    pub sample_size: usize,
    pub policy: SamplePolicy,
}

/// One file checked against its restored copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleFile {
    pub path: PathBuf,
    pub original_digest: String,
    pub restored_digest: String,
}

/// Hex SHA-256 of the file's content.
pub fn digest_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)
        .map_err(|e| VaultError::message(format!("open {}: {}", path.display(), e)))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|e| VaultError::message(format!("read {}: {}", path.display(), e)))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// True only for a regular file, without following symlinks. Pipes, devices
/// and links are never sampled: opening a FIFO blocks, and a link would
/// compare the live target with itself.
pub fn is_regular_file(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|meta| meta.file_type().is_file())
        .unwrap_or(false)
}

/// Where restic puts `path` when restoring into `target`.
pub fn restored_path(target: &Path, path: &Path) -> PathBuf {
    target.join(path.strip_prefix("/").unwrap_or(path))
}

/// Restores one randomly chosen file from the latest snapshot and compares
/// it with the live copy. The scratch directory is removed on every path
/// out of this function.
pub fn verify_latest<R: Rng + ?Sized>(
    runner: &dyn Runner,
    repo: &RepositoryHandle,
    settings: &VerifySettings,
    rng: &mut R,
) -> Result<SampleFile> {
    let listing = run_checked(runner, &repo.ls_command())?;
    let entries = parse_listing(&listing.stdout);
    tracing::info!("latest snapshot lists {} entries", entries.len());

    let path = choose_file(
        &entries,
        settings.policy,
        settings.sample_size,
        rng,
        |path| !is_regular_file(path),
    )
    .ok_or(VerifyError::NoEligibleFile)?;
    tracing::info!("verifying {}", path.display());
    let original_digest = digest_file(&path)?;

    let scratch = create_scratch_dir(&settings.scratch_base, "verify-")?;
    let outcome = restore_and_compare(runner, repo, scratch.path(), &path, original_digest);
    tracing::debug!(
        "removing scratch {} ({} entries)",
        scratch.path().display(),
        count_entries(scratch.path())
    );
    let scratch_path = scratch.path().to_path_buf();
    if let Err(err) = scratch.close() {
        tracing::warn!("remove scratch {}: {}", scratch_path.display(), err);
    }
    outcome
}

fn restore_and_compare(
    runner: &dyn Runner,
    repo: &RepositoryHandle,
    scratch: &Path,
    path: &Path,
    original_digest: String,
) -> Result<SampleFile> {
    run_checked(runner, &repo.restore_command(scratch, path))?;
    let restored = restored_path(scratch, path);
    if !is_regular_file(&restored) {
        return Err(VerifyError::RestoredMissing(restored.display().to_string()).into());
    }
    let restored_digest = digest_file(&restored)?;
    if restored_digest != original_digest {
        return Err(VerifyError::Mismatch {
            path: path.display().to_string(),
            expected: original_digest,
            actual: restored_digest,
        }
        .into());
    }
    tracing::info!("{} verified (sha256 {})", path.display(), restored_digest);
    Ok(SampleFile {
        path: path.to_path_buf(),
        original_digest,
        restored_digest,
    })
}
