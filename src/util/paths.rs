use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use tempfile::{Builder, TempDir};
use walkdir::WalkDir;

use crate::error::{Result, VaultError};

pub const CREDENTIAL_MODE: u32 = 0o400;

pub fn is_safe_name(name: &str) -> bool {
    if name.is_empty() || name == "." || name == ".." {
        return false;
    }
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

pub fn ensure_base_dir(path: &Path) -> Result<()> {
    if path.exists() {
        let meta = fs::metadata(path)
            .map_err(|e| VaultError::message(format!("stat {}: {}", path.display(), e)))?;
        if !meta.is_dir() {
            return Err(VaultError::message(format!(
                "{} is not a directory",
                path.display()
            )));
        }
    } else {
        fs::create_dir_all(path)
            .map_err(|e| VaultError::message(format!("create {}: {}", path.display(), e)))?;
    }
    let mut perms = fs::metadata(path)
        .map_err(|e| VaultError::message(format!("stat {}: {}", path.display(), e)))?
        .permissions();
    perms.set_mode(0o700);
    fs::set_permissions(path, perms)
        .map_err(|e| VaultError::message(format!("chmod {}: {}", path.display(), e)))?;
    Ok(())
}

/// Creates a private directory under `base` that is removed when dropped.
pub fn create_scratch_dir(base: &Path, prefix: &str) -> Result<TempDir> {
    ensure_base_dir(base)?;
    Builder::new()
        .prefix(prefix)
        .tempdir_in(base)
        .map_err(|e| VaultError::message(format!("create scratch in {}: {}", base.display(), e)))
}

/// Number of entries below `root`, not counting `root` itself.
pub fn count_entries(root: &Path) -> usize {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .count()
}

/// Checks the repository credential file and restricts it to its owner.
///
/// The file must exist and hold at least one byte. A file that passes has any
/// group or other permission bits cleared.
pub fn check_credential_file(path: &Path) -> Result<()> {
    let meta = fs::metadata(path).map_err(|e| {
        VaultError::precondition(format!("credential file {}: {}", path.display(), e))
    })?;
    if !meta.is_file() {
        return Err(VaultError::precondition(format!(
            "credential file {} is not a regular file",
            path.display()
        )));
    }
    if meta.len() == 0 {
        return Err(VaultError::precondition(format!(
            "credential file {} is empty",
            path.display()
        )));
    }
    if meta.permissions().mode() & 0o077 != 0 {
        let mut perms = meta.permissions();
        perms.set_mode(CREDENTIAL_MODE);
        fs::set_permissions(path, perms)
            .map_err(|e| VaultError::message(format!("chmod {}: {}", path.display(), e)))?;
        tracing::info!(
            "restricted credential file {} to mode {:o}",
            path.display(),
            CREDENTIAL_MODE
        );
    }
    Ok(())
}
