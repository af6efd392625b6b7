use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, VaultError};

pub const DEFAULT_MOUNT_TABLE: &str = "/proc/self/mounts";

pub fn read_mount_table(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| VaultError::message(format!("read {}: {}", path.display(), e)))
}

/// Mountpoints whose source is `device` or one of its partitions.
pub fn mounts_for_device(contents: &str, device: &Path) -> Vec<PathBuf> {
    let device = device.to_string_lossy();
    let mut mounts = Vec::new();
    for line in contents.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 2 {
            continue;
        }
        if is_device_or_partition(fields[0], &device) {
            mounts.push(PathBuf::from(fields[1]));
        }
    }
    mounts
}

/// Mount table lines whose source is `pool` or a dataset inside it.
pub fn mounts_for_pool(contents: &str, pool: &str) -> Vec<String> {
    let prefix = format!("{}/", pool);
    contents
        .lines()
        .filter(|line| {
            line.split_whitespace()
                .next()
                .is_some_and(|source| source == pool || source.starts_with(&prefix))
        })
        .map(|line| line.to_string())
        .collect()
}

fn is_device_or_partition(source: &str, device: &str) -> bool {
    let Some(rest) = source.strip_prefix(device) else {
        return false;
    };
    let rest = rest.strip_prefix('p').unwrap_or(rest);
    rest.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
/dev/sda1 / ext4 rw,relatime 0 0
/dev/sdb1 /media/usb vfat rw 0 0
/dev/sdbb1 /media/other ext4 rw 0 0
/dev/nvme0n1p2 /boot ext4 rw 0 0
zpool_ABC123 /zpool_ABC123 zfs rw,xattr 0 0
zpool_ABC123/backup /zpool_ABC123/backup zfs rw,xattr 0 0
zpool_ABC1234/backup /zpool_ABC1234/backup zfs rw,xattr 0 0
";

    #[test]
    fn device_mounts_include_partitions_only() {
        let mounts = mounts_for_device(TABLE, Path::new("/dev/sdb"));
        assert_eq!(mounts, vec![PathBuf::from("/media/usb")]);
        let mounts = mounts_for_device(TABLE, Path::new("/dev/nvme0n1"));
        assert_eq!(mounts, vec![PathBuf::from("/boot")]);
    }

    #[test]
    fn pool_mounts_match_pool_and_children() {
        let mounts = mounts_for_pool(TABLE, "zpool_ABC123");
        assert_eq!(mounts.len(), 2);
        assert!(mounts_for_pool(TABLE, "zpool_XYZ").is_empty());
    }
}
