use std::path::Path;

use crate::mount::inspect::{mounts_for_device, read_mount_table};
use crate::util::command::{CommandSpec, Runner};

/// Force-unmounts everything mounted from `device`. Failures are logged and
/// otherwise ignored; a blank device usually has nothing mounted.
pub fn force_unmount_device(runner: &dyn Runner, mount_table: &Path, device: &Path) {
    let contents = match read_mount_table(mount_table) {
        Ok(contents) => contents,
        Err(err) => {
            tracing::warn!("skip unmount of {}: {}", device.display(), err);
            return;
        }
    };
    for mountpoint in mounts_for_device(&contents, device) {
        let spec = CommandSpec::action(
            "umount",
            ["-f".to_string(), mountpoint.to_string_lossy().to_string()],
        );
        match runner.run(&spec) {
            Ok(output) if output.success() => {
                tracing::info!("unmounted {}", mountpoint.display());
            }
            Ok(output) => tracing::warn!(
                "umount {} failed with exit code {}; continuing",
                mountpoint.display(),
                output.code
            ),
            Err(err) => tracing::warn!("umount {}: {}; continuing", mountpoint.display(), err),
        }
    }
}
