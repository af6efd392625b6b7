pub mod operate;
pub mod recover;
pub mod run;
pub mod setup;
pub mod show;

use std::path::Path;

use chrono::Local;

use crate::config::load::load_config;
use crate::config::model::RuntimeConfig;
use crate::error::{BackupError, DeviceError, EjectError, Result, VaultError, VerifyError};

/// Process exit status for a failed command. Each failure class gets its own
/// code so wrappers can tell them apart.
pub fn exit_code(err: &VaultError) -> i32 {
    match err {
        VaultError::Precondition(_) | VaultError::Config(_) | VaultError::Message(_) => 2,
        VaultError::Device(DeviceError::NotFound(_)) => 10,
        VaultError::Device(DeviceError::Ambiguous(..)) => 11,
        VaultError::Device(DeviceError::Declined) => 12,
        VaultError::Health(_) => 20,
        VaultError::Backup(BackupError::Failed(_) | BackupError::TimedOut(_)) => 30,
        VaultError::Verify(VerifyError::NoEligibleFile) => 40,
        VaultError::Verify(VerifyError::RestoredMissing(_)) => 41,
        VaultError::Verify(VerifyError::Mismatch { .. }) => 42,
        VaultError::Eject(EjectError::ResidualMount(_)) => 50,
        VaultError::Command { .. } | VaultError::Transition { .. } | VaultError::Io(_) => 1,
    }
}

pub fn exit_for_error(err: &VaultError) -> ! {
    println!("{}", err);
    std::process::exit(exit_code(err));
}

fn load(config_path: &Path, serial: Option<&str>) -> Result<RuntimeConfig> {
    println!("{}", Local::now().format("%d-%m-%Y %H:%M"));
    let cfg = load_config(config_path, serial)?;
    tracing::debug!("loaded config {} for serial {}", config_path.display(), cfg.serial);
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use std::io;
    use std::time::Duration;

    #[test]
    fn failure_classes_have_distinct_exit_codes() {
        let cases = [
            (VaultError::precondition("credential file is empty"), 2),
            (ConfigError::Invalid("serial is required".to_string()).into(), 2),
            (DeviceError::NotFound("ABC123".to_string()).into(), 10),
            (
                DeviceError::Ambiguous("ABC123".to_string(), vec!["/dev/sdb".to_string()]).into(),
                11,
            ),
            (DeviceError::Declined.into(), 12),
            (VaultError::Health("SMART FAILED".to_string()), 20),
            (BackupError::Failed(3).into(), 30),
            (BackupError::TimedOut(Duration::from_secs(60)).into(), 30),
            (VerifyError::NoEligibleFile.into(), 40),
            (VerifyError::RestoredMissing("/data/a".to_string()).into(), 41),
            (
                VerifyError::Mismatch {
                    path: "/data/a".to_string(),
                    expected: "aa".to_string(),
                    actual: "bb".to_string(),
                }
                .into(),
                42,
            ),
            (EjectError::ResidualMount("zpool_ABC123".to_string()).into(), 50),
            (VaultError::Io(io::Error::new(io::ErrorKind::Other, "boom")), 1),
        ];
        for (err, code) in cases {
            assert_eq!(exit_code(&err), code, "{}", err);
        }
    }
}
