use std::io;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("{0}")]
    Message(String),
    #[error("precondition failed: {0}")]
    Precondition(String),
    #[error("{0}")]
    Device(DeviceError),
    #[error("{0}")]
    Config(ConfigError),
    #[error("{} failed with exit code {}{}", .command, .code, stderr_suffix(.stderr))]
    Command {
        command: String,
        code: i32,
        stderr: String,
    },
    #[error("disk health check failed: {0}")]
    Health(String),
    #[error("{0}")]
    Backup(BackupError),
    #[error("{0}")]
    Verify(VerifyError),
    #[error("{0}")]
    Eject(EjectError),
    #[error("illegal pipeline transition from {from} to {to}")]
    Transition { from: String, to: String },
    #[error("{0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parse config: {0}")]
    Parse(String),
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no device found for serial {0}")]
    NotFound(String),
    #[error("multiple devices found for serial {}: {}", .0, .1.join(", "))]
    Ambiguous(String, Vec<String>),
    #[error("device not confirmed; aborting")]
    Declined,
}

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("backup failed with exit code {0}")]
    Failed(i32),
    #[error("backup did not finish within {0:?}")]
    TimedOut(Duration),
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("no eligible file found in backup sample")]
    NoEligibleFile,
    #[error("restored file missing: {0}")]
    RestoredMissing(String),
    #[error("checksum mismatch for {path}: source {expected}, restored {actual}")]
    Mismatch {
        path: String,
        expected: String,
        actual: String,
    },
}

#[derive(Debug, Error)]
pub enum EjectError {
    #[error("pool still mounted after export: {0}")]
    ResidualMount(String),
}

pub type Result<T> = std::result::Result<T, VaultError>;

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}

impl VaultError {
    pub fn message(msg: impl Into<String>) -> Self {
        VaultError::Message(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        VaultError::Precondition(msg.into())
    }
}

impl From<DeviceError> for VaultError {
    fn from(err: DeviceError) -> Self {
        VaultError::Device(err)
    }
}

impl From<ConfigError> for VaultError {
    fn from(err: ConfigError) -> Self {
        VaultError::Config(err)
    }
}

impl From<BackupError> for VaultError {
    fn from(err: BackupError) -> Self {
        VaultError::Backup(err)
    }
}

impl From<VerifyError> for VaultError {
    fn from(err: VerifyError) -> Self {
        VaultError::Verify(err)
    }
}

impl From<EjectError> for VaultError {
    fn from(err: EjectError) -> Self {
        VaultError::Eject(err)
    }
}
