use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::model::{Config, RuntimeConfig};
use crate::error::{ConfigError, Result, VaultError};
use crate::mount::inspect::DEFAULT_MOUNT_TABLE;
use crate::pool::DEFAULT_DATASET;
use crate::types::{HealthPolicy, SamplePolicy, Serial};
use crate::util::paths::is_safe_name;
use crate::verify::sample::DEFAULT_SAMPLE_SIZE;

const DEFAULT_SCRATCH_BASE: &str = "/var/tmp/coldvault";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
const DEFAULT_BACKUP_WAIT_LIMIT_SECS: u64 = 7 * 24 * 60 * 60;

/// Loads and validates the config. `serial` replaces the configured serial.
pub fn load_config(path: &Path, serial: Option<&str>) -> Result<RuntimeConfig> {
    let mut contents = String::new();
    File::open(path)
        .map_err(|e| VaultError::message(format!("open config {}: {}", path.display(), e)))?
        .read_to_string(&mut contents)
        .map_err(VaultError::Io)?;
    let mut cfg: Config =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
    if let Some(serial) = serial {
        cfg.serial = Some(serial.to_string());
    }
    parse_runtime(cfg)
}

fn parse_runtime(cfg: Config) -> Result<RuntimeConfig> {
    let serial: Serial = cfg
        .serial
        .as_deref()
        .ok_or_else(|| ConfigError::Invalid("serial is required".to_string()))?
        .parse()
        .map_err(ConfigError::Invalid)?;
    let credential_file = cfg
        .credential_file
        .ok_or_else(|| ConfigError::Invalid("credentialFile is required".to_string()))?;
    let source = cfg
        .source
        .ok_or_else(|| ConfigError::Invalid("source is required".to_string()))?;
    if !source.is_absolute() {
        return Err(ConfigError::Invalid(format!(
            "source {} must be an absolute path",
            source.display()
        ))
        .into());
    }
    let dataset = cfg.dataset.unwrap_or_else(|| DEFAULT_DATASET.to_string());
    if !is_safe_name(&dataset) {
        return Err(ConfigError::Invalid(format!(
            "dataset {} must use only letters, digits, '.', '-', '_'",
            dataset
        ))
        .into());
    }
    let health_policy = match cfg.health_policy {
        Some(value) => HealthPolicy::parse(&value).map_err(ConfigError::Invalid)?,
        None => HealthPolicy::default(),
    };
    let sample_policy = match cfg.sample_policy {
        Some(value) => SamplePolicy::parse(&value).map_err(ConfigError::Invalid)?,
        None => SamplePolicy::default(),
    };
    let sample_size = cfg.sample_size.unwrap_or(DEFAULT_SAMPLE_SIZE);
    if sample_size == 0 {
        return Err(ConfigError::Invalid("sampleSize must be at least 1".to_string()).into());
    }

    Ok(RuntimeConfig {
        serial,
        credential_file,
        source,
        excludes: cfg.excludes,
        dataset,
        health_policy,
        sample_policy,
        sample_size,
        scratch_base: cfg
            .scratch_base
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SCRATCH_BASE)),
        poll_interval: Duration::from_secs(
            cfg.poll_interval_secs.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
        ),
        backup_wait_limit: Duration::from_secs(
            cfg.backup_wait_limit_secs
                .unwrap_or(DEFAULT_BACKUP_WAIT_LIMIT_SECS),
        ),
        mount_table: cfg
            .mount_table
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MOUNT_TABLE)),
    })
}
