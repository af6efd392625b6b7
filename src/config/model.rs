use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backup::WaitPolicy;
use crate::pool::PoolIdentity;
use crate::types::{HealthPolicy, SamplePolicy, Serial};
use crate::verify::VerifySettings;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(default, rename = "credentialFile", skip_serializing_if = "Option::is_none")]
    pub credential_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    #[serde(default)]
    pub excludes: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,
    #[serde(default, rename = "healthPolicy", skip_serializing_if = "Option::is_none")]
    pub health_policy: Option<String>,
    #[serde(default, rename = "samplePolicy", skip_serializing_if = "Option::is_none")]
    pub sample_policy: Option<String>,
    #[serde(default, rename = "sampleSize", skip_serializing_if = "Option::is_none")]
    pub sample_size: Option<usize>,
    #[serde(default, rename = "scratchBase", skip_serializing_if = "Option::is_none")]
    pub scratch_base: Option<PathBuf>,
    #[serde(default, rename = "pollIntervalSecs", skip_serializing_if = "Option::is_none")]
    pub poll_interval_secs: Option<u64>,
    #[serde(default, rename = "backupWaitLimitSecs", skip_serializing_if = "Option::is_none")]
    pub backup_wait_limit_secs: Option<u64>,
    #[serde(default, rename = "mountTable", skip_serializing_if = "Option::is_none")]
    pub mount_table: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub serial: Serial,
    pub credential_file: PathBuf,
    pub source: PathBuf,
    pub excludes: Vec<PathBuf>,
    pub dataset: String,
    pub health_policy: HealthPolicy,
    pub sample_policy: SamplePolicy,
    pub sample_size: usize,
    pub scratch_base: PathBuf,
    pub poll_interval: Duration,
    pub backup_wait_limit: Duration,
    pub mount_table: PathBuf,
}

impl RuntimeConfig {
    pub fn identity(&self) -> PoolIdentity {
        PoolIdentity::derive(&self.serial, &self.dataset)
    }

    pub fn verify_settings(&self) -> VerifySettings {
        VerifySettings {
            scratch_base: self.scratch_base.clone(),
            sample_size: self.sample_size,
            policy: self.sample_policy,
        }
    }

    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy {
            interval: self.poll_interval,
            limit: self.backup_wait_limit,
        }
    }

    /// The effective settings in the file format, for display.
    pub fn to_config(&self) -> Config {
        Config {
            serial: Some(self.serial.to_string()),
            credential_file: Some(self.credential_file.clone()),
            source: Some(self.source.clone()),
            excludes: self.excludes.clone(),
            dataset: Some(self.dataset.clone()),
            health_policy: Some(self.health_policy.as_str().to_string()),
            sample_policy: Some(self.sample_policy.as_str().to_string()),
            sample_size: Some(self.sample_size),
            scratch_base: Some(self.scratch_base.clone()),
            poll_interval_secs: Some(self.poll_interval.as_secs()),
            backup_wait_limit_secs: Some(self.backup_wait_limit.as_secs()),
            mount_table: Some(self.mount_table.clone()),
        }
    }
}
