use std::path::Path;

use crate::cli::commands::load;
use crate::config::model::RuntimeConfig;
use crate::eject::SNAPSHOT_LABEL_FORMAT;
use crate::error::{Result, VaultError};

pub fn run_show(config_path: &Path, serial: Option<&str>) -> Result<()> {
    let cfg = load(config_path, serial)?;
    print!("{}", render(&cfg)?);
    Ok(())
}

fn render(cfg: &RuntimeConfig) -> Result<String> {
    let identity = cfg.identity();
    let settings = serde_yaml::to_string(&cfg.to_config())
        .map_err(|e| VaultError::message(format!("render config: {}", e)))?;
    Ok(format!(
        "pool: {}\ndataset: {}\nsnapshot label: {}\n---\n{}",
        identity.pool,
        identity.dataset_path(),
        SNAPSHOT_LABEL_FORMAT,
        settings
    ))
}
