use std::path::Path;

use crate::error::{Result, VaultError};
use crate::types::HealthPolicy;
use crate::util::command::{CommandOutput, CommandSpec, Runner};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub predicate_passed: bool,
    pub error_lines: Vec<String>,
}

impl HealthReport {
    pub fn healthy(&self) -> bool {
        self.predicate_passed && self.error_lines.is_empty()
    }

    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.predicate_passed {
            parts.push("overall health check did not pass".to_string());
        }
        if !self.error_lines.is_empty() {
            parts.push(format!("{} error log line(s)", self.error_lines.len()));
        }
        parts.join(", ")
    }
}

/// `smartctl -H` passes only on exit code 0 with a PASSED or OK verdict.
pub fn predicate_passed(output: &CommandOutput) -> bool {
    output.success()
        && output.stdout.lines().any(|line| {
            let line = line.trim();
            (line.starts_with("SMART overall-health") && line.ends_with("PASSED"))
                || line == "SMART Health Status: OK"
        })
}

/// Lines of `smartctl -l error` output that describe a logged error.
pub fn error_lines(report: &str) -> Vec<String> {
    report
        .lines()
        .map(str::trim)
        .filter(|line| is_error_line(line))
        .map(|line| line.to_string())
        .collect()
}

fn is_error_line(line: &str) -> bool {
    if let Some(rest) = line.strip_prefix("Error ") {
        return rest.starts_with(|c: char| c.is_ascii_digit());
    }
    if let Some((_, count)) = line.split_once("Error Count:") {
        return count.trim().parse::<u64>().map(|n| n > 0).unwrap_or(false);
    }
    false
}

/// Runs both diagnostics. Tool failures count as a bad signal, never as an
/// error of the run.
pub fn audit(runner: &dyn Runner, device: &Path) -> HealthReport {
    let device_arg = device.to_string_lossy().to_string();
    let verdict = CommandSpec::query("smartctl", ["-H".to_string(), device_arg.clone()]);
    let predicate = match runner.run(&verdict) {
        Ok(output) => predicate_passed(&output),
        Err(err) => {
            tracing::warn!("smartctl -H {}: {}", device.display(), err);
            false
        }
    };
    let error_log = CommandSpec::query(
        "smartctl",
        ["-l".to_string(), "error".to_string(), device_arg],
    );
    let errors = match runner.run(&error_log) {
        Ok(output) => error_lines(&output.stdout),
        Err(err) => {
            tracing::warn!("smartctl -l error {}: {}", device.display(), err);
            Vec::new()
        }
    };
    HealthReport {
        predicate_passed: predicate,
        error_lines: errors,
    }
}

/// Logs the report and applies `policy`. Only [`HealthPolicy::Block`] can
/// stop the run.
pub fn enforce(report: &HealthReport, device: &Path, policy: HealthPolicy) -> Result<()> {
    if report.healthy() {
        tracing::info!("disk {} reports healthy", device.display());
        return Ok(());
    }
    tracing::warn!("disk {} may be failing: {}", device.display(), report.summary());
    for line in &report.error_lines {
        tracing::warn!("  {}", line);
    }
    match policy {
        HealthPolicy::Warn => Ok(()),
        HealthPolicy::Block => Err(VaultError::Health(report.summary())),
    }
}
