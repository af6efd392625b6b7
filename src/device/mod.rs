pub mod confirm;

use std::path::{Path, PathBuf};

use crate::device::confirm::Confirm;
use crate::error::{DeviceError, Result};
use crate::types::Serial;
use crate::util::command::{run_checked, CommandSpec, Runner};

/// A confirmed block device. Re-derived from the serial on every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    pub serial: Serial,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDevice {
    pub path: PathBuf,
    pub serial: Option<String>,
}

pub fn list_block_devices(runner: &dyn Runner) -> Result<Vec<BlockDevice>> {
    let spec = CommandSpec::query("lsblk", ["-d", "-n", "-p", "-r", "-o", "NAME,SERIAL"]);
    let output = run_checked(runner, &spec)?;
    Ok(parse_serial_table(&output.stdout))
}

/// Parses `lsblk -dnpr -o NAME,SERIAL` output.
pub fn parse_serial_table(stdout: &str) -> Vec<BlockDevice> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let name = fields.next()?;
            let serial = fields.next().map(unescape_raw);
            Some(BlockDevice {
                path: PathBuf::from(unescape_raw(name)),
                serial,
            })
        })
        .collect()
}

fn unescape_raw(value: &str) -> String {
    value.replace("\\x20", " ")
}

pub fn find_by_serial(devices: &[BlockDevice], serial: &Serial) -> Result<PathBuf> {
    let matches: Vec<&BlockDevice> = devices
        .iter()
        .filter(|dev| dev.serial.as_deref() == Some(serial.as_str()))
        .collect();
    match matches.as_slice() {
        [] => Err(DeviceError::NotFound(serial.to_string()).into()),
        [only] => Ok(only.path.clone()),
        many => Err(DeviceError::Ambiguous(
            serial.to_string(),
            many.iter()
                .map(|dev| dev.path.display().to_string())
                .collect(),
        )
        .into()),
    }
}

/// Device table row plus udev properties, for the operator to inspect.
pub fn describe(runner: &dyn Runner, device: &Path) -> Result<String> {
    let device_arg = device.to_string_lossy().to_string();
    let table = run_checked(
        runner,
        &CommandSpec::query(
            "lsblk",
            [
                "-o".to_string(),
                "NAME,SIZE,TYPE,MODEL,SERIAL,MOUNTPOINT".to_string(),
                device_arg.clone(),
            ],
        ),
    )?;
    let properties = run_checked(
        runner,
        &CommandSpec::query(
            "udevadm",
            [
                "info".to_string(),
                "--query=property".to_string(),
                format!("--name={}", device_arg),
            ],
        ),
    )?;
    Ok(format!(
        "{}\n{}",
        table.stdout.trim_end(),
        properties.stdout.trim_end()
    ))
}

/// Finds the device carrying `serial` and asks the operator to confirm it.
pub fn resolve(
    runner: &dyn Runner,
    confirm: &dyn Confirm,
    serial: &Serial,
) -> Result<DeviceHandle> {
    let devices = list_block_devices(runner)?;
    let path = find_by_serial(&devices, serial)?;
    let details = describe(runner, &path)?;
    println!("{}", details);
    let prompt = format!("Use {} (serial {}) for backup?", path.display(), serial);
    if !confirm.confirm(&prompt)? {
        return Err(DeviceError::Declined.into());
    }
    tracing::info!("using device {} for serial {}", path.display(), serial);
    Ok(DeviceHandle {
        serial: serial.clone(),
        path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VaultError;
    use crate::testing::{ok, FakeRunner, FixedConfirm};

    const TABLE: &str = "/dev/sda WD-1111\n/dev/sdb ABC123\n/dev/loop0\n";

    fn serial(value: &str) -> Serial {
        value.parse().expect("serial")
    }

    fn table_runner(table: &'static str) -> FakeRunner {
        FakeRunner::new(move |spec| {
            if spec.program == "lsblk" && spec.args.contains(&"NAME,SERIAL".to_string()) {
                ok(table)
            } else {
                ok("details")
            }
        })
    }

    #[test]
    fn parse_serial_table_handles_missing_serials() {
        let devices = parse_serial_table(TABLE);
        assert_eq!(devices.len(), 3);
        assert_eq!(devices[1].serial.as_deref(), Some("ABC123"));
        assert_eq!(devices[2].serial, None);
    }

    #[test]
    fn resolve_returns_confirmed_device() {
        let runner = table_runner(TABLE);
        let confirm = FixedConfirm::new(true);
        let handle = resolve(&runner, &confirm, &serial("ABC123")).expect("resolve");
        assert_eq!(handle.path, PathBuf::from("/dev/sdb"));
        assert_eq!(confirm.asked(), 1);
    }

    #[test]
    fn resolve_fails_when_serial_absent() {
        let runner = table_runner(TABLE);
        let confirm = FixedConfirm::new(true);
        let err = resolve(&runner, &confirm, &serial("ZZZ")).unwrap_err();
        assert!(matches!(err, VaultError::Device(DeviceError::NotFound(_))));
        assert_eq!(err.to_string(), "no device found for serial ZZZ");
        assert_eq!(confirm.asked(), 0);
    }

    #[test]
    fn resolve_rejects_ambiguous_serial() {
        let runner = table_runner("/dev/sdb ABC123\n/dev/sdc ABC123\n");
        let confirm = FixedConfirm::new(true);
        let err = resolve(&runner, &confirm, &serial("ABC123")).unwrap_err();
        assert!(matches!(err, VaultError::Device(DeviceError::Ambiguous(_, _))));
        assert_eq!(confirm.asked(), 0);
    }

    #[test]
    fn declined_confirmation_runs_nothing_afterwards() {
        let runner = table_runner(TABLE);
        let confirm = FixedConfirm::new(false);
        let err = resolve(&runner, &confirm, &serial("ABC123")).unwrap_err();
        assert!(matches!(err, VaultError::Device(DeviceError::Declined)));
        assert_eq!(
            runner.calls(),
            vec![
                "lsblk -d -n -p -r -o NAME,SERIAL",
                "lsblk -o NAME,SIZE,TYPE,MODEL,SERIAL,MOUNTPOINT /dev/sdb",
                "udevadm info --query=property --name=/dev/sdb",
            ]
        );
    }
}
