//! Best-effort hardware identity used to bind the KEK to this machine.
//!
//! Lookups never fail: anything unexpected falls back to [`FALLBACK_DEVICE_ID`].

use std::process::{Command, Stdio};
use tracing::debug;

pub const FALLBACK_DEVICE_ID: &str = "lbx-7Qf:2m!Xv9#pR4";

pub trait DeviceIdSource: Send + Sync {
    /// Always non-empty.
    fn device_id(&self) -> String;
}

/// Motherboard/hardware serial number read through OS tooling.
#[derive(Debug, Default, Clone, Copy)]
pub struct HardwareDeviceId;

impl DeviceIdSource for HardwareDeviceId {
    fn device_id(&self) -> String {
        match lookup_serial() {
            Some(serial) => serial,
            None => {
                debug!("hardware serial unavailable, using fallback device id");
                FALLBACK_DEVICE_ID.to_string()
            }
        }
    }
}

/// A caller-supplied identifier.
#[derive(Debug, Clone)]
pub struct FixedDeviceId(String);

impl FixedDeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl DeviceIdSource for FixedDeviceId {
    fn device_id(&self) -> String {
        if self.0.is_empty() {
            FALLBACK_DEVICE_ID.to_string()
        } else {
            self.0.clone()
        }
    }
}

fn lookup_serial() -> Option<String> {
    let serial = if cfg!(windows) {
        windows_serial()
    } else if cfg!(target_os = "macos") {
        macos_serial()
    } else if cfg!(target_os = "linux") {
        linux_serial()
    } else {
        None
    };
    serial.filter(|s| !s.is_empty())
}

fn run(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(|e| debug!(program = %program, "device id lookup failed: {e}"))
        .ok()?;
    if !output.status.success() {
        debug!(program = %program, status = ?output.status, "device id lookup exited unsuccessfully");
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn windows_serial() -> Option<String> {
    let output = run("wmic", &["baseboard", "get", "serialnumber"])?;
    parse_wmic(&output)
}

fn linux_serial() -> Option<String> {
    if let Ok(contents) = std::fs::read_to_string("/sys/class/dmi/id/board_serial") {
        let serial = contents.trim();
        if !serial.is_empty() {
            return Some(serial.to_string());
        }
    }
    let output = run("dmidecode", &["-s", "baseboard-serial-number"])?;
    Some(output.trim().to_string())
}

fn macos_serial() -> Option<String> {
    let output = run("system_profiler", &["SPHardwareDataType"])?;
    parse_system_profiler(&output)
}

fn parse_wmic(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.contains("SerialNumber"))
        .map(str::to_string)
}

fn parse_system_profiler(output: &str) -> Option<String> {
    output
        .lines()
        .find(|line| line.contains("Serial Number"))
        .and_then(|line| line.split_once(':'))
        .map(|(_, value)| value.trim().to_string())
        .filter(|s| !s.is_empty())
}
