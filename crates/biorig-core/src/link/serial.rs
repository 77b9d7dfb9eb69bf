//! Port discovery and setup
//!
//! The rig shows up as a USB CDC-ACM board, or behind a USB-serial bridge
//! on older builds.

use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortInfo, SerialPortType, StopBits};
use std::time::Duration;
use tracing::debug;

use super::LinkError;

/// A serial device visible to the OS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// OS device name, "COM4" or "/dev/ttyACM0"
    pub name: String,
    /// USB vendor ID
    pub vid: Option<u16>,
    /// USB product ID
    pub pid: Option<u16>,
    /// USB manufacturer string
    pub manufacturer: Option<String>,
    /// USB product string
    pub product: Option<String>,
    /// USB serial number
    pub serial_number: Option<String>,
}

impl PortInfo {
    /// A port known only by name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
            serial_number: None,
        }
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let mut port = PortInfo::named(info.port_name);
        if let SerialPortType::UsbPort(usb) = info.port_type {
            port.vid = Some(usb.vid);
            port.pid = Some(usb.pid);
            port.manufacturer = usb.manufacturer;
            port.product = usb.product;
            port.serial_number = usb.serial_number;
        }
        port
    }
}

/// Listing order: CDC-ACM boards, USB-serial bridges, COM ports, the rest.
/// Numbered names sort numerically within their group.
fn rank(name: &str) -> (u8, u32, &str) {
    let base = name.rsplit('/').next().unwrap_or(name);
    for (group, prefix) in [(0, "ttyACM"), (1, "ttyUSB"), (2, "COM")] {
        if let Some(n) = base.strip_prefix(prefix).and_then(|n| n.parse().ok()) {
            return (group, n, base);
        }
    }
    (3, 0, base)
}

/// Device nodes udev has created but not described yet
#[cfg(target_os = "linux")]
fn scan_dev() -> Vec<String> {
    let Ok(entries) = std::fs::read_dir("/dev") else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|n| n.starts_with("ttyACM") || n.starts_with("ttyUSB"))
        .map(|n| format!("/dev/{n}"))
        .collect()
}

/// Enumerate serial ports. Enumeration failures yield an empty list.
pub fn list_ports() -> Vec<PortInfo> {
    let mut ports: Vec<PortInfo> = match serialport::available_ports() {
        Ok(found) => found.into_iter().map(PortInfo::from).collect(),
        Err(e) => {
            debug!("port enumeration failed: {e}");
            Vec::new()
        }
    };

    #[cfg(target_os = "linux")]
    ports.extend(scan_dev().into_iter().map(PortInfo::named));

    // Stable sort keeps the described entry ahead of its bare /dev twin
    ports.sort_by(|a, b| rank(&a.name).cmp(&rank(&b.name)));
    ports.dedup_by(|later, earlier| later.name == earlier.name);
    ports
}

/// Open `name` at 8N1 without flow control
pub fn open_port(
    name: &str,
    baud_rate: u32,
    timeout: Duration,
) -> Result<Box<dyn SerialPort>, LinkError> {
    let port = serialport::new(name, baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(timeout)
        .open()?;
    Ok(port)
}
