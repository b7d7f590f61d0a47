//! Serial port handling
//!
//! Enumerates USB serial bridges and opens the one carrying a given serial number.

use serde::{Deserialize, Serialize};
use serialport::{SerialPort, SerialPortInfo, SerialPortType};

use super::{ChannelConfig, FTDI_VID};
use crate::error::{AtlasError, Result};

/// Information about an attached USB serial device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub port_name: String,

    /// USB vendor ID
    pub vid: u16,

    /// USB product ID
    pub pid: u16,

    /// USB serial number, used as the device identifier
    pub serial_number: Option<String>,

    /// Manufacturer name (if available)
    pub manufacturer: Option<String>,

    /// Product name (if available)
    pub product: Option<String>,
}

impl DeviceInfo {
    /// Build from an OS port entry; non-USB ports yield `None`
    pub fn from_port_info(info: SerialPortInfo) -> Option<Self> {
        match info.port_type {
            SerialPortType::UsbPort(usb) => Some(Self {
                port_name: info.port_name,
                vid: usb.vid,
                pid: usb.pid,
                serial_number: usb.serial_number,
                manufacturer: usb.manufacturer,
                product: usb.product,
            }),
            _ => None,
        }
    }

    /// Whether this device sits behind an FTDI bridge
    pub fn is_ftdi(&self) -> bool {
        self.vid == FTDI_VID
    }

    /// Whether this device answers to the given identifier
    pub fn matches(&self, device_id: &str) -> bool {
        self.serial_number.as_deref() == Some(device_id)
    }
}

/// Ordering for device listings:
///  - FTDI bridges first
///  - then by serial number (devices without one last)
///  - then by port name
fn device_sort_key(dev: &DeviceInfo) -> (u8, u8, String, String) {
    let vendor_rank = if dev.is_ftdi() { 0 } else { 1 };
    let (serial_rank, serial) = match &dev.serial_number {
        Some(s) => (0, s.clone()),
        None => (1, String::new()),
    };
    (vendor_rank, serial_rank, serial, dev.port_name.clone())
}

/// Sort and de-duplicate a device list in place
pub(crate) fn normalize_devices(devices: &mut Vec<DeviceInfo>) {
    devices.sort_by_key(device_sort_key);
    devices.dedup_by(|a, b| a.port_name == b.port_name);
}

/// List attached USB serial devices in deterministic order
pub fn list_devices() -> Vec<DeviceInfo> {
    let ports = match serialport::available_ports() {
        Ok(ports) => ports,
        Err(e) => {
            tracing::warn!("Failed to enumerate serial ports: {}", e);
            Vec::new()
        }
    };

    let mut devices: Vec<DeviceInfo> = ports
        .into_iter()
        .filter_map(DeviceInfo::from_port_info)
        .collect();
    normalize_devices(&mut devices);
    devices
}

/// Identifiers (USB serial numbers) of attached devices
pub fn device_ids() -> Vec<String> {
    list_devices()
        .into_iter()
        .filter_map(|d| d.serial_number)
        .collect()
}

/// Find the attached device carrying `device_id`
pub fn find_device(device_id: &str) -> Result<DeviceInfo> {
    list_devices()
        .into_iter()
        .find(|d| d.matches(device_id))
        .ok_or_else(|| AtlasError::DeviceNotFound(device_id.to_string()))
}

/// Open a device's port with 8N1, no flow control
pub fn open_port(device: &DeviceInfo, config: &ChannelConfig) -> Result<Box<dyn SerialPort>> {
    serialport::new(&device.port_name, config.baud_rate)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .flow_control(serialport::FlowControl::None)
        .timeout(config.port_timeout)
        .open()
        .map_err(|e| AtlasError::Connection(format!("{}: {}", device.port_name, e)))
}
