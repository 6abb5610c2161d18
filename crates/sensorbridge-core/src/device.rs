//! Hardware identifiers and device handles handed out by the platform

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Longest hardware id accepted, matching the ACPI id buffer minus its terminator
pub const MAX_HID_LEN: usize = 15;

/// Hardware identifier used to look up the firmware device catalog (e.g. "INT33BE")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HardwareId(String);

impl HardwareId {
    /// Validate and wrap a hardware id string
    pub fn new(hid: &str) -> Result<Self> {
        if hid.is_empty() {
            return Err(BridgeError::InvalidArgument("empty hardware id".to_string()));
        }
        if hid.len() > MAX_HID_LEN || !hid.is_ascii() {
            return Err(BridgeError::InvalidArgument(format!(
                "hardware id {hid:?} is not a short ASCII id"
            )));
        }
        Ok(Self(hid.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HardwareId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bus a device enumerates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusType {
    I2c,
    Pci,
    Platform,
}

/// A device described by firmware tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareDevice {
    /// Hardware id (_HID)
    pub hid: String,
    /// Unique instance id (_UID)
    pub uid: Option<String>,
    /// Namespace path, e.g. `\_SB_.PCI0.I2C2.CAM0`
    pub path: String,
    /// Whether firmware reports the device as present and enabled
    pub present: bool,
}

impl FirmwareDevice {
    pub fn new(hid: &str, path: &str) -> Self {
        Self {
            hid: hid.to_string(),
            uid: None,
            path: path.to_string(),
            present: true,
        }
    }
}

/// A device instance enumerated on a bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusDevice {
    /// Bus device name, e.g. `i2c-INT33BE:00`
    pub name: String,
    pub bus: BusType,
    /// Path of the firmware node this device was enumerated from
    pub firmware_path: Option<String>,
}

impl BusDevice {
    pub fn new(name: &str, bus: BusType, firmware_path: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            bus,
            firmware_path: firmware_path.map(str::to_string),
        }
    }
}

/// Result of evaluating a named firmware object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirmwareObject {
    Buffer(Vec<u8>),
    Integer(u64),
    String(String),
}

impl FirmwareObject {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Buffer(_) => "buffer",
            Self::Integer(_) => "integer",
            Self::String(_) => "string",
        }
    }
}
