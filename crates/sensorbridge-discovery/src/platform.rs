//! Bus enumeration and firmware lookups consumed by the bridge

use sensorbridge_core::{BusDevice, BusType, FirmwareDevice, FirmwareObject, HardwareId};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PlatformError {
    #[error("Firmware device {0} is already described")]
    DuplicatePath(String),
    #[error("No firmware device at {0}")]
    UnknownPath(String),
}

/// Firmware device catalog and bus lookup
pub trait DeviceCatalog {
    /// First present firmware device with the given hardware id
    fn find_first_match(&self, hid: &HardwareId) -> Option<Arc<FirmwareDevice>>;

    /// Bus device enumerated from `device`, if the bus has seen it yet
    fn find_bus_device(&self, bus: BusType, device: &FirmwareDevice) -> Option<Arc<BusDevice>>;
}

/// Named firmware object evaluation
pub trait FirmwareStore {
    fn evaluate(&self, device: &FirmwareDevice, name: &str) -> Option<FirmwareObject>;
}

/// In-memory platform description
#[derive(Debug, Default)]
pub struct MemoryPlatform {
    /// Firmware devices in namespace order
    devices: Vec<Arc<FirmwareDevice>>,
    /// Firmware path -> enumerated bus device
    bus_devices: HashMap<String, Arc<BusDevice>>,
    /// (firmware path, object name) -> object
    objects: HashMap<(String, String), FirmwareObject>,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Describe a firmware device
    pub fn add_device(&mut self, device: FirmwareDevice) -> Result<Arc<FirmwareDevice>, PlatformError> {
        if self.devices.iter().any(|d| d.path == device.path) {
            return Err(PlatformError::DuplicatePath(device.path));
        }
        let device = Arc::new(device);
        self.devices.push(Arc::clone(&device));
        Ok(device)
    }

    /// Enumerate a bus device for the firmware device at `path`
    pub fn enumerate(&mut self, path: &str, name: &str, bus: BusType) -> Result<Arc<BusDevice>, PlatformError> {
        if !self.devices.iter().any(|d| d.path == path) {
            return Err(PlatformError::UnknownPath(path.to_string()));
        }
        let device = Arc::new(BusDevice::new(name, bus, Some(path)));
        self.bus_devices.insert(path.to_string(), Arc::clone(&device));
        Ok(device)
    }

    /// Attach a named object to the firmware device at `path`
    pub fn set_object(&mut self, path: &str, name: &str, object: FirmwareObject) -> Result<(), PlatformError> {
        if !self.devices.iter().any(|d| d.path == path) {
            return Err(PlatformError::UnknownPath(path.to_string()));
        }
        self.objects.insert((path.to_string(), name.to_string()), object);
        Ok(())
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}

impl DeviceCatalog for MemoryPlatform {
    fn find_first_match(&self, hid: &HardwareId) -> Option<Arc<FirmwareDevice>> {
        self.devices
            .iter()
            .find(|d| d.present && d.hid == hid.as_str())
            .cloned()
    }

    fn find_bus_device(&self, bus: BusType, device: &FirmwareDevice) -> Option<Arc<BusDevice>> {
        self.bus_devices
            .get(&device.path)
            .filter(|d| d.bus == bus)
            .cloned()
    }
}

impl FirmwareStore for MemoryPlatform {
    fn evaluate(&self, device: &FirmwareDevice, name: &str) -> Option<FirmwareObject> {
        self.objects
            .get(&(device.path.clone(), name.to_string()))
            .cloned()
    }
}
