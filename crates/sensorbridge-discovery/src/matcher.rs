//! Catalog matching of known sensor hardware ids

use sensorbridge_core::{BridgeError, BusDevice, BusType, FirmwareDevice, HardwareId, Result};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::platform::DeviceCatalog;

/// A candidate present in firmware and enumerated on its bus.
///
/// Holds a reference to both devices; dropping the match releases them.
#[derive(Debug)]
pub struct Match {
    pub hid: HardwareId,
    pub firmware: Arc<FirmwareDevice>,
    pub device: Arc<BusDevice>,
}

/// Look up one candidate.
///
/// `Ok(None)` when firmware does not describe the device. A firmware device
/// without an I2C bus device is `NotReady`, since buses enumerate
/// asynchronously.
pub fn match_candidate<C: DeviceCatalog + ?Sized>(catalog: &C, hid: &HardwareId) -> Result<Option<Match>> {
    let Some(firmware) = catalog.find_first_match(hid) else {
        trace!(hid = %hid, "No firmware device");
        return Ok(None);
    };

    let Some(device) = catalog.find_bus_device(BusType::I2c, &firmware) else {
        debug!(hid = %hid, path = %firmware.path, "Firmware device has no I2C device yet");
        return Err(BridgeError::NotReady(format!("i2c device for {}", firmware.path)));
    };

    Ok(Some(Match {
        hid: hid.clone(),
        firmware,
        device,
    }))
}
