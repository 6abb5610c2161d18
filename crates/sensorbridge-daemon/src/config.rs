//! Configuration loading and platform description

use anyhow::{Context, Result};
use sensorbridge_core::{BusDevice, BusType, DescriptorBlock, FirmwareDevice, FirmwareObject};
use sensorbridge_discovery::{BridgeConfig, MemoryPlatform};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// PCI device id of the CSI-2 receiver the bridge was written for
pub const CIO2_PCI_ID: u16 = 0x9d32;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default, rename = "device")]
    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Discovery passes before giving up on a deferred build
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// Delay between deferred passes in milliseconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

fn default_attempts() -> u32 {
    5
}

fn default_retry_delay() -> u64 {
    500
}

/// The imaging controller the sensors are connected to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// PCI device name
    #[serde(default = "default_controller_name")]
    pub name: String,
    #[serde(default = "default_pci_id")]
    pub pci_id: u16,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            name: default_controller_name(),
            pci_id: default_pci_id(),
        }
    }
}

fn default_controller_name() -> String {
    "0000:00:14.3".to_string()
}

fn default_pci_id() -> u16 {
    CIO2_PCI_ID
}

/// A firmware-described device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Hardware id
    pub hid: String,
    #[serde(default)]
    pub uid: Option<String>,
    /// Firmware namespace path
    pub path: String,
    #[serde(default = "default_true")]
    pub present: bool,
    /// I2C device name; the device never enumerates when absent
    #[serde(default)]
    pub bus_device: Option<String>,
    /// Build attempt on which the I2C device shows up
    #[serde(default = "default_enumerate_on")]
    pub enumerate_on_attempt: u32,
    /// Descriptor given field by field
    #[serde(default)]
    pub ssdb: Option<SsdbConfig>,
    /// Descriptor given as raw hex, takes precedence over `ssdb`
    #[serde(default)]
    pub ssdb_hex: Option<String>,
    /// Descriptor object of the wrong type
    #[serde(default)]
    pub ssdb_integer: Option<u64>,
}

fn default_true() -> bool {
    true
}

fn default_enumerate_on() -> u32 {
    1
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SsdbConfig {
    #[serde(default)]
    pub version: u8,
    #[serde(default)]
    pub sku: u8,
    pub link: u8,
    pub lanes: u8,
    #[serde(default)]
    pub degree: u8,
    pub mclkspeed: u32,
}

impl SsdbConfig {
    pub fn to_block(&self) -> DescriptorBlock {
        DescriptorBlock {
            version: self.version,
            sku: self.sku,
            link: self.link,
            lanes: self.lanes,
            degree: self.degree,
            mclkspeed: self.mclkspeed,
            ..Default::default()
        }
    }
}

impl DeviceConfig {
    /// Descriptor object this device exposes, if any
    pub fn descriptor_object(&self) -> Result<Option<FirmwareObject>> {
        if let Some(ref raw) = self.ssdb_hex {
            let bytes = hex::decode(raw.trim())
                .with_context(|| format!("invalid ssdb_hex for {}", self.path))?;
            return Ok(Some(FirmwareObject::Buffer(bytes)));
        }
        if let Some(ref ssdb) = self.ssdb {
            return Ok(Some(FirmwareObject::Buffer(ssdb.to_block().encode().to_vec())));
        }
        Ok(self.ssdb_integer.map(FirmwareObject::Integer))
    }
}

impl Config {
    /// Controller bus device
    pub fn controller_device(&self) -> Arc<BusDevice> {
        Arc::new(BusDevice::new(&self.controller.name, BusType::Pci, None))
    }

    /// Platform as seen on the given build attempt (1-based)
    pub fn build_platform(&self, attempt: u32) -> Result<MemoryPlatform> {
        let mut platform = MemoryPlatform::new();

        for device in &self.devices {
            let mut fw = FirmwareDevice::new(&device.hid, &device.path);
            fw.uid = device.uid.clone();
            fw.present = device.present;
            platform.add_device(fw)?;

            if let Some(object) = device.descriptor_object()? {
                platform.set_object(&device.path, &self.bridge.descriptor, object)?;
            }

            match device.bus_device {
                Some(ref name) if attempt >= device.enumerate_on_attempt => {
                    platform.enumerate(&device.path, name, BusType::I2c)?;
                }
                Some(ref name) => {
                    debug!(device = %name, attempt, "I2C device not enumerated yet");
                }
                None => {}
            }
        }

        Ok(platform)
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

/// Sample configuration with one sensor present at boot and one that
/// enumerates late
pub fn default_sample() -> Config {
    Config {
        devices: vec![
            DeviceConfig {
                hid: "INT33BE".to_string(),
                uid: Some("0".to_string()),
                path: "\\_SB_.PCI0.LNK1".to_string(),
                present: true,
                bus_device: Some("i2c-INT33BE:00".to_string()),
                enumerate_on_attempt: 1,
                ssdb: Some(SsdbConfig {
                    link: 1,
                    lanes: 2,
                    degree: 90,
                    mclkspeed: 19_200_000,
                    ..Default::default()
                }),
                ssdb_hex: None,
                ssdb_integer: None,
            },
            DeviceConfig {
                hid: "OVTI2680".to_string(),
                uid: Some("0".to_string()),
                path: "\\_SB_.PCI0.LNK2".to_string(),
                present: true,
                bus_device: Some("i2c-OVTI2680:00".to_string()),
                enumerate_on_attempt: 2,
                ssdb: Some(SsdbConfig {
                    link: 2,
                    lanes: 1,
                    degree: 0,
                    mclkspeed: 19_200_000,
                    ..Default::default()
                }),
                ssdb_hex: None,
                ssdb_integer: None,
            },
        ],
        ..Config::default()
    }
}

/// Save the sample configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(&default_sample())?;
    std::fs::write(path, content)?;
    Ok(())
}
