//! `SSDB` sensor descriptor decoding and projection into node properties
//!
//! The descriptor is a packed, little-endian block read verbatim from
//! firmware. Only four fields are consumed downstream: the CSI-2 link the
//! sensor is wired to, its lane count, the mount rotation and the external
//! clock frequency.

use serde::Serialize;

use crate::error::{BridgeError, Result};
use crate::node::NodeId;
use crate::property::{self, PropertyEntry};

/// Size of the packed descriptor block
pub const SSDB_LEN: usize = 108;

/// Shortest block that still carries every projected field (ends after `mclkspeed`)
pub const SSDB_MIN_LEN: usize = 90;

/// Port node names on the controller side, indexed by link id
pub const PORT_NAMES: [&str; 4] = ["port0", "port1", "port2", "port3"];

const OFF_VERSION: usize = 0;
const OFF_SKU: usize = 1;
const OFF_GUID: usize = 2;
const OFF_DEVFUNCTION: usize = 18;
const OFF_BUS: usize = 19;
const OFF_DPHYLINKENFUSES: usize = 20;
const OFF_CLOCKDIV: usize = 24;
const OFF_LINK: usize = 28;
const OFF_LANES: usize = 29;
const OFF_CSIPARAMS: usize = 30;
const OFF_MAXLANESPEED: usize = 70;
const OFF_CALIBFILEIDX: usize = 74;
const OFF_CALIBFILEIDX_MBZ: usize = 75;
const OFF_ROMTYPE: usize = 78;
const OFF_VCMTYPE: usize = 79;
const OFF_PLATFORMINFO: usize = 80;
const OFF_PLATFORMSUBINFO: usize = 81;
const OFF_FLASH: usize = 82;
const OFF_PRIVACYLED: usize = 83;
const OFF_DEGREE: usize = 84;
const OFF_MIPILINKDEFINED: usize = 85;
const OFF_MCLKSPEED: usize = 86;
const OFF_CONTROLLOGICID: usize = 90;
const OFF_RESERVED1: usize = 91;
const OFF_MCLKPORT: usize = 94;
const OFF_RESERVED2: usize = 95;

/// Sensor descriptor as laid out in the firmware buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorBlock {
    pub version: u8,
    pub sku: u8,
    pub guid_csi2: [u8; 16],
    pub devfunction: u8,
    pub bus: u8,
    pub dphylinkenfuses: u32,
    pub clockdiv: u32,
    pub link: u8,
    pub lanes: u8,
    pub csiparams: [u32; 10],
    pub maxlanespeed: u32,
    pub sensorcalibfileidx: u8,
    pub sensorcalibfileidx_mbz: [u8; 3],
    pub romtype: u8,
    pub vcmtype: u8,
    pub platforminfo: u8,
    pub platformsubinfo: u8,
    pub flash: u8,
    pub privacyled: u8,
    /// Mount rotation in degrees
    pub degree: u8,
    pub mipilinkdefined: u8,
    /// External clock frequency in Hz
    pub mclkspeed: u32,
    pub controllogicid: u8,
    pub reserved1: [u8; 3],
    pub mclkport: u8,
    pub reserved2: [u8; 13],
}

fn read_u32(raw: &[u8; SSDB_LEN], off: usize) -> u32 {
    u32::from_le_bytes([raw[off], raw[off + 1], raw[off + 2], raw[off + 3]])
}

fn write_u32(raw: &mut [u8; SSDB_LEN], off: usize, value: u32) {
    raw[off..off + 4].copy_from_slice(&value.to_le_bytes());
}

impl DescriptorBlock {
    /// Decode a full, zero-padded descriptor buffer
    pub fn decode(raw: &[u8; SSDB_LEN]) -> Self {
        let mut block = Self {
            version: raw[OFF_VERSION],
            sku: raw[OFF_SKU],
            devfunction: raw[OFF_DEVFUNCTION],
            bus: raw[OFF_BUS],
            dphylinkenfuses: read_u32(raw, OFF_DPHYLINKENFUSES),
            clockdiv: read_u32(raw, OFF_CLOCKDIV),
            link: raw[OFF_LINK],
            lanes: raw[OFF_LANES],
            maxlanespeed: read_u32(raw, OFF_MAXLANESPEED),
            sensorcalibfileidx: raw[OFF_CALIBFILEIDX],
            romtype: raw[OFF_ROMTYPE],
            vcmtype: raw[OFF_VCMTYPE],
            platforminfo: raw[OFF_PLATFORMINFO],
            platformsubinfo: raw[OFF_PLATFORMSUBINFO],
            flash: raw[OFF_FLASH],
            privacyled: raw[OFF_PRIVACYLED],
            degree: raw[OFF_DEGREE],
            mipilinkdefined: raw[OFF_MIPILINKDEFINED],
            mclkspeed: read_u32(raw, OFF_MCLKSPEED),
            controllogicid: raw[OFF_CONTROLLOGICID],
            mclkport: raw[OFF_MCLKPORT],
            ..Default::default()
        };
        block.guid_csi2.copy_from_slice(&raw[OFF_GUID..OFF_GUID + 16]);
        for (i, param) in block.csiparams.iter_mut().enumerate() {
            *param = read_u32(raw, OFF_CSIPARAMS + i * 4);
        }
        block
            .sensorcalibfileidx_mbz
            .copy_from_slice(&raw[OFF_CALIBFILEIDX_MBZ..OFF_CALIBFILEIDX_MBZ + 3]);
        block.reserved1.copy_from_slice(&raw[OFF_RESERVED1..OFF_RESERVED1 + 3]);
        block.reserved2.copy_from_slice(&raw[OFF_RESERVED2..OFF_RESERVED2 + 13]);
        block
    }

    /// Decode a buffer of firmware-reported length
    ///
    /// Shorter buffers are zero-padded but must still reach past `mclkspeed`.
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        if data.len() > SSDB_LEN {
            return Err(BridgeError::BufferTooSmall {
                len: data.len(),
                capacity: SSDB_LEN,
            });
        }
        if data.len() < SSDB_MIN_LEN {
            return Err(BridgeError::NotFound(format!(
                "descriptor truncated to {} bytes",
                data.len()
            )));
        }
        let mut raw = [0u8; SSDB_LEN];
        raw[..data.len()].copy_from_slice(data);
        Ok(Self::decode(&raw))
    }

    /// Encode back into the packed firmware layout
    pub fn encode(&self) -> [u8; SSDB_LEN] {
        let mut raw = [0u8; SSDB_LEN];
        raw[OFF_VERSION] = self.version;
        raw[OFF_SKU] = self.sku;
        raw[OFF_GUID..OFF_GUID + 16].copy_from_slice(&self.guid_csi2);
        raw[OFF_DEVFUNCTION] = self.devfunction;
        raw[OFF_BUS] = self.bus;
        write_u32(&mut raw, OFF_DPHYLINKENFUSES, self.dphylinkenfuses);
        write_u32(&mut raw, OFF_CLOCKDIV, self.clockdiv);
        raw[OFF_LINK] = self.link;
        raw[OFF_LANES] = self.lanes;
        for (i, param) in self.csiparams.iter().enumerate() {
            write_u32(&mut raw, OFF_CSIPARAMS + i * 4, *param);
        }
        write_u32(&mut raw, OFF_MAXLANESPEED, self.maxlanespeed);
        raw[OFF_CALIBFILEIDX] = self.sensorcalibfileidx;
        raw[OFF_CALIBFILEIDX_MBZ..OFF_CALIBFILEIDX_MBZ + 3]
            .copy_from_slice(&self.sensorcalibfileidx_mbz);
        raw[OFF_ROMTYPE] = self.romtype;
        raw[OFF_VCMTYPE] = self.vcmtype;
        raw[OFF_PLATFORMINFO] = self.platforminfo;
        raw[OFF_PLATFORMSUBINFO] = self.platformsubinfo;
        raw[OFF_FLASH] = self.flash;
        raw[OFF_PRIVACYLED] = self.privacyled;
        raw[OFF_DEGREE] = self.degree;
        raw[OFF_MIPILINKDEFINED] = self.mipilinkdefined;
        write_u32(&mut raw, OFF_MCLKSPEED, self.mclkspeed);
        raw[OFF_CONTROLLOGICID] = self.controllogicid;
        raw[OFF_RESERVED1..OFF_RESERVED1 + 3].copy_from_slice(&self.reserved1);
        raw[OFF_MCLKPORT] = self.mclkport;
        raw[OFF_RESERVED2..OFF_RESERVED2 + 13].copy_from_slice(&self.reserved2);
        raw
    }

    /// CSI-2 GUID as a lowercase hex string
    pub fn guid_hex(&self) -> String {
        hex::encode(self.guid_csi2)
    }
}

/// The descriptor fields consumed by the graph registrar, in typed form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensorProperties {
    /// CSI-2 link id on the controller
    pub link: u8,
    /// Controller port node name for `link`
    pub port_name: &'static str,
    pub clock_frequency: u32,
    pub rotation: u8,
    pub bus_type: u32,
    /// Lane indices 1..=lanes
    pub data_lanes: Vec<u32>,
}

impl SensorProperties {
    /// Project a descriptor into typed properties
    pub fn project(block: &DescriptorBlock) -> Result<Self> {
        let port_name = PORT_NAMES.get(usize::from(block.link)).copied().ok_or_else(|| {
            BridgeError::NotFound(format!("descriptor link {} has no port", block.link))
        })?;
        if block.lanes == 0 {
            return Err(BridgeError::NotFound(
                "descriptor declares no data lanes".to_string(),
            ));
        }

        let mut data_lanes = Vec::new();
        data_lanes
            .try_reserve_exact(usize::from(block.lanes))
            .map_err(|e| BridgeError::AllocationFailure(format!("data-lanes: {e}")))?;
        data_lanes.extend(1..=u32::from(block.lanes));

        Ok(Self {
            link: block.link,
            port_name,
            clock_frequency: block.mclkspeed,
            rotation: block.degree,
            bus_type: property::BUS_TYPE_CSI2_DPHY,
            data_lanes,
        })
    }

    pub fn lanes(&self) -> usize {
        self.data_lanes.len()
    }

    /// Properties of the sensor's identity node
    pub fn device_properties(&self) -> Vec<PropertyEntry> {
        vec![
            PropertyEntry::u32(property::CLOCK_FREQUENCY, self.clock_frequency),
            PropertyEntry::u8(property::ROTATION, self.rotation),
        ]
    }

    /// Properties of the sensor-side endpoint
    pub fn sensor_endpoint_properties(&self, remote: NodeId) -> Vec<PropertyEntry> {
        vec![
            PropertyEntry::u32(property::BUS_TYPE, self.bus_type),
            PropertyEntry::u32_array(property::DATA_LANES, self.data_lanes.clone()),
            PropertyEntry::reference(property::REMOTE_ENDPOINT, remote),
        ]
    }

    /// Properties of the controller-side endpoint
    pub fn bridge_endpoint_properties(&self, remote: NodeId) -> Vec<PropertyEntry> {
        vec![
            PropertyEntry::u32_array(property::DATA_LANES, self.data_lanes.clone()),
            PropertyEntry::reference(property::REMOTE_ENDPOINT, remote),
        ]
    }
}
