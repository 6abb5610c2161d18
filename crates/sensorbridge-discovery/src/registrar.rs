//! Per-sensor software node graph construction and registration
//!
//! Each sensor contributes five nodes, registered in dependency order:
//!
//! ```text
//! <HID> -> port0 -> endpoint0  <-remote-endpoint->  endpoint0 <- portN <- bridge node
//! ```
//!
//! and unregistered in exact reverse. The sensor node is exposed to other
//! drivers only once the whole chain is registered.

use chrono::{DateTime, Utc};
use sensorbridge_core::{
    BridgeError, BusDevice, FirmwareDevice, HardwareId, NodeId, NodeIdAllocator, NodeRegistry,
    Result, SensorProperties, SoftwareNode,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::matcher::Match;

/// Port name on the sensor side; sensors expose a single port
pub const SENSOR_PORT: &str = "port0";
pub const ENDPOINT_NAME: &str = "endpoint0";

/// Position of a node in a sensor's registration order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorNode {
    Hid = 0,
    Port = 1,
    Endpoint = 2,
    BridgePort = 3,
    BridgeEndpoint = 4,
}

/// One matched camera sensor and the graph it contributes
#[derive(Debug)]
pub struct Sensor {
    slot: u32,
    hid: HardwareId,
    device: Option<Arc<BusDevice>>,
    firmware: Option<Arc<FirmwareDevice>>,
    properties: Option<SensorProperties>,
    nodes: Vec<SoftwareNode>,
    /// Length of the registered prefix of `nodes`
    registered: usize,
    attached: bool,
    attached_at: Option<DateTime<Utc>>,
}

impl Sensor {
    /// Take ownership of a match's device references
    pub fn new(slot: u32, found: Match) -> Self {
        Self {
            slot,
            hid: found.hid,
            device: Some(found.device),
            firmware: Some(found.firmware),
            properties: None,
            nodes: Vec::new(),
            registered: 0,
            attached: false,
            attached_at: None,
        }
    }

    /// Build the node chain linking this sensor to `bridge_node`
    pub fn build_graph(
        &mut self,
        properties: SensorProperties,
        bridge_node: NodeId,
        ids: &mut NodeIdAllocator,
    ) -> Result<()> {
        if self.registered > 0 {
            return Err(BridgeError::InvalidArgument(format!(
                "{} graph is already registered",
                self.hid
            )));
        }

        let hid = ids.allocate();
        let port = ids.allocate();
        let endpoint = ids.allocate();
        let bridge_port = ids.allocate();
        let bridge_endpoint = ids.allocate();

        self.nodes = vec![
            SoftwareNode::device(hid, self.hid.as_str(), properties.device_properties()),
            SoftwareNode::port(port, SENSOR_PORT, hid),
            SoftwareNode::endpoint(
                endpoint,
                ENDPOINT_NAME,
                port,
                properties.sensor_endpoint_properties(bridge_endpoint),
            ),
            SoftwareNode::port(bridge_port, properties.port_name, bridge_node),
            SoftwareNode::endpoint(
                bridge_endpoint,
                ENDPOINT_NAME,
                bridge_port,
                properties.bridge_endpoint_properties(endpoint),
            ),
        ];
        self.properties = Some(properties);
        Ok(())
    }

    /// Register the chain and attach the sensor node to the bus device.
    ///
    /// On failure everything done so far is undone and the device
    /// references are released.
    pub fn register_all<R: NodeRegistry + ?Sized>(&mut self, registry: &mut R) -> Result<()> {
        let Some(device) = self.device.clone() else {
            return Err(BridgeError::InvalidArgument(format!("{} was released", self.hid)));
        };
        if self.nodes.is_empty() {
            return Err(BridgeError::InvalidArgument(format!("{} has no graph", self.hid)));
        }
        if self.attached {
            return Err(BridgeError::InvalidArgument(format!(
                "{} is already registered",
                self.hid
            )));
        }

        while self.registered < self.nodes.len() {
            let node = &self.nodes[self.registered];
            if let Err(e) = registry.register(node) {
                warn!(sensor = %self.hid, node = %node.name, error = %e, "Node registration failed, rolling back");
                self.unregister_all(registry);
                return Err(e);
            }
            self.registered += 1;
        }

        let hid_node = self.nodes[SensorNode::Hid as usize].id;
        if let Err(e) = registry.attach_secondary(&device, hid_node) {
            warn!(sensor = %self.hid, device = %device.name, error = %e, "Could not attach sensor node");
            self.unregister_all(registry);
            return Err(e);
        }
        self.attached = true;
        self.attached_at = Some(Utc::now());

        debug!(sensor = %self.hid, slot = self.slot, device = %device.name, "Sensor graph registered");
        Ok(())
    }

    /// Undo registration and release buffers and device references.
    ///
    /// Safe to call repeatedly.
    pub fn unregister_all<R: NodeRegistry + ?Sized>(&mut self, registry: &mut R) {
        if self.attached {
            if let Some(device) = &self.device {
                registry.detach_secondary(device);
            }
            self.attached = false;
        }
        registry.unregister_nodes_reverse(&self.nodes[..self.registered]);
        self.registered = 0;

        self.nodes.clear();
        self.properties = None;
        self.device = None;
        self.firmware = None;
    }

    pub fn slot(&self) -> u32 {
        self.slot
    }

    pub fn hid(&self) -> &HardwareId {
        &self.hid
    }

    pub fn name(&self) -> &str {
        self.hid.as_str()
    }

    pub fn device(&self) -> Option<&Arc<BusDevice>> {
        self.device.as_ref()
    }

    pub fn firmware(&self) -> Option<&Arc<FirmwareDevice>> {
        self.firmware.as_ref()
    }

    pub fn properties(&self) -> Option<&SensorProperties> {
        self.properties.as_ref()
    }

    pub fn data_lanes(&self) -> &[u32] {
        self.properties
            .as_ref()
            .map(|p| p.data_lanes.as_slice())
            .unwrap_or_default()
    }

    pub fn node(&self, which: SensorNode) -> Option<&SoftwareNode> {
        self.nodes.get(which as usize)
    }

    pub fn nodes(&self) -> &[SoftwareNode] {
        &self.nodes
    }

    pub fn registered_nodes(&self) -> usize {
        self.registered
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn attached_at(&self) -> Option<DateTime<Utc>> {
        self.attached_at
    }

    /// Whether the sensor still holds its bus or firmware device reference
    pub fn holds_references(&self) -> bool {
        self.device.is_some() || self.firmware.is_some()
    }
}
