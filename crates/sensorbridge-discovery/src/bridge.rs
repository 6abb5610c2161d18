//! Discovery pass orchestration
//!
//! A [`Bridge`] is a caller-owned context for one controller. `build` runs a
//! discovery pass and publishes the resulting graph; `burn` tears it down.
//! Node ids and sensor slots come from counters owned by the bridge and are
//! never reused, so a failed pass followed by a retry cannot alias a node
//! from an earlier attempt.

use chrono::{DateTime, Utc};
use sensorbridge_core::{
    BridgeError, BusDevice, HardwareId, NodeId, NodeIdAllocator, NodeRegistry, Result,
    SensorProperties, SoftwareNode,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::matcher::{self, Match};
use crate::platform::{DeviceCatalog, FirmwareStore};
use crate::registrar::Sensor;
use crate::translator;

/// Sensors known to work with the bridge
pub const DEFAULT_CANDIDATES: &[&str] = &["INT33BE", "OVTI2680"];

pub const MAX_CONNECTED_DEVICES: usize = 4;

/// Hardware id of the imaging controller's identity node
pub const BRIDGE_HID: &str = "INT343E";

/// Firmware object holding the sensor descriptor
pub const DESCRIPTOR_NAME: &str = "SSDB";

/// Bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Hardware ids to look for, in match order
    #[serde(default = "default_candidates")]
    pub candidates: Vec<String>,
    /// Maximum number of sensors connected in one pass
    #[serde(default = "default_max_sensors")]
    pub max_sensors: usize,
    /// Name of the controller identity node
    #[serde(default = "default_bridge_hid")]
    pub bridge_hid: String,
    /// Name of the descriptor firmware object
    #[serde(default = "default_descriptor")]
    pub descriptor: String,
}

fn default_candidates() -> Vec<String> {
    DEFAULT_CANDIDATES.iter().map(|s| s.to_string()).collect()
}

fn default_max_sensors() -> usize {
    MAX_CONNECTED_DEVICES
}

fn default_bridge_hid() -> String {
    BRIDGE_HID.to_string()
}

fn default_descriptor() -> String {
    DESCRIPTOR_NAME.to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            candidates: default_candidates(),
            max_sensors: default_max_sensors(),
            bridge_hid: default_bridge_hid(),
            descriptor: default_descriptor(),
        }
    }
}

/// Where a discovery pass ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassState {
    Idle,
    Matching,
    /// At least one sensor is visible to other drivers
    Attached,
    /// The pass failed and everything it registered was undone
    RolledBack,
}

/// Stage of the per-sensor pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorStage {
    Matching,
    Reading,
    Projecting,
    Registering,
}

/// A candidate that matched but could not be connected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorFailure {
    pub hid: String,
    pub stage: SensorStage,
    pub error: BridgeError,
}

pub struct Bridge {
    config: BridgeConfig,
    candidates: Vec<HardwareId>,
    session: Uuid,
    ids: NodeIdAllocator,
    next_slot: u32,
    controller: Option<Arc<BusDevice>>,
    bridge_node: Option<SoftwareNode>,
    bridge_attached: bool,
    sensors: Vec<Sensor>,
    failures: Vec<SensorFailure>,
    state: PassState,
}

impl Bridge {
    /// Create a bridge, validating the configured candidates
    pub fn new(config: BridgeConfig) -> Result<Self> {
        if config.max_sensors == 0 {
            return Err(BridgeError::InvalidArgument("max_sensors must be at least 1".to_string()));
        }
        HardwareId::new(&config.bridge_hid)?;
        let candidates = config
            .candidates
            .iter()
            .map(|c| HardwareId::new(c))
            .collect::<Result<Vec<_>>>()?;
        if let Some(dup) = candidates
            .iter()
            .enumerate()
            .find_map(|(i, hid)| candidates[..i].contains(hid).then_some(hid))
        {
            return Err(BridgeError::InvalidArgument(format!(
                "candidate {dup} is listed more than once"
            )));
        }

        Ok(Self {
            config,
            candidates,
            session: Uuid::new_v4(),
            ids: NodeIdAllocator::new(),
            next_slot: 0,
            controller: None,
            bridge_node: None,
            bridge_attached: false,
            sensors: Vec::new(),
            failures: Vec::new(),
            state: PassState::Idle,
        })
    }

    /// Run a discovery pass for `controller` and publish the graph.
    ///
    /// Returns the number of connected sensors. `NotReady` means nothing is
    /// registered and the whole pass should be retried later.
    pub fn build<P, R>(&mut self, controller: &Arc<BusDevice>, platform: &P, registry: &mut R) -> Result<usize>
    where
        P: DeviceCatalog + FirmwareStore + ?Sized,
        R: NodeRegistry + ?Sized,
    {
        if self.controller.is_some() {
            return Err(BridgeError::InvalidArgument(format!(
                "bridge for {} is already built",
                controller.name
            )));
        }

        self.failures.clear();
        self.controller = Some(Arc::clone(controller));

        let node = SoftwareNode::device(self.ids.allocate(), &self.config.bridge_hid, Vec::new());
        if let Err(e) = registry.register(&node) {
            error!(controller = %controller.name, error = %e, "Failed to register the bridge node");
            self.controller = None;
            self.state = PassState::RolledBack;
            return Err(e);
        }
        let bridge_id = node.id;
        self.bridge_node = Some(node);

        let count = match self.discover(platform, registry) {
            Ok(0) => {
                warn!(controller = %controller.name, "No supported sensors connected");
                self.unwind(registry);
                return Err(BridgeError::NotReady("no supported sensors".to_string()));
            }
            Ok(count) => count,
            Err(e) => {
                self.unwind(registry);
                return Err(e);
            }
        };

        info!(controller = %controller.name, session = %self.session, "Connected {} cameras", count);

        if let Err(e) = registry.attach_secondary(controller, bridge_id) {
            error!(controller = %controller.name, error = %e, "Could not attach the bridge node");
            self.unregister_sensors(registry);
            self.unwind(registry);
            return Err(e);
        }
        self.bridge_attached = true;
        self.state = PassState::Attached;
        Ok(count)
    }

    /// Match every candidate and connect the ones present.
    ///
    /// Sensors failing in their own pipeline are rolled back and recorded
    /// while matching continues, so one working sensor is kept over none.
    /// `NotReady` rolls back everything connected in this pass.
    pub fn discover<P, R>(&mut self, platform: &P, registry: &mut R) -> Result<usize>
    where
        P: DeviceCatalog + FirmwareStore + ?Sized,
        R: NodeRegistry + ?Sized,
    {
        let Some(bridge_id) = self.bridge_node.as_ref().map(|n| n.id) else {
            return Err(BridgeError::InvalidArgument("bridge node is not registered".to_string()));
        };
        self.state = PassState::Matching;

        for hid in self.candidates.clone() {
            if self.sensors.len() >= self.config.max_sensors {
                warn!(max = self.config.max_sensors, hid = %hid, "Sensor capacity reached, not matching further candidates");
                break;
            }

            let found = match matcher::match_candidate(platform, &hid) {
                Ok(Some(found)) => found,
                Ok(None) => {
                    debug!(hid = %hid, "Candidate not present");
                    continue;
                }
                Err(e) => {
                    warn!(hid = %hid, error = %e, "Deferring, rolling back connected sensors");
                    self.record(&hid, SensorStage::Matching, e.clone());
                    self.unregister_sensors(registry);
                    return Err(e);
                }
            };

            let slot = self.next_slot;
            self.next_slot += 1;

            match self.connect(slot, found, bridge_id, platform, registry) {
                Ok(sensor) => {
                    info!(hid = %hid, slot, "Found supported device");
                    self.sensors.push(sensor);
                }
                Err((stage, e)) if e.is_transient() => {
                    warn!(hid = %hid, ?stage, error = %e, "Deferring, rolling back connected sensors");
                    self.record(&hid, stage, e.clone());
                    self.unregister_sensors(registry);
                    return Err(e);
                }
                Err((stage, e)) => {
                    warn!(hid = %hid, ?stage, error = %e, "Skipping sensor");
                    self.record(&hid, stage, e);
                }
            }
        }

        Ok(self.sensors.len())
    }

    fn connect<P, R>(
        &mut self,
        slot: u32,
        found: Match,
        bridge_id: NodeId,
        platform: &P,
        registry: &mut R,
    ) -> std::result::Result<Sensor, (SensorStage, BridgeError)>
    where
        P: DeviceCatalog + FirmwareStore + ?Sized,
        R: NodeRegistry + ?Sized,
    {
        let block = translator::read_descriptor(platform, &found.firmware, &self.config.descriptor)
            .map_err(|e| (SensorStage::Reading, e))?;
        let properties =
            SensorProperties::project(&block).map_err(|e| (SensorStage::Projecting, e))?;

        let mut sensor = Sensor::new(slot, found);
        sensor
            .build_graph(properties, bridge_id, &mut self.ids)
            .and_then(|()| sensor.register_all(registry))
            .map_err(|e| (SensorStage::Registering, e))?;
        Ok(sensor)
    }

    /// Tear down everything `build` published. Safe after a failed build and
    /// safe to call twice.
    pub fn burn<R: NodeRegistry + ?Sized>(&mut self, registry: &mut R) {
        self.unregister_sensors(registry);
        if self.bridge_attached {
            if let Some(controller) = &self.controller {
                registry.detach_secondary(controller);
            }
            self.bridge_attached = false;
        }
        if let Some(node) = self.bridge_node.take() {
            registry.unregister(node.id);
        }
        if let Some(controller) = self.controller.take() {
            debug!(controller = %controller.name, "Released controller");
        }
        self.state = PassState::Idle;
    }

    fn unregister_sensors<R: NodeRegistry + ?Sized>(&mut self, registry: &mut R) {
        for mut sensor in self.sensors.drain(..) {
            sensor.unregister_all(registry);
        }
    }

    /// Undo the bridge node registration after a failed pass
    fn unwind<R: NodeRegistry + ?Sized>(&mut self, registry: &mut R) {
        if let Some(node) = self.bridge_node.take() {
            registry.unregister(node.id);
        }
        self.controller = None;
        self.state = PassState::RolledBack;
    }

    fn record(&mut self, hid: &HardwareId, stage: SensorStage, error: BridgeError) {
        self.failures.push(SensorFailure {
            hid: hid.to_string(),
            stage,
            error,
        });
    }

    pub fn n_sensors(&self) -> usize {
        self.sensors.len()
    }

    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    pub fn failures(&self) -> &[SensorFailure] {
        &self.failures
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    pub fn session(&self) -> Uuid {
        self.session
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn bridge_node(&self) -> Option<NodeId> {
        self.bridge_node.as_ref().map(|n| n.id)
    }

    /// Whether the bridge still holds its controller reference
    pub fn holds_controller(&self) -> bool {
        self.controller.is_some()
    }

    pub fn report(&self) -> BridgeReport {
        BridgeReport {
            session: self.session,
            state: self.state,
            controller: self.controller.as_ref().map(|c| c.name.clone()),
            n_sensors: self.sensors.len(),
            sensors: self
                .sensors
                .iter()
                .map(|s| SensorReport {
                    name: s.name().to_string(),
                    slot: s.slot(),
                    device: s.device().map(|d| d.name.clone()),
                    port: s.properties().map(|p| p.port_name.to_string()),
                    data_lanes: s.data_lanes().to_vec(),
                    rotation: s.properties().map(|p| p.rotation),
                    clock_frequency: s.properties().map(|p| p.clock_frequency),
                    attached_at: s.attached_at(),
                })
                .collect(),
            failures: self
                .failures
                .iter()
                .map(|f| FailureReport {
                    hid: f.hid.clone(),
                    stage: f.stage,
                    error: f.error.to_string(),
                })
                .collect(),
        }
    }
}

/// Serializable summary of the last pass
#[derive(Debug, Clone, Serialize)]
pub struct BridgeReport {
    pub session: Uuid,
    pub state: PassState,
    pub controller: Option<String>,
    pub n_sensors: usize,
    pub sensors: Vec<SensorReport>,
    pub failures: Vec<FailureReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SensorReport {
    pub name: String,
    pub slot: u32,
    pub device: Option<String>,
    pub port: Option<String>,
    pub data_lanes: Vec<u32>,
    pub rotation: Option<u8>,
    pub clock_frequency: Option<u32>,
    pub attached_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub hid: String,
    pub stage: SensorStage,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MemoryPlatform;
    use sensorbridge_core::property::{CLOCK_FREQUENCY, DATA_LANES, ROTATION};
    use sensorbridge_core::{
        BusType, DescriptorBlock, FirmwareDevice, FirmwareObject, MemoryRegistry, PropertyValue,
    };

    fn controller() -> Arc<BusDevice> {
        Arc::new(BusDevice::new("0000:00:14.3", BusType::Pci, None))
    }

    fn ssdb(link: u8, lanes: u8, degree: u8, mclkspeed: u32) -> FirmwareObject {
        let block = DescriptorBlock {
            link,
            lanes,
            degree,
            mclkspeed,
            ..Default::default()
        };
        FirmwareObject::Buffer(block.encode().to_vec())
    }

    fn add_sensor(platform: &mut MemoryPlatform, hid: &str, path: &str, ssdb: FirmwareObject) {
        platform.add_device(FirmwareDevice::new(hid, path)).unwrap();
        platform
            .enumerate(path, &format!("i2c-{hid}:00"), BusType::I2c)
            .unwrap();
        platform.set_object(path, "SSDB", ssdb).unwrap();
    }

    #[test]
    fn test_build_single_int33be() {
        let mut platform = MemoryPlatform::new();
        add_sensor(&mut platform, "INT33BE", "\\_SB_.PCI0.CAM0", ssdb(1, 2, 90, 19_200_000));
        let mut registry = MemoryRegistry::new();
        let cio2 = controller();
        let mut bridge = Bridge::new(BridgeConfig::default()).unwrap();

        assert_eq!(bridge.build(&cio2, &platform, &mut registry).unwrap(), 1);
        assert_eq!(bridge.n_sensors(), 1);
        assert_eq!(bridge.state(), PassState::Attached);
        assert!(bridge.failures().is_empty());

        let sensor_node = registry.secondary("i2c-INT33BE:00").unwrap();
        assert_eq!(sensor_node.property(CLOCK_FREQUENCY), Some(&PropertyValue::U32(19_200_000)));
        assert_eq!(sensor_node.property(ROTATION), Some(&PropertyValue::U8(90)));

        let endpoints = registry.endpoints(sensor_node.id);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].property(DATA_LANES), Some(&PropertyValue::U32Array(vec![1, 2])));

        let remote = registry.remote_endpoint(endpoints[0].id).unwrap();
        let port = registry.get(remote.parent.unwrap()).unwrap();
        assert_eq!(port.name, "port1");
        assert_eq!(port.parent, bridge.bridge_node());
        assert_eq!(registry.secondary("0000:00:14.3").unwrap().name, "INT343E");

        // bridge node + five sensor nodes
        assert_eq!(registry.len(), 6);
    }

    #[test]
    fn test_no_candidates_present_is_not_ready() {
        let platform = MemoryPlatform::new();
        let mut registry = MemoryRegistry::new();
        let cio2 = controller();
        let mut bridge = Bridge::new(BridgeConfig::default()).unwrap();

        let err = bridge.build(&cio2, &platform, &mut registry).unwrap_err();
        assert!(err.is_transient());
        assert!(registry.is_empty());
        assert_eq!(bridge.state(), PassState::RolledBack);
        assert!(!bridge.holds_controller());
        assert_eq!(Arc::strong_count(&cio2), 1);
        assert!(matches!(
            registry.events().last(),
            Some(sensorbridge_core::RegistryEvent::Unregistered { name, .. }) if name == "INT343E"
        ));
    }

    #[test]
    fn test_not_ready_rolls_back_earlier_sensors() {
        let mut platform = MemoryPlatform::new();
        add_sensor(&mut platform, "INT33BE", "\\_SB_.PCI0.CAM0", ssdb(0, 4, 0, 24_000_000));
        // described in firmware, I2C device not enumerated yet
        platform
            .add_device(FirmwareDevice::new("OVTI2680", "\\_SB_.PCI0.CAM1"))
            .unwrap();
        let mut registry = MemoryRegistry::new();
        let cio2 = controller();
        let mut bridge = Bridge::new(BridgeConfig::default()).unwrap();

        let err = bridge.build(&cio2, &platform, &mut registry).unwrap_err();
        assert!(matches!(err, BridgeError::NotReady(_)));
        assert!(registry.is_empty());
        assert_eq!(registry.attached_count(), 0);
        assert_eq!(bridge.n_sensors(), 0);
        assert_eq!(bridge.failures()[0].stage, SensorStage::Matching);
    }

    #[test]
    fn test_bad_descriptor_skips_only_that_sensor() {
        let mut platform = MemoryPlatform::new();
        add_sensor(
            &mut platform,
            "INT33BE",
            "\\_SB_.PCI0.CAM0",
            FirmwareObject::Buffer(vec![0; 200]),
        );
        add_sensor(&mut platform, "OVTI2680", "\\_SB_.PCI0.CAM1", ssdb(2, 1, 180, 19_200_000));
        let mut registry = MemoryRegistry::new();
        let cio2 = controller();
        let mut bridge = Bridge::new(BridgeConfig::default()).unwrap();

        assert_eq!(bridge.build(&cio2, &platform, &mut registry).unwrap(), 1);
        assert_eq!(bridge.sensors()[0].name(), "OVTI2680");
        assert!(registry.secondary("i2c-INT33BE:00").is_none());

        let failure = &bridge.failures()[0];
        assert_eq!(failure.hid, "INT33BE");
        assert_eq!(failure.stage, SensorStage::Reading);
        assert_eq!(failure.error, BridgeError::BufferTooSmall { len: 200, capacity: 108 });
    }

    #[test]
    fn test_registration_failure_is_not_counted() {
        let mut platform = MemoryPlatform::new();
        add_sensor(&mut platform, "INT33BE", "\\_SB_.PCI0.CAM0", ssdb(1, 2, 90, 19_200_000));
        add_sensor(&mut platform, "OVTI2680", "\\_SB_.PCI0.CAM1", ssdb(2, 1, 0, 19_200_000));
        // room for the bridge node, the first sensor and two nodes of the second
        let mut registry = MemoryRegistry::with_limit(8);
        let cio2 = controller();
        let mut bridge = Bridge::new(BridgeConfig::default()).unwrap();

        assert_eq!(bridge.build(&cio2, &platform, &mut registry).unwrap(), 1);
        assert_eq!(registry.len(), 6);
        assert_eq!(bridge.failures()[0].stage, SensorStage::Registering);
    }

    #[test]
    fn test_capacity_limits_matching() {
        let mut platform = MemoryPlatform::new();
        add_sensor(&mut platform, "INT33BE", "\\_SB_.PCI0.CAM0", ssdb(0, 2, 0, 19_200_000));
        add_sensor(&mut platform, "OVTI2680", "\\_SB_.PCI0.CAM1", ssdb(1, 2, 0, 19_200_000));
        let mut registry = MemoryRegistry::new();
        let config = BridgeConfig {
            max_sensors: 1,
            ..Default::default()
        };
        let mut bridge = Bridge::new(config).unwrap();

        assert_eq!(bridge.build(&controller(), &platform, &mut registry).unwrap(), 1);
        assert!(registry.secondary("i2c-OVTI2680:00").is_none());
    }

    #[test]
    fn test_burn_is_complete_and_idempotent() {
        let mut platform = MemoryPlatform::new();
        add_sensor(&mut platform, "INT33BE", "\\_SB_.PCI0.CAM0", ssdb(1, 2, 90, 19_200_000));
        let mut registry = MemoryRegistry::new();
        let cio2 = controller();
        let mut bridge = Bridge::new(BridgeConfig::default()).unwrap();
        bridge.build(&cio2, &platform, &mut registry).unwrap();

        bridge.burn(&mut registry);
        assert!(registry.is_empty());
        assert_eq!(registry.attached_count(), 0);
        assert_eq!(Arc::strong_count(&cio2), 1);
        assert_eq!(bridge.state(), PassState::Idle);

        bridge.burn(&mut registry);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_retry_never_reuses_node_ids() {
        let mut platform = MemoryPlatform::new();
        platform
            .add_device(FirmwareDevice::new("INT33BE", "\\_SB_.PCI0.CAM0"))
            .unwrap();
        platform
            .set_object("\\_SB_.PCI0.CAM0", "SSDB", ssdb(1, 2, 90, 19_200_000))
            .unwrap();
        let mut registry = MemoryRegistry::new();
        let cio2 = controller();
        let mut bridge = Bridge::new(BridgeConfig::default()).unwrap();

        assert!(bridge.build(&cio2, &platform, &mut registry).unwrap_err().is_transient());
        let first = bridge.failures().len();
        assert_eq!(first, 1);

        platform
            .enumerate("\\_SB_.PCI0.CAM0", "i2c-INT33BE:00", BusType::I2c)
            .unwrap();
        assert_eq!(bridge.build(&cio2, &platform, &mut registry).unwrap(), 1);
        assert!(bridge.failures().is_empty());

        let registered: Vec<u64> = registry.snapshot().nodes.iter().map(|n| n.id.get()).collect();
        // id 0 belonged to the first attempt's bridge node
        assert!(registered.iter().all(|id| *id > 0));
    }

    #[test]
    fn test_build_twice_is_rejected() {
        let mut platform = MemoryPlatform::new();
        add_sensor(&mut platform, "INT33BE", "\\_SB_.PCI0.CAM0", ssdb(1, 2, 90, 19_200_000));
        let mut registry = MemoryRegistry::new();
        let cio2 = controller();
        let mut bridge = Bridge::new(BridgeConfig::default()).unwrap();
        bridge.build(&cio2, &platform, &mut registry).unwrap();

        assert!(matches!(
            bridge.build(&cio2, &platform, &mut registry),
            Err(BridgeError::InvalidArgument(_))
        ));
        assert_eq!(registry.len(), 6);
    }

    #[test]
    fn test_invalid_candidates_rejected() {
        let config = BridgeConfig {
            candidates: vec!["INT33BE".to_string(), String::new()],
            ..Default::default()
        };
        assert!(matches!(Bridge::new(config), Err(BridgeError::InvalidArgument(_))));
    }

    #[test]
    fn test_duplicate_candidates_rejected() {
        let config = BridgeConfig {
            candidates: vec!["INT33BE".to_string(), "INT33BE".to_string()],
            ..Default::default()
        };
        assert!(matches!(Bridge::new(config), Err(BridgeError::InvalidArgument(_))));
    }

    #[test]
    fn test_controller_attach_failure_unwinds_everything() {
        struct NoControllerAttach(MemoryRegistry);

        impl NodeRegistry for NoControllerAttach {
            fn register(&mut self, node: &SoftwareNode) -> Result<()> {
                self.0.register(node)
            }
            fn unregister(&mut self, id: NodeId) {
                self.0.unregister(id)
            }
            fn attach_secondary(&mut self, device: &BusDevice, node: NodeId) -> Result<()> {
                if device.bus == BusType::Pci {
                    return Err(BridgeError::NotFound(device.name.clone()));
                }
                self.0.attach_secondary(device, node)
            }
            fn detach_secondary(&mut self, device: &BusDevice) {
                self.0.detach_secondary(device)
            }
        }

        let mut platform = MemoryPlatform::new();
        add_sensor(&mut platform, "INT33BE", "\\_SB_.PCI0.CAM0", ssdb(1, 2, 90, 19_200_000));
        let mut registry = NoControllerAttach(MemoryRegistry::new());
        let cio2 = controller();
        let mut bridge = Bridge::new(BridgeConfig::default()).unwrap();

        let err = bridge.build(&cio2, &platform, &mut registry).unwrap_err();
        assert!(matches!(err, BridgeError::NotFound(_)));
        assert!(registry.0.is_empty());
        assert_eq!(registry.0.attached_count(), 0);
        assert_eq!(bridge.n_sensors(), 0);
        assert_eq!(bridge.state(), PassState::RolledBack);
        assert!(!bridge.holds_controller());
        assert_eq!(Arc::strong_count(&cio2), 1);

        // the sensor chain is gone, so a later build can succeed
        let mut plain = MemoryRegistry::new();
        assert_eq!(bridge.build(&cio2, &platform, &mut plain).unwrap(), 1);
    }

    #[test]
    fn test_report() {
        let mut platform = MemoryPlatform::new();
        add_sensor(&mut platform, "INT33BE", "\\_SB_.PCI0.CAM0", ssdb(1, 2, 90, 19_200_000));
        let mut registry = MemoryRegistry::new();
        let mut bridge = Bridge::new(BridgeConfig::default()).unwrap();
        bridge.build(&controller(), &platform, &mut registry).unwrap();

        let report = bridge.report();
        assert_eq!(report.n_sensors, 1);
        assert_eq!(report.sensors[0].port.as_deref(), Some("port1"));
        assert_eq!(report.sensors[0].data_lanes, vec![1, 2]);
        assert_eq!(report.sensors[0].device.as_deref(), Some("i2c-INT33BE:00"));
        assert!(report.sensors[0].attached_at.is_some());
    }
}
