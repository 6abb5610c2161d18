//! Software node registry
//!
//! [`NodeRegistry`] is the seam between the bridge and whatever hosts the
//! node graph. [`MemoryRegistry`] is the in-process implementation used by
//! the daemon and the tests; downstream consumers look nodes up through it
//! the same way imaging drivers walk firmware graphs.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, trace};

use crate::device::BusDevice;
use crate::error::{BridgeError, Result};
use crate::node::{NodeId, NodeKind, SoftwareNode};

pub trait NodeRegistry {
    /// Register one node; its parent must already be registered
    fn register(&mut self, node: &SoftwareNode) -> Result<()>;

    /// Unregister one node. Unknown ids are ignored.
    fn unregister(&mut self, id: NodeId);

    /// Expose `node` as the secondary firmware node of `device`
    fn attach_secondary(&mut self, device: &BusDevice, node: NodeId) -> Result<()>;

    fn detach_secondary(&mut self, device: &BusDevice);

    /// Register `nodes` in order. On failure the already registered prefix is
    /// unregistered in reverse before the error is returned.
    fn register_nodes(&mut self, nodes: &[SoftwareNode]) -> Result<()> {
        for (i, node) in nodes.iter().enumerate() {
            if let Err(e) = self.register(node) {
                self.unregister_nodes_reverse(&nodes[..i]);
                return Err(e);
            }
        }
        Ok(())
    }

    fn unregister_nodes_reverse(&mut self, nodes: &[SoftwareNode]) {
        for node in nodes.iter().rev() {
            self.unregister(node.id);
        }
    }
}

/// Registry mutation, recorded in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RegistryEvent {
    Registered { id: NodeId, name: String },
    Unregistered { id: NodeId, name: String },
    Attached { device: String, node: NodeId },
    Detached { device: String, node: NodeId },
}

/// In-memory node registry
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    nodes: BTreeMap<NodeId, SoftwareNode>,
    /// Bus device name -> secondary node
    secondaries: BTreeMap<String, NodeId>,
    /// Maximum number of live nodes, if bounded
    limit: Option<usize>,
    events: Vec<RegistryEvent>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry that rejects registrations once `limit` nodes are live
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&SoftwareNode> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Registered children of `id`, in id order
    pub fn children(&self, id: NodeId) -> Vec<&SoftwareNode> {
        self.nodes.values().filter(|n| n.parent == Some(id)).collect()
    }

    /// Child of `parent` with the given name
    pub fn child_by_name(&self, parent: NodeId, name: &str) -> Option<&SoftwareNode> {
        self.nodes
            .values()
            .find(|n| n.parent == Some(parent) && n.name == name)
    }

    /// Endpoints below every port of `device_node`
    pub fn endpoints(&self, device_node: NodeId) -> Vec<&SoftwareNode> {
        self.children(device_node)
            .into_iter()
            .filter(|port| port.kind == NodeKind::Port)
            .flat_map(|port| self.children(port.id))
            .filter(|ep| ep.kind == NodeKind::Endpoint)
            .collect()
    }

    /// Resolve an endpoint's `remote-endpoint` reference. Returns `None` if
    /// the target is not registered.
    pub fn remote_endpoint(&self, endpoint: NodeId) -> Option<&SoftwareNode> {
        self.get(endpoint)
            .and_then(SoftwareNode::remote_endpoint)
            .and_then(|target| self.get(target))
    }

    /// Secondary firmware node attached to a bus device
    pub fn secondary(&self, device_name: &str) -> Option<&SoftwareNode> {
        self.secondaries.get(device_name).and_then(|id| self.get(*id))
    }

    pub fn attached_count(&self) -> usize {
        self.secondaries.len()
    }

    pub fn events(&self) -> &[RegistryEvent] {
        &self.events
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            nodes: self.nodes.values().cloned().collect(),
            secondaries: self.secondaries.clone(),
        }
    }
}

impl NodeRegistry for MemoryRegistry {
    fn register(&mut self, node: &SoftwareNode) -> Result<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(BridgeError::RegistrationFailure(format!(
                "{} ({}) is already registered",
                node.name, node.id
            )));
        }
        if let Some(parent) = node.parent {
            if !self.nodes.contains_key(&parent) {
                return Err(BridgeError::RegistrationFailure(format!(
                    "parent {} of {} is not registered",
                    parent, node.name
                )));
            }
        }
        if let Some(limit) = self.limit {
            if self.nodes.len() >= limit {
                return Err(BridgeError::RegistrationFailure(format!(
                    "registry full ({} nodes), cannot add {}",
                    limit, node.name
                )));
            }
        }

        trace!(id = %node.id, name = %node.name, "Registering software node");
        self.events.push(RegistryEvent::Registered {
            id: node.id,
            name: node.name.clone(),
        });
        self.nodes.insert(node.id, node.clone());
        Ok(())
    }

    fn unregister(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.remove(&id) {
            trace!(id = %id, name = %node.name, "Unregistered software node");
            self.events.push(RegistryEvent::Unregistered { id, name: node.name });
        }
    }

    fn attach_secondary(&mut self, device: &BusDevice, node: NodeId) -> Result<()> {
        if !self.nodes.contains_key(&node) {
            return Err(BridgeError::NotFound(format!(
                "no registered node {} to attach to {}",
                node, device.name
            )));
        }
        if let Some(existing) = self.secondaries.get(&device.name) {
            return Err(BridgeError::RegistrationFailure(format!(
                "{} already has secondary node {}",
                device.name, existing
            )));
        }
        debug!(device = %device.name, node = %node, "Attached secondary firmware node");
        self.secondaries.insert(device.name.clone(), node);
        self.events.push(RegistryEvent::Attached {
            device: device.name.clone(),
            node,
        });
        Ok(())
    }

    fn detach_secondary(&mut self, device: &BusDevice) {
        if let Some(node) = self.secondaries.remove(&device.name) {
            self.events.push(RegistryEvent::Detached {
                device: device.name.clone(),
                node,
            });
        }
    }
}

/// Serializable view of the registry for reports
#[derive(Debug, Clone, Serialize)]
pub struct RegistrySnapshot {
    pub nodes: Vec<SoftwareNode>,
    pub secondaries: BTreeMap<String, NodeId>,
}
