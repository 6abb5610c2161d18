//! Software nodes describing device connections absent from firmware tables
//!
//! Nodes are identified by [`NodeId`]s handed out by a [`NodeIdAllocator`].
//! Ids are allocated before registration so two endpoints can reference each
//! other, and are never reused by the same allocator, even after a rollback.

use serde::Serialize;

use crate::property::{self, PropertyEntry, PropertyValue};

/// Stable identifier of a software node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(u64);

impl NodeId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "swnode#{}", self.0)
    }
}

/// Monotonic node id source
#[derive(Debug, Default)]
pub struct NodeIdAllocator {
    next: u64,
}

impl NodeIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }

    /// Number of ids handed out so far
    pub fn issued(&self) -> u64 {
        self.next
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Identity node of a device, named after its hardware id
    Device,
    Port,
    Endpoint,
}

/// A node in the software node graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoftwareNode {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub properties: Vec<PropertyEntry>,
}

impl SoftwareNode {
    pub fn device(id: NodeId, name: &str, properties: Vec<PropertyEntry>) -> Self {
        Self {
            id,
            name: name.to_string(),
            kind: NodeKind::Device,
            parent: None,
            properties,
        }
    }

    pub fn port(id: NodeId, name: &str, parent: NodeId) -> Self {
        Self {
            id,
            name: name.to_string(),
            kind: NodeKind::Port,
            parent: Some(parent),
            properties: Vec::new(),
        }
    }

    pub fn endpoint(
        id: NodeId,
        name: &str,
        parent: NodeId,
        properties: Vec<PropertyEntry>,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            kind: NodeKind::Endpoint,
            parent: Some(parent),
            properties,
        }
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        property::find(&self.properties, key)
    }

    /// Target of this endpoint's `remote-endpoint` reference
    pub fn remote_endpoint(&self) -> Option<NodeId> {
        self.property(property::REMOTE_ENDPOINT)
            .and_then(PropertyValue::as_reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_is_monotonic() {
        let mut ids = NodeIdAllocator::new();
        let a = ids.allocate();
        let b = ids.allocate();
        assert!(b > a);
        assert_eq!(ids.issued(), 2);
    }

    #[test]
    fn test_endpoint_remote_reference() {
        let mut ids = NodeIdAllocator::new();
        let port = ids.allocate();
        let ep = ids.allocate();
        let remote = ids.allocate();
        let node = SoftwareNode::endpoint(
            ep,
            "endpoint0",
            port,
            vec![PropertyEntry::reference(property::REMOTE_ENDPOINT, remote)],
        );
        assert_eq!(node.kind, NodeKind::Endpoint);
        assert_eq!(node.parent, Some(port));
        assert_eq!(node.remote_endpoint(), Some(remote));
    }
}
