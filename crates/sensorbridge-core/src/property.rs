//! Typed property entries attached to software nodes

use serde::Serialize;

use crate::node::NodeId;

pub const CLOCK_FREQUENCY: &str = "clock-frequency";
pub const ROTATION: &str = "rotation";
pub const BUS_TYPE: &str = "bus-type";
pub const DATA_LANES: &str = "data-lanes";
pub const REMOTE_ENDPOINT: &str = "remote-endpoint";

/// `bus-type` value for a MIPI CSI-2 D-PHY link
pub const BUS_TYPE_CSI2_DPHY: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    U8(u8),
    U32(u32),
    U32Array(Vec<u32>),
    /// Reference to another node by id, resolved lazily at lookup time
    Reference(NodeId),
}

impl PropertyValue {
    pub fn as_u8(&self) -> Option<u8> {
        match self {
            Self::U8(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32_array(&self) -> Option<&[u32]> {
        match self {
            Self::U32Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<NodeId> {
        match self {
            Self::Reference(id) => Some(*id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyEntry {
    pub key: &'static str,
    pub value: PropertyValue,
}

impl PropertyEntry {
    pub fn u8(key: &'static str, value: u8) -> Self {
        Self { key, value: PropertyValue::U8(value) }
    }

    pub fn u32(key: &'static str, value: u32) -> Self {
        Self { key, value: PropertyValue::U32(value) }
    }

    pub fn u32_array(key: &'static str, value: Vec<u32>) -> Self {
        Self { key, value: PropertyValue::U32Array(value) }
    }

    pub fn reference(key: &'static str, target: NodeId) -> Self {
        Self { key, value: PropertyValue::Reference(target) }
    }
}

/// Find a property by key
pub fn find<'a>(entries: &'a [PropertyEntry], key: &str) -> Option<&'a PropertyValue> {
    entries.iter().find(|e| e.key == key).map(|e| &e.value)
}
