//! Sensorbridge Core - Core types, descriptor decoding, and node registry
//!
//! This crate provides the foundational types for the sensorbridge system:
//! - Hardware identifiers and reference-counted device handles
//! - Decoding of the fixed-layout `SSDB` sensor descriptor
//! - Software nodes and typed property entries
//! - The node registry that downstream drivers query

pub mod descriptor;
pub mod device;
pub mod error;
pub mod node;
pub mod property;
pub mod registry;

pub use descriptor::{DescriptorBlock, SensorProperties, SSDB_LEN};
pub use device::{BusDevice, BusType, FirmwareDevice, FirmwareObject, HardwareId};
pub use error::{BridgeError, Result};
pub use node::{NodeId, NodeIdAllocator, NodeKind, SoftwareNode};
pub use property::{PropertyEntry, PropertyValue};
pub use registry::{MemoryRegistry, NodeRegistry, RegistryEvent, RegistrySnapshot};
