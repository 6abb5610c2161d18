//! Sensorbridge Discovery - Camera sensor discovery and graph registration
//!
//! This crate runs one discovery pass over the firmware device catalog:
//! - Catalog matching of known sensor hardware ids
//! - Translation of each sensor's `SSDB` descriptor into node properties
//! - Registration of the sensor <-> controller node graph, with rollback

pub mod bridge;
pub mod matcher;
pub mod platform;
pub mod registrar;
pub mod translator;

pub use bridge::{
    Bridge, BridgeConfig, BridgeReport, PassState, SensorFailure, SensorStage,
    DEFAULT_CANDIDATES,
};
pub use platform::{DeviceCatalog, FirmwareStore, MemoryPlatform, PlatformError};
pub use registrar::{Sensor, SensorNode};
