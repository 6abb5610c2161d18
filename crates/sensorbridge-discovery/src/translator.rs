//! Descriptor reading from firmware

use sensorbridge_core::descriptor::SSDB_MIN_LEN;
use sensorbridge_core::{BridgeError, DescriptorBlock, FirmwareDevice, FirmwareObject, Result, SSDB_LEN};
use tracing::{debug, warn};

use crate::platform::FirmwareStore;

/// Copy the named firmware buffer into `dest`, returning its length.
///
/// All-or-nothing: `dest` is untouched unless the whole buffer fits.
pub fn read_block<S: FirmwareStore + ?Sized>(
    store: &S,
    device: &FirmwareDevice,
    name: &str,
    dest: &mut [u8],
) -> Result<usize> {
    let object = store
        .evaluate(device, name)
        .ok_or_else(|| BridgeError::NotFound(format!("{}.{}", device.path, name)))?;

    let data = match object {
        FirmwareObject::Buffer(data) => data,
        other => {
            warn!(path = %device.path, object = name, kind = other.type_name(), "Firmware object is not a buffer");
            return Err(BridgeError::NotFound(format!(
                "{}.{} is a {}, not a buffer",
                device.path,
                name,
                other.type_name()
            )));
        }
    };

    if data.len() > dest.len() {
        warn!(path = %device.path, object = name, len = data.len(), capacity = dest.len(), "Given buffer is too small");
        return Err(BridgeError::BufferTooSmall {
            len: data.len(),
            capacity: dest.len(),
        });
    }

    dest[..data.len()].copy_from_slice(&data);
    Ok(data.len())
}

/// Read and decode the sensor descriptor named `name`
pub fn read_descriptor<S: FirmwareStore + ?Sized>(
    store: &S,
    device: &FirmwareDevice,
    name: &str,
) -> Result<DescriptorBlock> {
    let mut raw = [0u8; SSDB_LEN];
    let len = read_block(store, device, name, &mut raw)?;
    if len < SSDB_MIN_LEN {
        return Err(BridgeError::NotFound(format!(
            "{}.{} truncated to {} bytes",
            device.path, name, len
        )));
    }

    let block = DescriptorBlock::decode(&raw);
    debug!(
        path = %device.path,
        version = block.version,
        link = block.link,
        lanes = block.lanes,
        degree = block.degree,
        mclkspeed = block.mclkspeed,
        "Read sensor descriptor"
    );
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MemoryPlatform;

    const PATH: &str = "\\_SB_.PCI0.CAM0";

    fn platform_with(object: FirmwareObject) -> (MemoryPlatform, FirmwareDevice) {
        let mut platform = MemoryPlatform::new();
        let fw = platform.add_device(FirmwareDevice::new("INT33BE", PATH)).unwrap();
        platform.set_object(PATH, "SSDB", object).unwrap();
        (platform, (*fw).clone())
    }

    #[test]
    fn test_read_descriptor() {
        let block = DescriptorBlock {
            link: 1,
            lanes: 2,
            degree: 90,
            mclkspeed: 19_200_000,
            ..Default::default()
        };
        let (platform, fw) = platform_with(FirmwareObject::Buffer(block.encode().to_vec()));
        assert_eq!(read_descriptor(&platform, &fw, "SSDB").unwrap(), block);
    }

    #[test]
    fn test_oversized_buffer_leaves_destination_untouched() {
        let (platform, fw) = platform_with(FirmwareObject::Buffer(vec![0x11; SSDB_LEN + 4]));
        let mut dest = [0xa5u8; SSDB_LEN];

        let err = read_block(&platform, &fw, "SSDB", &mut dest).unwrap_err();
        assert_eq!(err, BridgeError::BufferTooSmall { len: SSDB_LEN + 4, capacity: SSDB_LEN });
        assert!(dest.iter().all(|b| *b == 0xa5));
    }

    #[test]
    fn test_missing_or_mistyped_object_is_not_found() {
        let (platform, fw) = platform_with(FirmwareObject::Integer(7));
        assert!(matches!(
            read_descriptor(&platform, &fw, "SSDB"),
            Err(BridgeError::NotFound(_))
        ));
        assert!(matches!(
            read_descriptor(&platform, &fw, "XSDB"),
            Err(BridgeError::NotFound(_))
        ));
    }

    #[test]
    fn test_truncated_descriptor_is_not_found() {
        let (platform, fw) = platform_with(FirmwareObject::Buffer(vec![0; 32]));
        assert!(matches!(
            read_descriptor(&platform, &fw, "SSDB"),
            Err(BridgeError::NotFound(_))
        ));
    }
}
