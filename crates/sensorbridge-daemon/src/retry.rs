//! Deferred build: retry whole discovery passes while sensors enumerate

use anyhow::Result;
use sensorbridge_core::NodeRegistry;
use sensorbridge_discovery::Bridge;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use crate::config::{Config, CIO2_PCI_ID};

/// Build the bridge, retrying on transient failures.
///
/// Each attempt sees the platform as it is at that attempt. The last
/// transient error is returned once `retry.attempts` passes have failed.
pub async fn build_with_retry<R: NodeRegistry>(
    config: &Config,
    bridge: &mut Bridge,
    registry: &mut R,
) -> Result<usize> {
    let controller = config.controller_device();
    if config.controller.pci_id != CIO2_PCI_ID {
        warn!(
            controller = %controller.name,
            pci_id = %format!("{:#06x}", config.controller.pci_id),
            "Controller is not the expected CSI-2 receiver"
        );
    }

    let attempts = config.retry.attempts.max(1);
    let mut attempt = 1;
    loop {
        let platform = config.build_platform(attempt)?;
        match bridge.build(&controller, &platform, registry) {
            Ok(count) => {
                info!(attempt, sensors = count, "Bridge built");
                return Ok(count);
            }
            Err(e) if e.is_transient() && attempt < attempts => {
                info!(attempt, error = %e, "Build deferred");
                sleep(Duration::from_millis(config.retry.retry_delay_ms)).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(attempt, errno = e.errno(), error = %e, "Build failed");
                return Err(e.into());
            }
        }
    }
}
