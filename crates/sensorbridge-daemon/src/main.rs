//! Sensorbridge - Main entry point
//!
//! Builds the camera sensor graph for one controller, retrying while sensors
//! enumerate, then reports what was connected.

mod config;
mod retry;

use anyhow::Result;
use clap::Parser;
use sensorbridge_core::{BridgeError, MemoryRegistry, RegistrySnapshot};
use sensorbridge_discovery::{Bridge, BridgeReport};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "sensorbridge")]
#[command(about = "Connects firmware-described camera sensors to their imaging controller")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "sensorbridge.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Write a sample configuration to the config path and exit
    #[arg(long)]
    write_default_config: bool,
}

#[derive(Serialize)]
struct Output {
    bridge: BridgeReport,
    registry: RegistrySnapshot,
}

/// Exit status for a failed build: the negated errno of a [`BridgeError`]
fn exit_code(err: &anyhow::Error) -> Option<i32> {
    err.downcast_ref::<BridgeError>().map(|e| -e.errno())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Sensorbridge v{}", env!("CARGO_PKG_VERSION"));

    if args.write_default_config {
        config::save_default_config(&args.config)?;
        info!(path = %args.config.display(), "Wrote sample configuration");
        return Ok(());
    }

    let config = config::load_config(&args.config)?;
    info!(
        candidates = ?config.bridge.candidates,
        devices = config.devices.len(),
        "Configuration loaded"
    );

    let mut bridge = Bridge::new(config.bridge.clone())?;
    let mut registry = MemoryRegistry::new();

    if let Err(e) = retry::build_with_retry(&config, &mut bridge, &mut registry).await {
        for failure in bridge.failures() {
            error!(hid = %failure.hid, stage = ?failure.stage, error = %failure.error, "Sensor not connected");
        }
        if let Some(code) = exit_code(&e) {
            error!(code, error = %e, "Bridge build failed");
            std::process::exit(code);
        }
        return Err(e);
    }

    if args.json {
        let output = Output {
            bridge: bridge.report(),
            registry: registry.snapshot(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let report = bridge.report();
        println!("Connected {} sensors (session {}):", report.n_sensors, report.session);
        for sensor in &report.sensors {
            println!(
                "  - {} on {} via {}",
                sensor.name,
                sensor.device.as_deref().unwrap_or("?"),
                sensor.port.as_deref().unwrap_or("?")
            );
            println!("    data-lanes: {:?}", sensor.data_lanes);
            if let Some(rotation) = sensor.rotation {
                println!("    rotation: {}", rotation);
            }
            if let Some(clock) = sensor.clock_frequency {
                println!("    clock-frequency: {}", clock);
            }
        }
        for failure in &report.failures {
            println!("  ! {} failed while {:?}: {}", failure.hid, failure.stage, failure.error);
        }
    }

    bridge.burn(&mut registry);
    info!(remaining = registry.len(), "Bridge torn down");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_from_bridge_error() {
        let err = anyhow::Error::new(BridgeError::NotReady("INT33BE".to_string()));
        assert_eq!(exit_code(&err), Some(517));

        let err = anyhow::Error::new(BridgeError::NotFound("SSDB".to_string()));
        assert_eq!(exit_code(&err), Some(19));
    }

    #[test]
    fn test_exit_code_for_other_errors() {
        let err = anyhow::anyhow!("config file unreadable");
        assert_eq!(exit_code(&err), None);
    }
}
