//! MQTT bridge for weather station cloud telemetry.
//!
//! One run per invocation: fetch a snapshot from the station cloud, print
//! the operator report, republish routed readings to MQTT, exit. Intended
//! to be driven by an external scheduler such as cron.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use mqtt_bridge_station::config::BridgeConfig;
use mqtt_bridge_station::pipeline;
use mqtt_bridge_station::provider::CloudClient;
use mqtt_bridge_station::publisher::MqttPublisher;
use mqtt_bridge_station::routing::RoutingTable;
use skycast_common::LoggingConfig;

/// MQTT bridge for weather station cloud telemetry.
#[derive(Parser, Debug)]
#[command(name = "mqtt-bridge-station")]
#[command(about = "Fetches station telemetry and republishes routed readings to MQTT")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format)
    #[arg(short, long)]
    config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = BridgeConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    let log_config = LoggingConfig {
        level: args
            .log_level
            .clone()
            .unwrap_or_else(|| config.logging.level.clone()),
        format: config.logging.format,
    };
    skycast_common::init_tracing(&log_config)
        .map_err(|e| anyhow::anyhow!("Failed to init tracing: {}", e))?;

    info!("Starting mqtt-bridge-station");
    info!("Loaded configuration from {:?}", args.config);

    // Ambiguous routes are fatal here, before any network activity.
    let table =
        RoutingTable::from_rules(&config.routes).context("Invalid routing configuration")?;
    info!(routes = table.len(), "Routing table loaded");

    let provider = CloudClient::new(config.provider.clone());
    let drain = Duration::from_millis(config.mqtt.drain_timeout_ms);
    let mqtt = config.mqtt.clone();

    pipeline::run(&provider, || MqttPublisher::connect(&mqtt), &table, drain)
        .await
        .context("Run aborted")?;

    Ok(())
}
