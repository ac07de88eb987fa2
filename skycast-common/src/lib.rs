//! Skycast Common Library
//!
//! This crate provides shared types and utilities for the skycast bridge:
//!
//! - [`telemetry`] - Telemetry data model (`Snapshot`, `Station`, `Module`, `Reading`)
//! - [`config`] - Configuration loading (JSON5 format) and MQTT/logging settings
//! - [`channel`] - Channel name validation
//! - [`error`] - Error types

pub mod channel;
pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at the crate root
pub use channel::validate_channel;
pub use config::{
    BrokerAddr, LogFormat, LoggingConfig, MqttConfig, Qos, load_config, parse_config,
};
pub use error::{Error, Result};
pub use telemetry::{MetricValue, Module, Place, Reading, Snapshot, Station};

/// Initialize tracing with the given configuration.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
///
/// # Example
///
/// ```ignore
/// use skycast_common::{LoggingConfig, LogFormat, init_tracing};
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Json,
/// };
/// init_tracing(&config)?;
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
