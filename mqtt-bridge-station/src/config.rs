//! Configuration for the station bridge.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use skycast_common::channel::validate_channel;
use skycast_common::config::{LoggingConfig, MqttConfig};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Station cloud provider access.
    pub provider: ProviderConfig,

    /// Broker connection and delivery settings.
    pub mqtt: MqttConfig,

    /// Declarative (module, metric) -> channel routes.
    #[serde(default)]
    pub routes: Vec<RouteConfig>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Endpoint and credentials for the station cloud API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API endpoint, e.g. `https://api.example.com`.
    pub base_url: String,

    /// Application client identifier.
    pub client_id: String,

    /// Application client secret.
    pub client_secret: String,

    /// Long-lived refresh token exchanged for an access token per run.
    pub refresh_token: String,
}

/// One forwarding rule: exact (module id, metric name) to channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Module hardware address, e.g. `70:ee:50:00:e3:96`.
    pub module: String,

    /// Metric name as the provider reports it, e.g. `Temperature`.
    pub metric: String,

    /// Destination channel on the bus.
    pub channel: String,
}

impl BridgeConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: BridgeConfig = json5::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.provider.base_url.starts_with("http://")
            && !self.provider.base_url.starts_with("https://")
        {
            return Err(ConfigError::Validation(format!(
                "provider.base_url '{}' must be an http(s) URL",
                self.provider.base_url
            )));
        }

        let credentials = [
            ("client_id", &self.provider.client_id),
            ("client_secret", &self.provider.client_secret),
            ("refresh_token", &self.provider.refresh_token),
        ];
        for (field, value) in credentials {
            if value.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "provider.{} must not be empty",
                    field
                )));
            }
        }

        self.mqtt
            .broker_addr()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        for route in &self.routes {
            if route.module.is_empty() {
                return Err(ConfigError::Validation(
                    "route module must not be empty".to_string(),
                ));
            }
            if route.metric.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "route for module '{}': metric must not be empty",
                    route.module
                )));
            }
            validate_channel(&route.channel).map_err(|e| {
                ConfigError::Validation(format!(
                    "route '{}'/'{}': {}",
                    route.module, route.metric, e
                ))
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skycast_common::config::Qos;

    fn sample_config() -> &'static str {
        r#"{
            provider: {
                base_url: "https://api.example.com",
                client_id: "app-id",
                client_secret: "app-secret",
                refresh_token: "refresh-token",
            },
            mqtt: {
                broker: "tcp://192.168.42.253:1883",
            },
            routes: [
                { module: "70:ee:50:00:e3:96", metric: "Temperature", channel: "home/living/temperature" },
                { module: "70:ee:50:00:e3:96", metric: "Humidity", channel: "home/living/humidity" },
                { module: "02:00:00:00:d1:ac", metric: "Temperature", channel: "garden/outdoor/temperature" },
            ],
        }"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: BridgeConfig = json5::from_str(sample_config()).unwrap();
        config.validate().unwrap();

        assert_eq!(config.provider.client_id, "app-id");
        assert_eq!(config.routes.len(), 3);
        assert_eq!(config.routes[0].channel, "home/living/temperature");
        // Delivery knobs default to fire-and-forget, not retained.
        assert_eq!(config.mqtt.qos, Qos::AtMostOnce);
        assert!(!config.mqtt.retain);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_routes_are_optional() {
        let json = r#"{
            provider: {
                base_url: "https://api.example.com",
                client_id: "a",
                client_secret: "b",
                refresh_token: "c",
            },
            mqtt: { broker: "broker.local" },
        }"#;

        let config: BridgeConfig = json5::from_str(json).unwrap();
        config.validate().unwrap();
        assert!(config.routes.is_empty());
    }

    #[test]
    fn test_validate_empty_credential() {
        let json = r#"{
            provider: {
                base_url: "https://api.example.com",
                client_id: "",
                client_secret: "b",
                refresh_token: "c",
            },
            mqtt: { broker: "broker.local" },
        }"#;

        let config: BridgeConfig = json5::from_str(json).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_bad_base_url() {
        let json = r#"{
            provider: {
                base_url: "api.example.com",
                client_id: "a",
                client_secret: "b",
                refresh_token: "c",
            },
            mqtt: { broker: "broker.local" },
        }"#;

        let config: BridgeConfig = json5::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_broker() {
        let json = r#"{
            provider: {
                base_url: "https://api.example.com",
                client_id: "a",
                client_secret: "b",
                refresh_token: "c",
            },
            mqtt: { broker: "ws://broker.local" },
        }"#;

        let config: BridgeConfig = json5::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_wildcard_channel() {
        let json = r#"{
            provider: {
                base_url: "https://api.example.com",
                client_id: "a",
                client_secret: "b",
                refresh_token: "c",
            },
            mqtt: { broker: "broker.local" },
            routes: [
                { module: "AA:BB", metric: "Temperature", channel: "home/#" },
            ],
        }"#;

        let config: BridgeConfig = json5::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }
}
