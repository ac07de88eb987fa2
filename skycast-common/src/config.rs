use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Default broker port when the address names none.
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Common MQTT connection and delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker address: `tcp://host:port`, `mqtt://host:port`, or bare
    /// `host[:port]`.
    pub broker: String,

    /// Client identifier presented to the broker.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Delivery quality of service: 0 (fire-and-forget), 1 (at-least-once),
    /// or 2 (exactly-once).
    #[serde(default)]
    pub qos: Qos,

    /// Ask the broker to store the last value per channel.
    #[serde(default)]
    pub retain: bool,

    /// Handshake deadline in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Per-publish confirmation deadline in milliseconds.
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,

    /// Drain window for in-flight traffic on disconnect, in milliseconds.
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

fn default_client_id() -> String {
    "skycast-bridge".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_ack_timeout_ms() -> u64 {
    5_000
}

fn default_drain_timeout_ms() -> u64 {
    250
}

impl MqttConfig {
    /// Parse the configured broker address.
    pub fn broker_addr(&self) -> Result<BrokerAddr> {
        BrokerAddr::parse(&self.broker)
    }
}

/// Quality-of-service level, written as 0, 1, or 2 in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Qos {
    /// Fire-and-forget.
    #[default]
    AtMostOnce,
    /// At-least-once.
    AtLeastOnce,
    /// Exactly-once.
    ExactlyOnce,
}

impl TryFrom<u8> for Qos {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, String> {
        match value {
            0 => Ok(Qos::AtMostOnce),
            1 => Ok(Qos::AtLeastOnce),
            2 => Ok(Qos::ExactlyOnce),
            other => Err(format!("invalid qos {} (expected 0, 1, or 2)", other)),
        }
    }
}

impl From<Qos> for u8 {
    fn from(qos: Qos) -> u8 {
        match qos {
            Qos::AtMostOnce => 0,
            Qos::AtLeastOnce => 1,
            Qos::ExactlyOnce => 2,
        }
    }
}

/// Resolved broker host and port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddr {
    pub host: String,
    pub port: u16,
}

impl BrokerAddr {
    /// Parse a broker address string.
    pub fn parse(broker: &str) -> Result<Self> {
        let rest = if let Some((scheme, rest)) = broker.split_once("://") {
            match scheme {
                "tcp" | "mqtt" => rest,
                other => {
                    return Err(Error::Config(format!(
                        "Unsupported broker scheme '{}' (use tcp:// or mqtt://)",
                        other
                    )));
                }
            }
        } else {
            broker
        };

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    Error::Config(format!("Invalid broker port in '{}'", broker))
                })?;
                (host, port)
            }
            None => (rest, DEFAULT_MQTT_PORT),
        };

        if host.is_empty() || host.contains('/') {
            return Err(Error::Config(format!("Invalid broker address '{}'", broker)));
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

/// Common logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Load a configuration file in JSON5 format.
pub fn load_config<T: for<'de> Deserialize<'de>>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;

    json5::from_str(&content).map_err(|e| {
        Error::Config(format!(
            "Failed to parse config file '{}': {}",
            path.display(),
            e
        ))
    })
}

/// Load a configuration from a JSON5 string.
pub fn parse_config<T: for<'de> Deserialize<'de>>(content: &str) -> Result<T> {
    json5::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mqtt_config_defaults() {
        let json5 = r#"
        {
            broker: "tcp://127.0.0.1:1883",
        }
        "#;

        let config: MqttConfig = parse_config(json5).unwrap();

        assert_eq!(config.broker, "tcp://127.0.0.1:1883");
        assert_eq!(config.client_id, "skycast-bridge");
        assert_eq!(config.qos, Qos::AtMostOnce);
        assert!(!config.retain);
        assert_eq!(config.drain_timeout_ms, 250);
    }

    #[test]
    fn test_parse_mqtt_config_explicit() {
        let json5 = r#"
        {
            broker: "broker.local",
            client_id: "bridge-01",
            qos: 1,
            retain: true,
        }
        "#;

        let config: MqttConfig = parse_config(json5).unwrap();

        assert_eq!(config.qos, Qos::AtLeastOnce);
        assert!(config.retain);
        assert_eq!(config.client_id, "bridge-01");
    }

    #[test]
    fn test_invalid_qos_rejected() {
        let json5 = r#"{ broker: "broker.local", qos: 3 }"#;
        assert!(parse_config::<MqttConfig>(json5).is_err());
    }

    #[test]
    fn test_broker_addr_forms() {
        let addr = BrokerAddr::parse("tcp://192.168.42.253:1883").unwrap();
        assert_eq!(addr.host, "192.168.42.253");
        assert_eq!(addr.port, 1883);

        let addr = BrokerAddr::parse("mqtt://broker.local:8883").unwrap();
        assert_eq!(addr.host, "broker.local");
        assert_eq!(addr.port, 8883);

        let addr = BrokerAddr::parse("broker.local").unwrap();
        assert_eq!(addr.port, DEFAULT_MQTT_PORT);
    }

    #[test]
    fn test_broker_addr_invalid() {
        assert!(BrokerAddr::parse("ws://broker.local").is_err());
        assert!(BrokerAddr::parse("tcp://").is_err());
        assert!(BrokerAddr::parse("broker.local:notaport").is_err());
        assert!(BrokerAddr::parse("tcp://host/path").is_err());
    }

    #[test]
    fn test_logging_defaults() {
        let config: LoggingConfig = parse_config("{}").unwrap();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Text);
    }

    #[test]
    fn test_json_logging_format() {
        let json5 = r#"
        {
            level: "debug",
            format: "json",
        }
        "#;

        let config: LoggingConfig = parse_config(json5).unwrap();

        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Json);
    }
}
