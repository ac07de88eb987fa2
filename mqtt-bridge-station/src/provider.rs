//! Station cloud provider client.
//!
//! One fetch per run: refresh the OAuth access token, read the full station
//! tree, decode it into a [`Snapshot`]. There is no retry; a failed fetch
//! aborts the run.

use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use skycast_common::telemetry::{MetricValue, Module, Place, Reading, Snapshot, Station};

use crate::config::ProviderConfig;

/// Provider fetch failures. All fatal to the run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("provider request failed: {0}")]
    Http(String),
    #[error("token refresh rejected (status {status}): {body}")]
    Auth { status: u16, body: String },
    #[error("provider returned status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("failed to decode provider response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Http(err.to_string())
    }
}

/// Capability for reading one full telemetry snapshot.
#[allow(async_fn_in_trait)]
pub trait TelemetryProvider {
    async fn fetch_snapshot(&self) -> Result<Snapshot, FetchError>;
}

/// HTTP client for the station cloud API.
pub struct CloudClient {
    http: reqwest::Client,
    config: ProviderConfig,
}

impl CloudClient {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Exchange the long-lived refresh token for an access token.
    async fn refresh_access_token(&self) -> Result<String, FetchError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", self.config.refresh_token.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        let response = self
            .http
            .post(self.endpoint("/oauth2/token"))
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Auth {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;
        Ok(token.access_token)
    }

    async fn read_stations(&self, access_token: &str) -> Result<StationsResponse, FetchError> {
        let response = self
            .http
            .get(self.endpoint("/api/getstationsdata"))
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

impl TelemetryProvider for CloudClient {
    async fn fetch_snapshot(&self) -> Result<Snapshot, FetchError> {
        let token = self.refresh_access_token().await?;
        let response = self.read_stations(&token).await?;
        let snapshot = snapshot_from_response(response);
        debug!(
            stations = snapshot.stations.len(),
            modules = snapshot.modules().count(),
            "Fetched snapshot"
        );
        Ok(snapshot)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct StationsResponse {
    body: StationsBody,
}

#[derive(Debug, Deserialize)]
struct StationsBody {
    #[serde(default)]
    devices: Vec<DeviceDto>,
}

/// A base unit as the provider reports it. The unit carries its own sensor
/// block (`dashboard_data`) plus a list of attached modules.
#[derive(Debug, Deserialize)]
struct DeviceDto {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    station_name: Option<String>,
    #[serde(default)]
    module_name: Option<String>,
    #[serde(default)]
    place: Option<PlaceDto>,
    #[serde(default)]
    dashboard_data: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    modules: Vec<ModuleDto>,
}

#[derive(Debug, Deserialize)]
struct ModuleDto {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    module_name: Option<String>,
    #[serde(default)]
    dashboard_data: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct PlaceDto {
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default)]
    altitude: Option<i64>,
    /// `[longitude, latitude]`
    #[serde(default)]
    location: Option<Vec<f64>>,
}

fn snapshot_from_response(response: StationsResponse) -> Snapshot {
    Snapshot {
        stations: response
            .body
            .devices
            .into_iter()
            .map(station_from_device)
            .collect(),
    }
}

fn station_from_device(device: DeviceDto) -> Station {
    let station_name = device
        .station_name
        .clone()
        .unwrap_or_else(|| device.id.clone());

    // The base unit reports its own sensors; surface it as the first module.
    let mut modules = Vec::with_capacity(device.modules.len() + 1);
    modules.push(Module {
        id: device.id.clone(),
        name: device
            .module_name
            .clone()
            .unwrap_or_else(|| station_name.clone()),
        station_id: device.id.clone(),
        readings: readings_from_dashboard(device.dashboard_data),
    });

    for module in device.modules {
        modules.push(Module {
            name: module.module_name.unwrap_or_else(|| module.id.clone()),
            station_id: device.id.clone(),
            readings: readings_from_dashboard(module.dashboard_data),
            id: module.id,
        });
    }

    Station {
        name: station_name,
        place: device.place.map(place_from_dto).unwrap_or_default(),
        modules,
        id: device.id,
    }
}

fn place_from_dto(place: PlaceDto) -> Place {
    let (longitude, latitude) = match place.location.as_deref() {
        Some([lon, lat, ..]) => (Some(*lon), Some(*lat)),
        _ => (None, None),
    };

    Place {
        city: place.city,
        country: place.country,
        timezone: place.timezone,
        longitude,
        latitude,
        altitude: place.altitude,
    }
}

/// Decode a sensor block into per-metric readings.
///
/// `time_utc` stamps every scalar in the block. A missing block, or one
/// without `time_utc`, yields no readings; the pipeline treats either as
/// the module having no measurement data.
fn readings_from_dashboard(
    dashboard: Option<serde_json::Map<String, serde_json::Value>>,
) -> BTreeMap<String, Reading> {
    use serde_json::Value;

    let mut readings = BTreeMap::new();
    let Some(dashboard) = dashboard else {
        return readings;
    };
    let Some(timestamp) = dashboard.get("time_utc").and_then(Value::as_i64) else {
        return readings;
    };

    for (name, value) in dashboard {
        if name == "time_utc" {
            continue;
        }
        let value = match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(MetricValue::Integer(i))
                } else {
                    n.as_f64().map(MetricValue::Number)
                }
            }
            Value::String(s) => Some(MetricValue::Text(s)),
            Value::Bool(b) => Some(MetricValue::Boolean(b)),
            // Arrays and objects are bookkeeping, not measurements.
            _ => None,
        };
        if let Some(value) = value {
            readings.insert(name, Reading { value, timestamp });
        }
    }

    readings
}
