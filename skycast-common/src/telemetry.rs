use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything one provider fetch returned: the full station tree.
///
/// A snapshot is built fresh by each run and discarded when the run ends;
/// there is no cross-run identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub stations: Vec<Station>,
}

impl Snapshot {
    /// Iterate every module across all stations, in snapshot order.
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.stations.iter().flat_map(|station| station.modules.iter())
    }
}

/// A physical base unit owning one or more sensing modules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    /// Provider-assigned identifier, unique across the snapshot.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Installation metadata, all fields optional.
    #[serde(default)]
    pub place: Place,
    pub modules: Vec<Module>,
}

/// Where a station is installed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Place {
    pub city: Option<String>,
    pub country: Option<String>,
    pub timezone: Option<String>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub altitude: Option<i64>,
}

/// A sensing unit reporting zero or more named metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    /// Colon-delimited hardware address, unique across the snapshot.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Identifier of the owning station (back-reference, never ownership).
    pub station_id: String,
    /// Metric name to latest reading. Empty when the module reported no
    /// measurement data, which is a valid state rather than an error.
    #[serde(default)]
    pub readings: BTreeMap<String, Reading>,
}

/// One (value, timestamp) observation for a metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub value: MetricValue,
    /// Unix seconds (UTC) when the provider captured the value.
    pub timestamp: i64,
}

impl Reading {
    /// Seconds elapsed between this reading and `instant` (unix seconds).
    ///
    /// Negative when the reading's timestamp is in the future (clock skew);
    /// the result is passed through unclamped either way.
    pub fn age_secs(&self, instant: i64) -> i64 {
        instant - self.timestamp
    }
}

/// Typed measurement value.
///
/// `Display` yields the UTF-8 text used as the bus payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// Whole-number measurement (e.g. Humidity, CO2).
    Integer(i64),
    /// Fractional measurement (e.g. Temperature, Pressure).
    Number(f64),
    /// Textual measurement (e.g. a trend indicator).
    Text(String),
    /// Boolean flag.
    Boolean(bool),
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricValue::Integer(v) => write!(f, "{}", v),
            MetricValue::Number(v) => write!(f, "{}", v),
            MetricValue::Text(v) => write!(f, "{}", v),
            MetricValue::Boolean(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::Integer(v)
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Number(v)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::Text(v.to_string())
    }
}

impl From<bool> for MetricValue {
    fn from(v: bool) -> Self {
        MetricValue::Boolean(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(value: MetricValue, timestamp: i64) -> Reading {
        Reading { value, timestamp }
    }

    #[test]
    fn test_age_is_exact() {
        let r = reading(MetricValue::Number(21.5), 1_700_000_000);
        assert_eq!(r.age_secs(1_700_000_030), 30);
        assert_eq!(r.age_secs(1_700_000_000), 0);
    }

    #[test]
    fn test_age_can_be_negative() {
        // A future timestamp (clock skew) passes through unclamped.
        let r = reading(MetricValue::Integer(42), 1_700_000_100);
        assert_eq!(r.age_secs(1_700_000_000), -100);
    }

    #[test]
    fn test_value_payload_text() {
        assert_eq!(MetricValue::Number(21.5).to_string(), "21.5");
        assert_eq!(MetricValue::Integer(58).to_string(), "58");
        assert_eq!(MetricValue::Text("stable".into()).to_string(), "stable");
        assert_eq!(MetricValue::Boolean(true).to_string(), "true");
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(MetricValue::from(42i64), MetricValue::Integer(42));
        assert_eq!(MetricValue::from(3.5), MetricValue::Number(3.5));
        assert_eq!(MetricValue::from("up"), MetricValue::Text("up".to_string()));
        assert_eq!(MetricValue::from(false), MetricValue::Boolean(false));
    }

    #[test]
    fn test_snapshot_module_iteration() {
        let snapshot = Snapshot {
            stations: vec![
                Station {
                    id: "s1".into(),
                    name: "one".into(),
                    place: Place::default(),
                    modules: vec![
                        Module {
                            id: "AA:BB".into(),
                            name: "indoor".into(),
                            station_id: "s1".into(),
                            readings: BTreeMap::new(),
                        },
                        Module {
                            id: "CC:DD".into(),
                            name: "outdoor".into(),
                            station_id: "s1".into(),
                            readings: BTreeMap::new(),
                        },
                    ],
                },
                Station {
                    id: "s2".into(),
                    name: "two".into(),
                    place: Place::default(),
                    modules: vec![],
                },
            ],
        };

        let ids: Vec<&str> = snapshot.modules().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["AA:BB", "CC:DD"]);
    }
}
