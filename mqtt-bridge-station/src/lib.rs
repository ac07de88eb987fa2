//! MQTT bridge for weather station cloud telemetry.
//!
//! One run per process: the bridge reads the full station tree from the
//! provider, annotates every reading with how stale it is, and republishes
//! routed readings onto MQTT channels.
//!
//! # Channels
//!
//! Destination channels are `/`-separated paths, configured per
//! (module, metric) pair:
//!
//! ```text
//! home/living/temperature
//! garden/outdoor/humidity
//! ```

pub mod config;
pub mod pipeline;
pub mod provider;
pub mod publisher;
pub mod routing;
