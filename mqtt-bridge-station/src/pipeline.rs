//! One-run pipeline: fetch, annotate, route, publish, report.
//!
//! The driver prints the operator report to standard output as it walks the
//! snapshot; lifecycle diagnostics go through tracing. Only the initial
//! fetch and the initial connect are fatal. A failed publish is logged and
//! the run continues with the next metric.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use skycast_common::telemetry::{MetricValue, Place};

use crate::provider::{FetchError, TelemetryProvider};
use crate::publisher::{ConnectionError, MessagePublisher};
use crate::routing::RoutingTable;

/// Fatal pipeline failures. Publish failures are handled in place and are
/// deliberately absent here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Connect(#[from] ConnectionError),
}

/// Counters for one completed run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Values published and confirmed by the broker.
    pub published: usize,
    /// Publishes the broker failed to confirm.
    pub failed: usize,
    /// Modules skipped for having no measurement data.
    pub skipped_modules: usize,
    /// Readings with no matching route.
    pub unrouted: usize,
}

impl RunReport {
    /// Total publish attempts.
    pub fn attempted(&self) -> usize {
        self.published + self.failed
    }
}

/// Execute one run against the wall clock.
pub async fn run<P, B, F, Fut>(
    provider: &P,
    connect: F,
    table: &RoutingTable,
    drain: Duration,
) -> Result<RunReport, PipelineError>
where
    P: TelemetryProvider,
    B: MessagePublisher,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<B, ConnectionError>>,
{
    run_with_clock(provider, connect, table, drain, || {
        chrono::Utc::now().timestamp()
    })
    .await
}

/// Execute one run, reading the capture instant from `clock` (unix seconds).
///
/// The clock is read once, after the fetch, so every staleness figure in
/// the run shares one basis.
pub async fn run_with_clock<P, B, F, Fut, C>(
    provider: &P,
    connect: F,
    table: &RoutingTable,
    drain: Duration,
    clock: C,
) -> Result<RunReport, PipelineError>
where
    P: TelemetryProvider,
    B: MessagePublisher,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<B, ConnectionError>>,
    C: FnOnce() -> i64,
{
    let snapshot = provider.fetch_snapshot().await?;
    let run_instant = clock();

    let mut bus = connect().await?;
    let mut report = RunReport::default();

    for station in &snapshot.stations {
        println!("Station: {} [{}]", station.name, station.id);
        if let Some(place) = describe_place(&station.place) {
            println!("\t{}", place);
        }

        for module in &station.modules {
            println!("\tModule: {} [{}]", module.name, module.id);

            if module.readings.is_empty() {
                println!(
                    "\t\tSkipping {}, no measurement data available.",
                    module.name
                );
                report.skipped_modules += 1;
                continue;
            }

            for (metric, reading) in &module.readings {
                let age = reading.age_secs(run_instant);
                println!("\t\t{}", format_reading_line(metric, &reading.value, age));
                if age < 0 {
                    warn!(
                        module = %module.id,
                        metric = %metric,
                        age,
                        "Reading timestamp is in the future"
                    );
                }

                let Some(channel) = table.resolve(&module.id, metric) else {
                    report.unrouted += 1;
                    continue;
                };

                let payload = reading.value.to_string();
                match bus.publish(channel, &payload).await {
                    Ok(()) => {
                        println!("\t\t\tPublished '{}' to channel '{}'", payload, channel);
                        report.published += 1;
                    }
                    Err(e) => {
                        println!("\t\t\tERROR: {}", e);
                        warn!(channel = %e.channel, reason = %e.reason, "Publish failed");
                        report.failed += 1;
                    }
                }
            }
        }
    }

    bus.disconnect(drain).await;

    info!(
        published = report.published,
        failed = report.failed,
        skipped_modules = report.skipped_modules,
        unrouted = report.unrouted,
        "Run complete"
    );

    Ok(report)
}

/// `Temperature : 21.5 (updated 30s ago)`
fn format_reading_line(metric: &str, value: &MetricValue, age_secs: i64) -> String {
    format!("{} : {} (updated {}s ago)", metric, value, age_secs)
}

fn describe_place(place: &Place) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(city) = &place.city {
        parts.push(city.clone());
    }
    if let Some(country) = &place.country {
        parts.push(country.clone());
    }
    if let Some(timezone) = &place.timezone {
        parts.push(timezone.clone());
    }
    if let (Some(latitude), Some(longitude)) = (place.latitude, place.longitude) {
        parts.push(format!("{:.4},{:.4}", latitude, longitude));
    }
    if let Some(altitude) = place.altitude {
        parts.push(format!("{}m", altitude));
    }

    if parts.is_empty() { None } else { Some(parts.join(", ")) }
}
