//! Device Polling
//!
//! Fetches the device's live JSON document on a fixed interval and fans it out
//! into registry updates.
//!
//! # Cycle
//!
//! 1. `GET` the telemetry endpoint (bounded by the configured timeout)
//! 2. Decode the body as a JSON object
//! 3. Resolve every dot-free path against the document root, labeled `root`
//! 4. For every top-level key carrying the device prefix (`EP_01`), resolve every
//!    dotted path against that key's object, labeled with the rest of the key (`01`)
//!
//! # Error Handling
//!
//! Fetch and decode failures are logged, counted in `exporter_poll_failures_total`, and
//! end the cycle without touching path-derived gauges. Stale values stay
//! exported until the next successful resolution overwrites them.

use crate::config::DeviceConfig;
use crate::error::{ExporterError, Result};
use crate::extract::extract_value;
use crate::metrics::{MetricRegistry, ROOT_LABEL};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Interval used when the configured one is missing or invalid
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Outcome of a single poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    /// Document fetched and decoded; carries the number of gauge updates applied
    Success(usize),
    /// The endpoint could not be reached or returned an error status
    FetchFailed,
    /// The response body was not a JSON object
    DecodeFailed,
}

/// Parses the configured poll interval in whole seconds.
///
/// Anything other than a positive integer falls back to [`DEFAULT_POLL_INTERVAL`]
/// with a warning.
pub fn resolve_poll_interval(raw: Option<&str>) -> Duration {
    let Some(raw) = raw else {
        return DEFAULT_POLL_INTERVAL;
    };

    match raw.trim().parse::<i64>() {
        Ok(secs) if secs >= 1 => Duration::from_secs(secs as u64),
        _ => {
            warn!(
                "Invalid poll interval '{}', defaulting to {}s",
                raw,
                DEFAULT_POLL_INTERVAL.as_secs()
            );
            DEFAULT_POLL_INTERVAL
        }
    }
}

/// HTTP client for the device's telemetry endpoint
pub struct DeviceClient {
    http: reqwest::Client,
    url: String,
}

impl DeviceClient {
    pub fn new(config: &DeviceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .user_agent(format!("epever-exporter/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            url: config.base_url(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetches one telemetry document.
    ///
    /// Transport errors and non-success statuses map to [`ExporterError::Http`] and
    /// [`ExporterError::UnexpectedStatus`]; body problems map to
    /// [`ExporterError::Json`] and [`ExporterError::NotAnObject`].
    pub async fn fetch(&self) -> Result<Value> {
        debug!("HTTP GET {}", self.url);
        let response = self.http.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExporterError::UnexpectedStatus(status.as_u16()));
        }

        let body = response.bytes().await?;
        parse_document(&body)
    }
}

/// Decodes a telemetry body, requiring a top-level JSON object
pub fn parse_document(body: &[u8]) -> Result<Value> {
    let document: Value = serde_json::from_slice(body)?;
    if !document.is_object() {
        return Err(ExporterError::NotAnObject);
    }
    Ok(document)
}

/// Applies one decoded document to the registry.
///
/// Returns the number of gauge updates issued.
pub fn apply_snapshot<S: AsRef<str>>(
    registry: &MetricRegistry,
    paths: &[S],
    device_prefix: &str,
    document: &Value,
) -> usize {
    let mut updates = 0;

    for path in paths.iter().map(AsRef::as_ref).filter(|p| !p.contains('.')) {
        if let Some(value) = extract_value(document, path) {
            registry.update(path, value, ROOT_LABEL);
            updates += 1;
        }
    }

    let Some(root) = document.as_object() else {
        return updates;
    };

    for (key, device) in root {
        let Some(device_id) = key.strip_prefix(device_prefix) else {
            continue;
        };
        if !device.is_object() {
            debug!("Skipping device key '{}': not an object", key);
            continue;
        }

        for path in paths.iter().map(AsRef::as_ref).filter(|p| p.contains('.')) {
            if let Some(value) = extract_value(device, path) {
                registry.update(path, value, device_id);
                updates += 1;
            }
        }
    }

    updates
}

/// Fetches and applies one document, recording the outcome in the exporter's own
/// health metrics. Never fails past the cycle boundary.
pub async fn poll_once<S: AsRef<str>>(
    client: &DeviceClient,
    registry: &MetricRegistry,
    paths: &[S],
    device_prefix: &str,
) -> CycleStatus {
    let status = match client.fetch().await {
        Ok(document) => {
            CycleStatus::Success(apply_snapshot(registry, paths, device_prefix, &document))
        }
        Err(e @ (ExporterError::Json(_) | ExporterError::NotAnObject)) => {
            error!("Failed to parse telemetry from {}: {}", client.url(), e);
            CycleStatus::DecodeFailed
        }
        Err(e) => {
            error!("Error fetching telemetry from {}: {}", client.url(), e);
            CycleStatus::FetchFailed
        }
    };

    match status {
        CycleStatus::Success(updates) => {
            debug!("Applied {} metric updates", updates);
            registry.up.set(1.0);
        }
        CycleStatus::FetchFailed => {
            registry.poll_failures.with_label_values(&["fetch"]).inc();
            registry.up.set(0.0);
        }
        CycleStatus::DecodeFailed => {
            registry.poll_failures.with_label_values(&["decode"]).inc();
            registry.up.set(0.0);
        }
    }

    status
}

/// Polls forever, sleeping `interval` after every cycle.
pub async fn run(
    client: DeviceClient,
    registry: MetricRegistry,
    paths: Vec<String>,
    device_prefix: String,
    interval: Duration,
) {
    info!(
        "Polling {} every {}s for {} metric paths",
        client.url(),
        interval.as_secs(),
        paths.len()
    );

    loop {
        poll_once(&client, &registry, &paths, &device_prefix).await;
        tokio::time::sleep(interval).await;
    }
}
