//! Exporter Configuration
//!
//! Configuration is layered: an optional TOML file, then `EPEVER_EXPORTER__*`
//! environment variables, then CLI overrides applied by the binary. The list of
//! exported field paths lives in a separate JSON file (an array of strings).

use crate::error::{ExporterError, Result};
use anyhow::Context;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    /// Device address (`host` or `host:port`). Required.
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub use_tls: bool,
    /// Top-level keys starting with this marker are per-device containers
    #[serde(default = "default_device_prefix")]
    pub device_prefix: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    /// Prometheus namespace prefix. Required.
    #[serde(default)]
    pub namespace: String,
    /// Kept as raw text so a bad value falls back to the default instead of failing startup
    #[serde(default)]
    pub poll_interval_seconds: Option<String>,
    #[serde(default = "default_paths_file")]
    pub paths_file: String,
    #[serde(default)]
    pub verbose: bool,
}

fn default_path() -> String {
    "/livejson".to_string()
}

fn default_device_prefix() -> String {
    "EP_".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9100
}

fn default_paths_file() -> String {
    "config.json".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            path: default_path(),
            use_tls: false,
            device_prefix: default_device_prefix(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            port: default_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            poll_interval_seconds: None,
            paths_file: default_paths_file(),
            verbose: false,
        }
    }
}

impl DeviceConfig {
    /// Full URL of the telemetry endpoint
    pub fn base_url(&self) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("{}://{}{}", scheme, self.host, path)
    }
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        // Load environment variables from .env if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("EPEVER_EXPORTER").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Checks the identity fields the exporter cannot run without
    pub fn validate(&self) -> Result<()> {
        if self.device.host.trim().is_empty() {
            return Err(ExporterError::Config(
                "device.host must be set (DEVICE_IP)".to_string(),
            ));
        }
        if self.metrics.namespace.trim().is_empty() {
            return Err(ExporterError::Config(
                "metrics.namespace must be set (PROM_NAMESPACE)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Interprets a verbose-logging flag leniently.
///
/// `true`, `1`, `yes` and `on` (any case) enable it; every other value disables it.
pub fn parse_verbose_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Drops repeated paths, keeping the first occurrence of each in order.
pub fn unique_paths(paths: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    paths
        .into_iter()
        .filter(|path| seen.insert(path.clone()))
        .collect()
}

/// Reads the ordered list of metric paths from a JSON array file.
///
/// A missing file is not fatal: the exporter runs with no path-derived metrics.
pub fn load_metric_paths(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(
                "Metric paths file {} not found, exporting no device metrics",
                path.display()
            );
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    Ok(serde_json::from_str(&data)?)
}
