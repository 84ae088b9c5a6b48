//! EPEVER Prometheus Exporter
//!
//! Polls an EPEVER charge controller's live JSON endpoint and republishes selected
//! fields as labeled Prometheus gauges.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐   HTTP GET /livejson   ┌──────────────┐
//! │   EPEVER    │ ◄────────────────────  │   Exporter   │
//! │   device    │        JSON            │              │
//! └─────────────┘                        │  ┌────────┐  │      HTTP      ┌────────────┐
//!                                        │  │ Poller │  │ ◄────────────► │ Prometheus │
//!                                        │  └────────┘  │   /metrics     └────────────┘
//!                                        │  ┌────────┐  │
//!                                        │  │Registry│  │
//!                                        │  └────────┘  │
//!                                        └──────────────┘
//! ```
//!
//! The set of exported fields is a list of dot-separated paths. Dot-free paths
//! (`Wifi_RSSI`) are read from the document root and labeled `id="root"`; dotted
//! paths (`battery.voltage`) are read from every `EP_<id>` object and labeled with
//! the device id.
//!
//! # Modules
//!
//! - [`extract`] - Field path resolution against JSON documents
//! - [`metrics`] - Dynamic gauge registry
//! - [`poller`] - Device client and poll loop
//! - [`server`] - HTTP server
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//!
//! # Quick Start
//!
//! ```no_run
//! use epever_exporter::{config::{load_metric_paths, Config}, server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/Default.toml")?;
//!     config.validate()?;
//!     let paths = load_metric_paths(&config.metrics.paths_file)?;
//!     server::start(config, paths).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod metrics;
pub mod poller;
pub mod server;
