//! Dynamic Prometheus Metric Registry
//!
//! Gauges are derived at startup from the configured field paths rather than being
//! declared up front. Each distinct path maps to exactly one labeled gauge:
//!
//! - `Wifi_RSSI` → `{namespace}_general_wifi_rssi{id="root"}`
//! - `battery.voltage` → `{namespace}_battery_voltage{id="<device>"}`
//! - `load.out-current.max` → `{namespace}_load_out_current_max{id="<device>"}`
//!
//! # Metric Types
//!
//! - **GaugeVec**: one per configured path, labeled by data source (`id`)
//! - **Gauge**: `{namespace}_exporter_up`, 1 when the last poll cycle succeeded
//! - **IntCounterVec**: `{namespace}_exporter_poll_failures_total`, labeled by failing `stage`
//!
//! The exporter's own metrics live in the reserved `exporter` subsystem, so the
//! only paths they shadow are `exporter.up` and `exporter.poll_failures_total`.
//!
//! # Concurrency
//!
//! The path → gauge map sits behind a single mutex held only for a lookup or an
//! insert. Rendering goes through the prometheus registry and never takes it.

use crate::error::Result;
use prometheus::{Encoder, Gauge, GaugeVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// Label value used for fields read from the top level of the document
pub const ROOT_LABEL: &str = "root";

/// Name of the single label every path-derived gauge carries
pub const SOURCE_LABEL_NAME: &str = "id";

/// Subsystem for paths without a `.` separator
pub const GENERAL_SUBSYSTEM: &str = "general";

/// Subsystem holding the exporter's own health metrics
pub const EXPORTER_SUBSYSTEM: &str = "exporter";

/// Substituted when a path sanitizes to an empty name
pub const FALLBACK_METRIC_NAME: &str = "unspecified_metric";

/// Lower-cases `input` and replaces `.` and `-` with `_`.
pub fn sanitize_name(input: &str) -> String {
    input.replace(['.', '-'], "_").to_lowercase()
}

/// Gauge definition derived from a configured field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDefinition {
    pub namespace: String,
    pub subsystem: String,
    pub name: String,
    /// Always contains the original, unsanitized path
    pub help: String,
    pub label_name: &'static str,
}

impl MetricDefinition {
    /// Derives the definition for `path`.
    ///
    /// The first segment of a dotted path becomes the subsystem and the remaining
    /// segments, joined with `_`, become the name. Single-segment paths land in the
    /// `general` subsystem.
    pub fn from_path(namespace: &str, path: &str) -> Self {
        let (subsystem, name) = match path.split_once('.') {
            Some((first, rest)) => (sanitize_name(first), sanitize_name(rest)),
            None => (GENERAL_SUBSYSTEM.to_string(), sanitize_name(path)),
        };

        let name = if name.is_empty() {
            FALLBACK_METRIC_NAME.to_string()
        } else {
            name
        };

        Self {
            namespace: namespace.to_string(),
            subsystem,
            name,
            help: format!("Metric for {}", path),
            label_name: SOURCE_LABEL_NAME,
        }
    }

    /// Fully-qualified metric name as it appears in the exposition output
    pub fn fq_name(&self) -> String {
        [&self.namespace, &self.subsystem, &self.name]
            .iter()
            .filter(|part| !part.is_empty())
            .map(|part| part.as_str())
            .collect::<Vec<_>>()
            .join("_")
    }

    fn opts(&self) -> Opts {
        Opts::new(self.name.clone(), self.help.clone())
            .namespace(self.namespace.clone())
            .subsystem(self.subsystem.clone())
    }
}

struct RegisteredMetric {
    definition: MetricDefinition,
    gauge: GaugeVec,
    observed: HashSet<String>,
}

/// Registry of path-derived gauges plus the exporter's own health metrics
///
/// Cloning is cheap; all clones share the same state.
#[derive(Clone)]
pub struct MetricRegistry {
    registry: Arc<Registry>,
    namespace: Arc<str>,
    metrics: Arc<Mutex<HashMap<String, RegisteredMetric>>>,

    pub up: Arc<Gauge>,
    pub poll_failures: Arc<IntCounterVec>,
}

impl MetricRegistry {
    pub fn new(namespace: &str) -> Result<Self> {
        let registry = Registry::new();

        let up = Gauge::with_opts(
            Opts::new("up", "Whether the last device poll succeeded (1=yes, 0=no)")
                .namespace(namespace)
                .subsystem(EXPORTER_SUBSYSTEM),
        )?;

        let poll_failures = IntCounterVec::new(
            Opts::new("poll_failures_total", "Failed device poll cycles by stage")
                .namespace(namespace)
                .subsystem(EXPORTER_SUBSYSTEM),
            &["stage"],
        )?;

        registry.register(Box::new(up.clone()))?;
        registry.register(Box::new(poll_failures.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            namespace: Arc::from(namespace),
            metrics: Arc::new(Mutex::new(HashMap::new())),
            up: Arc::new(up),
            poll_failures: Arc::new(poll_failures),
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RegisteredMetric>> {
        // A panic while holding the lock cannot leave the map half-written
        self.metrics.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Creates a gauge for every path that does not have one yet.
    ///
    /// Repeated and overlapping calls are no-ops for known paths. A path whose
    /// derived name is rejected by prometheus (invalid characters, or a clash with
    /// another path's name) is logged and left unregistered.
    ///
    /// Returns the number of newly registered paths.
    pub fn register_from_config<S: AsRef<str>>(&self, paths: &[S]) -> usize {
        let mut registered = 0;
        for path in paths {
            if self.register_path(path.as_ref()) {
                registered += 1;
            }
        }
        registered
    }

    fn register_path(&self, path: &str) -> bool {
        let mut metrics = self.lock();
        if metrics.contains_key(path) {
            return false;
        }

        let definition = MetricDefinition::from_path(&self.namespace, path);
        let gauge = match GaugeVec::new(definition.opts(), &[definition.label_name]) {
            Ok(gauge) => gauge,
            Err(e) => {
                warn!("Skipping metric path '{}': {}", path, e);
                return false;
            }
        };

        if let Err(e) = self.registry.register(Box::new(gauge.clone())) {
            warn!(
                "Skipping metric path '{}' ({}): {}",
                path,
                definition.fq_name(),
                e
            );
            return false;
        }

        debug!("Registered {} for path '{}'", definition.fq_name(), path);
        metrics.insert(
            path.to_string(),
            RegisteredMetric {
                definition,
                gauge,
                observed: HashSet::new(),
            },
        );
        true
    }

    /// Sets the gauge for `path` labeled `label_value`.
    ///
    /// Updates for paths that were never registered are dropped silently.
    pub fn update(&self, path: &str, value: f64, label_value: &str) {
        let mut metrics = self.lock();
        if let Some(metric) = metrics.get_mut(path) {
            metric.gauge.with_label_values(&[label_value]).set(value);
            if !metric.observed.contains(label_value) {
                metric.observed.insert(label_value.to_string());
            }
        }
    }

    /// Definition registered for `path`, if any
    pub fn definition(&self, path: &str) -> Option<MetricDefinition> {
        self.lock().get(path).map(|m| m.definition.clone())
    }

    /// Number of registered path-derived gauges
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current value of `path` for `label_value`.
    ///
    /// Only label values seen by [`update`](Self::update) are read, so asking never
    /// creates a labeled instance.
    pub fn value(&self, path: &str, label_value: &str) -> Option<f64> {
        let metrics = self.lock();
        let metric = metrics.get(path)?;
        if !metric.observed.contains(label_value) {
            return None;
        }
        Some(metric.gauge.with_label_values(&[label_value]).get())
    }

    /// Label values observed so far for `path`, sorted
    pub fn label_values(&self, path: &str) -> Vec<String> {
        let mut labels: Vec<String> = self
            .lock()
            .get(path)
            .map(|m| m.observed.iter().cloned().collect())
            .unwrap_or_default();
        labels.sort();
        labels
    }

    /// Render metrics in Prometheus text format
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
