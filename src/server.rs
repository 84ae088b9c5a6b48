//! HTTP Server
//!
//! Exposes the registry over HTTP and starts the background poll loop.
//!
//! # Endpoints
//!
//! - `GET /` - HTML landing page with links to metrics and health
//! - `GET /metrics` - Prometheus metrics in text format
//! - `GET /health` - Health check (200 if the last poll succeeded, 503 otherwise)
//!
//! The poll loop and the request handlers share one [`MetricRegistry`]; handlers
//! only read from it.

use crate::config::{unique_paths, Config};
use crate::error::ExporterError;
use crate::metrics::MetricRegistry;
use crate::poller::{self, DeviceClient};
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::{error, info};

#[derive(Clone)]
struct AppState {
    metrics: MetricRegistry,
}

/// Builds the HTTP router around an existing registry
pub fn router(metrics: MetricRegistry) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(AppState { metrics })
}

pub async fn start(config: Config, paths: Vec<String>) -> anyhow::Result<()> {
    let paths = unique_paths(paths);
    let metrics = MetricRegistry::new(&config.metrics.namespace)?;
    let registered = metrics.register_from_config(&paths);
    info!(
        "Registered {} metrics from {} configured paths",
        registered,
        paths.len()
    );

    let client = DeviceClient::new(&config.device)?;
    let interval = poller::resolve_poll_interval(config.metrics.poll_interval_seconds.as_deref());

    // Start background polling
    tokio::spawn(poller::run(
        client,
        metrics.clone(),
        paths,
        config.device.device_prefix.clone(),
        interval,
    ));

    let app = router(metrics);

    // Start the server
    let addr = format!("{}:{}", config.server.addr, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Metrics server listening on {}", addr);
    info!("Metrics available at http://{}/metrics", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| ExporterError::Server(e.to_string()))?;

    Ok(())
}

async fn root_handler() -> impl IntoResponse {
    Html(
        r#"<html>
<head><title>EPEVER Exporter</title></head>
<body>
<h1>EPEVER Prometheus Exporter</h1>
<p><a href="/metrics">Metrics</a></p>
<p><a href="/health">Health</a></p>
</body>
</html>"#,
    )
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(metrics) => metrics.into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error rendering metrics: {}", e),
            )
                .into_response()
        }
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    if state.metrics.up.get() > 0.0 {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Device unreachable")
    }
}
