use anyhow::{Context, Result};
use clap::Parser;
use epever_exporter::{
    config::{load_metric_paths, parse_verbose_flag, Config},
    server,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/Default.toml")]
    config: String,

    /// JSON file listing the field paths to export (overrides config)
    #[arg(short, long, env = "METRICS_FILE")]
    metrics_file: Option<String>,

    /// Device address (overrides config)
    #[arg(long, env = "DEVICE_IP")]
    device_ip: Option<String>,

    /// Prometheus namespace (overrides config)
    #[arg(long, env = "PROM_NAMESPACE")]
    namespace: Option<String>,

    /// Seconds between device polls (overrides config)
    #[arg(long, env = "REFRESH_SECONDS")]
    refresh_seconds: Option<String>,

    /// Log every device request (`true`, `1`, `yes`, `on`; anything else is off)
    #[arg(short, long, env = "LOG_VERBOSE", num_args = 0..=1, default_missing_value = "true")]
    verbose: Option<String>,

    /// Port to listen on for metrics
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Address to bind to
    #[arg(short, long, env = "EXPORTER_ADDR")]
    addr: Option<String>,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load(&args.config)?;

    // Override with CLI arguments if provided
    if let Some(host) = args.device_ip {
        config.device.host = host;
    }
    if let Some(namespace) = args.namespace {
        config.metrics.namespace = namespace;
    }
    if let Some(refresh) = args.refresh_seconds {
        config.metrics.poll_interval_seconds = Some(refresh);
    }
    if let Some(verbose) = args.verbose {
        config.metrics.verbose = parse_verbose_flag(&verbose);
    }
    if let Some(file) = args.metrics_file {
        config.metrics.paths_file = file;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(addr) = args.addr {
        config.server.addr = addr;
    }

    init_tracing(config.metrics.verbose);

    info!(
        "Starting EPEVER Prometheus Exporter v{}",
        env!("CARGO_PKG_VERSION")
    );

    config.validate()?;
    let paths = load_metric_paths(&config.metrics.paths_file)
        .with_context(|| format!("Failed to load {}", config.metrics.paths_file))?;

    info!("Configuration loaded successfully");
    info!("Device endpoint: {}", config.device.base_url());
    info!(
        "Metrics endpoint: http://{}:{}/metrics",
        config.server.addr, config.server.port
    );

    // Start the metrics server
    if let Err(e) = server::start(config, paths).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
