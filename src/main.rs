use std::path::PathBuf;

use clap::Parser;
use tokio::sync::mpsc;

use transit_gateway::config::{load_config, ConfigWatcher, GatewayConfig};
use transit_gateway::lifecycle::{signals, Shutdown};
use transit_gateway::observability::{logging, metrics};
use transit_gateway::{net, HttpServer};

/// Host- and path-routing HTTP gateway.
#[derive(Debug, Parser)]
#[command(name = "transit-gateway", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Reload the rule table when the configuration file changes.
    #[arg(short, long, requires = "config")]
    watch: bool,

    /// Override the listener bind address, e.g. 0.0.0.0:9000.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "transit-gateway starting");

    if config.routes.is_empty() && config.redirects.is_empty() {
        tracing::warn!("No routes or redirects configured; every request will get 404");
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        redirects = config.redirects.len(),
        upstream_timeout_secs = config.timeouts.upstream_secs,
        cache_max_entries = config.cache.max_entries,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    // Held for the lifetime of the process; dropping it stops the watch.
    let (config_updates, _watcher) = match (&cli.config, cli.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            let handle = watcher.run()?;
            tracing::info!(path = ?path, "Watching configuration for changes");
            (updates, Some(handle))
        }
        _ => (mpsc::unbounded_channel().1, None),
    };

    let listener = net::bind(&config.listener).await?;
    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(&shutdown);

    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
