//! Query sanitizer service.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id → trace → timeout → metrics
//!                                                      │
//!                                                      ▼
//!                                       permissions (role → filter)
//!                                                      │
//!                                                      ▼
//!                                       sanitize_query (RawInput → Query)
//!                                                      │
//!     Client Response                                  ▼
//!     ◀────────────── JSON Query ◀──────────── downstream handler
//!
//!     config file ──▶ watcher ──▶ permission table (atomic swap)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use query_sanitizer::config::{load_config, watcher::ConfigWatcher, ServiceConfig};
use query_sanitizer::http::server::shutdown_signal;
use query_sanitizer::http::HttpServer;
use query_sanitizer::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "query-sanitizer")]
#[command(about = "Normalizes query strings into typed queries", long_about = None)]
struct Args {
    /// TOML configuration file; watched for permission changes.
    #[arg(short, long, env = "SANITIZER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        permissions_enabled = config.permissions.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    // The watcher handle must outlive the server.
    let (config_updates, _watcher) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (updates, Some(watcher.run()?))
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (updates, None)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, shutdown_signal()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
