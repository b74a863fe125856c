//! Request Shield
//!
//! A request-protection layer built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────────┐
//!                         │                    REQUEST SHIELD                    │
//!                         │                                                      │
//!     Client Request      │  ┌─────────┐    ┌────────────────┐    ┌──────────┐   │
//!     ────────────────────┼─▶│  http   │───▶│ guard          │───▶│ handlers │   │
//!                         │  │ server  │    │ threat → limit │    │ docs/ops │   │
//!                         │  └─────────┘    └───────┬────────┘    └────┬─────┘   │
//!                         │                         │                  │         │
//!                         │                         ▼                  ▼         │
//!                         │                 ┌──────────────┐   ┌──────────────┐  │
//!                         │                 │ThreatRegistry│   │ExpiringStore │  │
//!                         │                 │ + Limiter    │   │  (documents) │  │
//!                         │                 └──────┬───────┘   └──────────────┘  │
//!                         │                        │ SecurityEvent               │
//!                         │                        ▼                             │
//!                         │                 ┌──────────────┐                     │
//!                         │                 │  EventSink   │ → logs/*.log        │
//!                         │                 └──────────────┘   (rotated)         │
//!                         │                                                      │
//!                         │  Cross-cutting: config, observability, lifecycle     │
//!                         │  (one sweeper per store, shared shutdown broadcast)  │
//!                         └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use request_shield::config::{load_config, validate_config, ConfigError, ShieldConfig};
use request_shield::lifecycle::{signals, Shutdown};
use request_shield::observability::{logging, metrics, EventSink, JsonLinesSink, TracingSink};
use request_shield::HttpServer;

#[derive(Parser)]
#[command(name = "request-shield")]
#[command(about = "Rate limiting, threat scoring and expiring document cache", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ShieldConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "request-shield starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        rate_limit = config.rate_limit.max_requests,
        window_secs = config.rate_limit.window_secs,
        cache_ttl_secs = config.cache.ttl_secs,
        threats_enabled = config.threats.enabled,
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

    let sink: Arc<dyn EventSink> = match &config.threats.event_log {
        Some(path) => {
            tracing::info!(path = ?path, "Writing security events to file");
            Arc::new(JsonLinesSink::open(path)?)
        }
        None => Arc::new(TracingSink),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));

    HttpServer::new(config, sink).run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
