//! Resilience core service.
//!
//! Loads configuration, builds the shared registry, serves the admin API and
//! flushes background writes on shutdown.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use resilience_core::config::{load_config, CoreConfig};
use resilience_core::lifecycle::{self, signals};
use resilience_core::observability::{logging, metrics};

const DRAIN_DEADLINE: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "resilience-core")]
#[command(about = "Resilience and caching core", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => CoreConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "resilience-core starting");

    if let Some(path) = &args.config {
        tracing::info!(path = %path.display(), "Configuration loaded");
    } else {
        tracing::warn!("No configuration file given, using defaults");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let admin = config.admin.clone();
    let runtime = lifecycle::start(config)?;
    tokio::spawn(signals::wait_for_signal(runtime.shutdown.clone()));

    if admin.enabled {
        let listener = TcpListener::bind(&admin.bind_address).await?;
        resilience_core::admin::serve(listener, runtime.registry.clone(), &admin, &runtime.shutdown)
            .await?;
    } else {
        runtime.shutdown.wait().await;
    }

    runtime.shutdown(DRAIN_DEADLINE).await;
    tracing::info!("Shutdown complete");
    Ok(())
}
